// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! Route registry: passive per-layer and whole-channel frame subscribers.
//!
//! A route is a shared subscriber the channel observes weakly; the channel
//! never extends a route's lifetime. Holders read frames from the route's
//! bounded buffer; delivery never blocks the pipeline (the oldest buffered
//! frame is dropped on overflow).

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use crate::core::format::VideoFormatDesc;
use crate::core::frames::{DrawFrame, LayerId, WHOLE_CHANNEL};

/// Frames buffered per route before the oldest is dropped.
const ROUTE_BUFFER_DEPTH: usize = 3;

/// A frame subscription on one layer (or the whole channel).
pub struct Route {
    name: String,
    format: VideoFormatDesc,
    tx: Sender<DrawFrame>,
    rx: Receiver<DrawFrame>,
}

impl Route {
    fn new(name: String, format: VideoFormatDesc) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(ROUTE_BUFFER_DEPTH);
        Self { name, format, tx, rx }
    }

    /// `"<channel>"` for a whole-channel route, `"<channel>/<layer>"`
    /// otherwise.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel format at the time the route was created.
    pub fn format(&self) -> &VideoFormatDesc {
        &self.format
    }

    /// Deliver a frame, dropping the oldest buffered one if the holder is
    /// not keeping up.
    fn signal(&self, frame: DrawFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                let _ = self.rx.try_recv();
                let _ = self.tx.try_send(frame);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn try_recv(&self) -> Option<DrawFrame> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<DrawFrame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Weak table of routes keyed by layer id.
///
/// Dead entries are not reaped proactively; they are overwritten by the next
/// [`get_or_create`](Self::get_or_create) for the same id and skipped during
/// fan-out.
pub struct Routes {
    channel_index: i32,
    entries: Mutex<BTreeMap<LayerId, Weak<Route>>>,
}

impl Routes {
    pub fn new(channel_index: i32) -> Self {
        Self {
            channel_index,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// The live route for `layer`, creating one if none is alive. Repeated
    /// calls for the same id return the same route while any holder keeps it
    /// alive.
    pub fn get_or_create(&self, layer: LayerId, format: &VideoFormatDesc) -> Arc<Route> {
        let mut entries = self.entries.lock();

        if let Some(route) = entries.get(&layer).and_then(Weak::upgrade) {
            return route;
        }

        let name = if layer == WHOLE_CHANNEL {
            format!("{}", self.channel_index)
        } else {
            format!("{}/{}", self.channel_index, layer)
        };

        let route = Arc::new(Route::new(name, format.clone()));
        entries.insert(layer, Arc::downgrade(&route));
        route
    }

    /// Fan one tick's producer frames out to the subscribers.
    ///
    /// Per-layer routes receive the popped (non-retaining) variant of their
    /// layer's frame; the whole-channel route receives a composite of all
    /// produced frames in layer order. Dead routes are silently skipped.
    pub fn fan_out(&self, frames: &BTreeMap<LayerId, DrawFrame>) {
        let entries = self.entries.lock();

        for (layer, frame) in frames {
            if let Some(route) = entries.get(layer).and_then(Weak::upgrade) {
                route.signal(DrawFrame::pop(frame));
            }
        }

        if let Some(route) = entries.get(&WHOLE_CHANNEL).and_then(Weak::upgrade) {
            route.signal(DrawFrame::composite(frames.values().cloned().collect()));
        }
    }
}
