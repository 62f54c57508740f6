// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! The consumer set: fans the composited frame out to registered outputs.
//!
//! This is the pipeline's backpressure point. Consumers block inside
//! [`FrameConsumer::send`] until they can admit the frame, which paces the
//! whole channel loop; the loop itself never sleeps.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::diagnostics::Graph;
use crate::core::error::Result;
use crate::core::format::VideoFormatDesc;
use crate::core::frames::MixedFrame;
use crate::core::monitor::MonitorState;
use crate::core::timecode::FrameTimecode;

/// A downstream output (SDI card, stream encoder, screen...).
///
/// `send` may block until the device can accept the frame; that admission
/// control is what paces the channel. A consumer returning an error is
/// removed from the output and the tick continues.
pub trait FrameConsumer: Send {
    fn send(
        &mut self,
        timecode: &FrameTimecode,
        frame: &MixedFrame,
        format: &VideoFormatDesc,
    ) -> Result<()>;

    fn name(&self) -> String;

    fn state(&self) -> MonitorState {
        MonitorState::new()
    }
}

pub struct Output {
    channel_index: i32,
    graph: Arc<Graph>,
    consumers: Mutex<BTreeMap<i32, Box<dyn FrameConsumer>>>,
    state: Mutex<MonitorState>,
}

impl Output {
    pub fn new(channel_index: i32, graph: Arc<Graph>) -> Self {
        Self {
            channel_index,
            graph,
            consumers: Mutex::new(BTreeMap::new()),
            state: Mutex::new(MonitorState::new()),
        }
    }

    pub fn add(&self, port: i32, consumer: Box<dyn FrameConsumer>) {
        tracing::info!(
            "[output-{}] Added consumer {} on port {}",
            self.channel_index,
            consumer.name(),
            port
        );
        self.consumers.lock().insert(port, consumer);
    }

    pub fn remove(&self, port: i32) -> bool {
        let removed = self.consumers.lock().remove(&port);
        if let Some(consumer) = &removed {
            tracing::info!(
                "[output-{}] Removed consumer {} from port {}",
                self.channel_index,
                consumer.name(),
                port
            );
        }
        removed.is_some()
    }

    pub fn ports(&self) -> Vec<i32> {
        self.consumers.lock().keys().copied().collect()
    }

    /// Deliver one composited frame to every consumer, in port order.
    ///
    /// Blocks until all consumers have admitted the frame. A failing
    /// consumer is dropped from the set; the frame still reaches the others.
    pub fn send(&self, timecode: &FrameTimecode, frame: &MixedFrame, format: &VideoFormatDesc) {
        let mut consumers = self.consumers.lock();
        let mut failed = Vec::new();

        for (&port, consumer) in consumers.iter_mut() {
            if let Err(e) = consumer.send(timecode, frame, format) {
                tracing::warn!(
                    "[output-{}] Consumer {} on port {} failed and will be removed: {}",
                    self.channel_index,
                    consumer.name(),
                    port,
                    e
                );
                failed.push(port);
            }
        }

        for port in failed {
            consumers.remove(&port);
        }

        let mut state = MonitorState::new();
        state.insert("consumers", consumers.len() as u64);
        for (&port, consumer) in consumers.iter() {
            let mut sub = consumer.state();
            sub.insert("type", consumer.name());
            state.insert_state(&format!("port/{port}"), sub);
        }
        *self.state.lock() = state;
    }

    pub fn state(&self) -> MonitorState {
        self.state.lock().clone()
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }
}
