// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::sync::Arc;

/// Immutable image + audio payload for one tick.
///
/// The pixel data is interleaved BGRA; the audio buffer holds the tick's
/// cadence slot worth of interleaved samples. Both are shared by reference:
/// cloning a `Frame` never copies pixels.
///
/// `keepalive` pins a producer-side resource (a buffer-pool slot, a mapped
/// GPU buffer) for as long as the frame itself is held. [`DrawFrame::pop`]
/// severs it so routes do not extend producer buffer lifetimes.
///
/// [`DrawFrame::pop`]: super::DrawFrame::pop
#[derive(Clone, Default)]
pub struct Frame {
    pub image: Arc<Vec<u8>>,
    pub audio: Arc<Vec<f32>>,
    keepalive: Option<Arc<dyn std::any::Any + Send + Sync>>,
}

impl Frame {
    pub fn new(image: Vec<u8>, audio: Vec<f32>) -> Self {
        Self {
            image: Arc::new(image),
            audio: Arc::new(audio),
            keepalive: None,
        }
    }

    /// Attach a producer resource that must outlive this frame.
    pub fn with_keepalive(mut self, keepalive: Arc<dyn std::any::Any + Send + Sync>) -> Self {
        self.keepalive = Some(keepalive);
        self
    }

    /// The same payload with the producer linkage severed.
    pub(crate) fn detached(&self) -> Self {
        Self {
            image: Arc::clone(&self.image),
            audio: Arc::clone(&self.audio),
            keepalive: None,
        }
    }

    pub fn has_keepalive(&self) -> bool {
        self.keepalive.is_some()
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        // Payload identity; the keepalive is a lifetime hook, not content.
        self.image == other.image && self.audio == other.audio
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("image_bytes", &self.image.len())
            .field("audio_samples", &self.audio.len())
            .field("keepalive", &self.keepalive.is_some())
            .finish()
    }
}

/// The mixer's composited output for one tick: a single image plus the
/// mixed audio for the tick's cadence slot.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedFrame {
    pub image: Arc<Vec<u8>>,
    pub audio: Arc<Vec<f32>>,
}

impl MixedFrame {
    pub fn new(image: Vec<u8>, audio: Vec<f32>) -> Self {
        Self {
            image: Arc::new(image),
            audio: Arc::new(audio),
        }
    }

    pub fn nb_samples(&self, channels: usize) -> usize {
        if channels == 0 {
            0
        } else {
            self.audio.len() / channels
        }
    }
}
