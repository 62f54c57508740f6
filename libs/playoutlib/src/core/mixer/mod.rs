// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! The mixer: composites one tick's layered frames into a single frame.
//!
//! Image composition is delegated to an [`ImageMixer`] backend owned at
//! channel construction (GPU or CPU, opaque to the pipeline). Audio is mixed
//! here: per-layer samples are summed in layer order into exactly the tick's
//! cadence slot. Given the same inputs the mixed frame is bit-identical.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::diagnostics::Graph;
use crate::core::error::Result;
use crate::core::format::VideoFormatDesc;
use crate::core::frames::{DrawFrame, LayerId, MixedFrame};
use crate::core::monitor::MonitorState;

/// Image composition backend.
///
/// Receives the tick's frames in layer order (bottom-most first) and returns
/// the composited image. Must be deterministic: identical inputs produce
/// identical bytes.
pub trait ImageMixer: Send {
    fn compose(
        &mut self,
        frames: &BTreeMap<LayerId, DrawFrame>,
        format: &VideoFormatDesc,
    ) -> Result<Vec<u8>>;

    fn name(&self) -> String;
}

pub struct Mixer {
    channel_index: i32,
    graph: Arc<Graph>,
    image_mixer: Mutex<Box<dyn ImageMixer>>,
    state: Mutex<MonitorState>,
}

impl Mixer {
    pub fn new(channel_index: i32, graph: Arc<Graph>, image_mixer: Box<dyn ImageMixer>) -> Self {
        Self {
            channel_index,
            graph,
            image_mixer: Mutex::new(image_mixer),
            state: Mutex::new(MonitorState::new()),
        }
    }

    /// Composite one tick's frames. `nb_samples` is the cadence's front slot
    /// and bounds the mixed audio length exactly.
    pub fn mix(
        &self,
        frames: &BTreeMap<LayerId, DrawFrame>,
        format: &VideoFormatDesc,
        nb_samples: usize,
    ) -> Result<MixedFrame> {
        let image = self.image_mixer.lock().compose(frames, format)?;
        let audio = mix_audio(frames, nb_samples * format.audio_channels);

        let mut state = MonitorState::new();
        state.insert("backend", self.image_mixer.lock().name());
        state.insert("layers", frames.len() as u64);
        *self.state.lock() = state;

        Ok(MixedFrame::new(image, audio))
    }

    pub fn state(&self) -> MonitorState {
        self.state.lock().clone()
    }

    pub fn channel_index(&self) -> i32 {
        self.channel_index
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }
}

/// Sum layer audio in ascending layer order, padding or truncating each
/// contribution to exactly `len` interleaved samples.
fn mix_audio(frames: &BTreeMap<LayerId, DrawFrame>, len: usize) -> Vec<f32> {
    let mut mixed = vec![0.0f32; len];

    for frame in frames.values() {
        for leaf in frame.leaves() {
            for (out, &sample) in mixed.iter_mut().zip(leaf.audio.iter()) {
                *out += sample;
            }
        }
    }

    mixed
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Backend composing a black frame of the right size; for tests that
    /// only exercise pipeline plumbing.
    pub(crate) struct NullImageMixer;

    impl ImageMixer for NullImageMixer {
        fn compose(
            &mut self,
            _frames: &BTreeMap<LayerId, DrawFrame>,
            format: &VideoFormatDesc,
        ) -> Result<Vec<u8>> {
            Ok(vec![0u8; format.image_size()])
        }

        fn name(&self) -> String {
            "null".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::VideoFormat;
    use crate::core::frames::Frame;

    /// Backend that overlays layers by byte-wise max, good enough to observe
    /// determinism and ordering.
    struct StubImageMixer;

    impl ImageMixer for StubImageMixer {
        fn compose(
            &mut self,
            frames: &BTreeMap<LayerId, DrawFrame>,
            _format: &VideoFormatDesc,
        ) -> Result<Vec<u8>> {
            let mut out = vec![0u8; 4];
            for frame in frames.values() {
                for leaf in frame.leaves() {
                    for (o, &b) in out.iter_mut().zip(leaf.image.iter()) {
                        *o = (*o).max(b);
                    }
                }
            }
            Ok(out)
        }

        fn name(&self) -> String {
            "stub".to_string()
        }
    }

    fn pal() -> VideoFormatDesc {
        VideoFormatDesc::preset(VideoFormat::Pal)
    }

    fn mixer() -> Mixer {
        Mixer::new(1, Arc::new(Graph::new()), Box::new(StubImageMixer))
    }

    fn frames_with_audio() -> BTreeMap<LayerId, DrawFrame> {
        let mut frames = BTreeMap::new();
        frames.insert(0, DrawFrame::single(Frame::new(vec![1; 4], vec![0.25; 8])));
        frames.insert(1, DrawFrame::single(Frame::new(vec![9; 4], vec![0.5; 4])));
        frames
    }

    #[test]
    fn test_mix_is_deterministic() {
        let mixer = mixer();
        let frames = frames_with_audio();
        let a = mixer.mix(&frames, &pal(), 4).unwrap();
        let b = mixer.mix(&frames, &pal(), 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_audio_sums_and_truncates_to_cadence_slot() {
        let mixer = mixer();
        let mixed = mixer.mix(&frames_with_audio(), &pal(), 3).unwrap();

        // 3 samples * 2 channels
        assert_eq!(mixed.audio.len(), 6);
        // layer 1 contributes to the first 4 slots only
        assert_eq!(mixed.audio[0], 0.75);
        assert_eq!(mixed.audio[3], 0.75);
        assert_eq!(mixed.audio[4], 0.25);
    }

    #[test]
    fn test_short_layers_are_zero_padded() {
        let mixer = mixer();
        let mut frames = BTreeMap::new();
        frames.insert(0, DrawFrame::Empty);
        let mixed = mixer.mix(&frames, &pal(), 4).unwrap();
        assert_eq!(*mixed.audio, vec![0.0; 8]);
    }

    #[test]
    fn test_state_after_mix() {
        let mixer = mixer();
        mixer.mix(&frames_with_audio(), &pal(), 4).unwrap();
        let state = mixer.state();
        assert_eq!(state.get("backend"), Some(&serde_json::json!("stub")));
        assert_eq!(state.get("layers"), Some(&serde_json::json!(2)));
    }
}
