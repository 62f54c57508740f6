// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! The producer set: numbered layers that each yield one frame per tick.

mod layer;
mod producer;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::diagnostics::Graph;
use crate::core::error::{PipelineError, Result};
use crate::core::format::VideoFormatDesc;
use crate::core::frames::{DrawFrame, LayerId};
use crate::core::monitor::MonitorState;

use layer::Layer;
pub use producer::FrameProducer;

/// Holds the channel's layers and drives their producers once per tick.
///
/// Producing never fails as a whole: a layer whose producer errors or
/// panics contributes an empty frame for that tick and the rest of the
/// layers are unaffected. Command-side operations (`load`, `play`, ...)
/// serialize against the produce call on the internal lock.
pub struct Stage {
    channel_index: i32,
    graph: Arc<Graph>,
    layers: Mutex<BTreeMap<LayerId, Layer>>,
    state: Mutex<MonitorState>,
}

impl Stage {
    pub fn new(channel_index: i32, graph: Arc<Graph>) -> Self {
        Self {
            channel_index,
            graph,
            layers: Mutex::new(BTreeMap::new()),
            state: Mutex::new(MonitorState::new()),
        }
    }

    /// Produce one frame per active layer for this tick.
    pub fn produce(
        &self,
        format: &VideoFormatDesc,
        nb_samples: usize,
    ) -> BTreeMap<LayerId, DrawFrame> {
        let mut layers = self.layers.lock();
        let mut frames = BTreeMap::new();
        let mut state = MonitorState::new();

        for (&id, layer) in layers.iter_mut() {
            let frame = match catch_unwind(AssertUnwindSafe(|| layer.receive(format, nb_samples))) {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => {
                    tracing::warn!(
                        "[stage-{}] Layer {} failed to produce: {}",
                        self.channel_index,
                        id,
                        e
                    );
                    DrawFrame::Empty
                }
                Err(_) => {
                    tracing::error!(
                        "[stage-{}] Layer {} panicked while producing",
                        self.channel_index,
                        id
                    );
                    DrawFrame::Empty
                }
            };
            frames.insert(id, frame);
            state.insert_state(&format!("layer/{id}"), layer.state());
        }

        *self.state.lock() = state;
        frames
    }

    pub fn load(&self, layer: LayerId, producer: Box<dyn FrameProducer>) -> Result<()> {
        if layer < 0 {
            return Err(PipelineError::Produce(format!(
                "layer id must be non-negative, got {layer}"
            )));
        }

        tracing::info!(
            "[stage-{}] Loaded {} onto layer {}",
            self.channel_index,
            producer.name(),
            layer
        );
        self.layers.lock().entry(layer).or_default().load(producer);
        Ok(())
    }

    pub fn pause(&self, layer: LayerId) {
        if let Some(layer) = self.layers.lock().get_mut(&layer) {
            layer.set_paused(true);
        }
    }

    pub fn resume(&self, layer: LayerId) {
        if let Some(layer) = self.layers.lock().get_mut(&layer) {
            layer.set_paused(false);
        }
    }

    /// Unload the layer's producer, leaving the layer slot in place.
    pub fn stop(&self, layer: LayerId) {
        if let Some(layer) = self.layers.lock().get_mut(&layer) {
            layer.stop();
        }
    }

    /// Remove one layer entirely.
    pub fn clear_layer(&self, layer: LayerId) {
        self.layers.lock().remove(&layer);
    }

    /// Remove all layers. Invoked on channel format changes.
    pub fn clear(&self) {
        self.layers.lock().clear();
    }

    pub fn foreground_name(&self, layer: LayerId) -> Option<String> {
        self.layers
            .lock()
            .get(&layer)
            .and_then(Layer::foreground_name)
    }

    pub fn active_layers(&self) -> Vec<LayerId> {
        self.layers.lock().keys().copied().collect()
    }

    pub fn state(&self) -> MonitorState {
        self.state.lock().clone()
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::VideoFormat;
    use crate::core::frames::Frame;

    struct TagProducer {
        tag: u8,
        seen_samples: Vec<usize>,
    }

    impl TagProducer {
        fn boxed(tag: u8) -> Box<dyn FrameProducer> {
            Box::new(Self {
                tag,
                seen_samples: Vec::new(),
            })
        }
    }

    impl FrameProducer for TagProducer {
        fn receive(&mut self, _format: &VideoFormatDesc, nb_samples: usize) -> Result<DrawFrame> {
            self.seen_samples.push(nb_samples);
            Ok(DrawFrame::single(Frame::new(
                vec![self.tag; 4],
                vec![0.0; nb_samples * 2],
            )))
        }

        fn name(&self) -> String {
            format!("tag[{}]", self.tag)
        }
    }

    struct FailingProducer;

    impl FrameProducer for FailingProducer {
        fn receive(&mut self, _format: &VideoFormatDesc, _nb_samples: usize) -> Result<DrawFrame> {
            Err(PipelineError::Produce("decode underrun".into()))
        }

        fn name(&self) -> String {
            "failing".to_string()
        }
    }

    fn stage() -> Stage {
        Stage::new(1, Arc::new(Graph::new()))
    }

    fn pal() -> VideoFormatDesc {
        VideoFormatDesc::preset(VideoFormat::Pal)
    }

    #[test]
    fn test_one_frame_per_active_layer() {
        let stage = stage();
        stage.load(0, TagProducer::boxed(0xaa)).unwrap();
        stage.load(5, TagProducer::boxed(0xbb)).unwrap();

        let frames = stage.produce(&pal(), 1920);
        assert_eq!(frames.len(), 2);
        assert!(!frames[&0].is_empty());
        assert!(!frames[&5].is_empty());
    }

    #[test]
    fn test_failing_layer_yields_empty_frame() {
        let stage = stage();
        stage.load(0, TagProducer::boxed(1)).unwrap();
        stage.load(1, Box::new(FailingProducer)).unwrap();

        let frames = stage.produce(&pal(), 1920);
        assert_eq!(frames.len(), 2, "failed layer still appears in the map");
        assert!(!frames[&0].is_empty());
        assert!(frames[&1].is_empty());

        // the stage keeps working on the next tick
        let frames = stage.produce(&pal(), 1920);
        assert!(!frames[&0].is_empty());
    }

    #[test]
    fn test_panicking_layer_yields_empty_frame() {
        struct PanicProducer;
        impl FrameProducer for PanicProducer {
            fn receive(&mut self, _: &VideoFormatDesc, _: usize) -> Result<DrawFrame> {
                panic!("bad producer");
            }
            fn name(&self) -> String {
                "panic".to_string()
            }
        }

        let stage = stage();
        stage.load(0, Box::new(PanicProducer)).unwrap();
        stage.load(1, TagProducer::boxed(2)).unwrap();

        let frames = stage.produce(&pal(), 1920);
        assert!(frames[&0].is_empty());
        assert!(!frames[&1].is_empty());
    }

    #[test]
    fn test_paused_layer_repeats_last_frame() {
        let stage = stage();
        stage.load(0, TagProducer::boxed(3)).unwrap();

        let first = stage.produce(&pal(), 1920);
        stage.pause(0);
        let second = stage.produce(&pal(), 1920);
        assert_eq!(first[&0], second[&0]);

        stage.resume(0);
        stage.stop(0);
        let third = stage.produce(&pal(), 1920);
        assert!(third[&0].is_empty(), "stopped layer goes dark");
    }

    #[test]
    fn test_clear_removes_all_layers() {
        let stage = stage();
        stage.load(0, TagProducer::boxed(1)).unwrap();
        stage.load(1, TagProducer::boxed(2)).unwrap();
        stage.clear();

        assert!(stage.active_layers().is_empty());
        assert!(stage.produce(&pal(), 1920).is_empty());
    }

    #[test]
    fn test_negative_layer_rejected() {
        let stage = stage();
        assert!(stage.load(-1, TagProducer::boxed(1)).is_err());
    }

    #[test]
    fn test_state_published_per_layer() {
        let stage = stage();
        stage.load(2, TagProducer::boxed(1)).unwrap();
        stage.produce(&pal(), 1920);

        let state = stage.state();
        assert_eq!(
            state.get("layer/2/producer"),
            Some(&serde_json::json!("tag[1]"))
        );
    }
}
