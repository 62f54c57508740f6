// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

use crate::core::error::Result;
use crate::core::format::VideoFormatDesc;
use crate::core::frames::DrawFrame;
use crate::core::monitor::MonitorState;

use super::producer::FrameProducer;

/// One producer slot.
///
/// A paused layer republishes its last produced frame; an empty or stopped
/// layer yields [`DrawFrame::Empty`].
#[derive(Default)]
pub(super) struct Layer {
    foreground: Option<Box<dyn FrameProducer>>,
    paused: bool,
    frame_count: u64,
    last_frame: DrawFrame,
}

impl Layer {
    pub(super) fn load(&mut self, producer: Box<dyn FrameProducer>) {
        self.foreground = Some(producer);
        self.paused = false;
        self.frame_count = 0;
        self.last_frame = DrawFrame::Empty;
    }

    pub(super) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub(super) fn stop(&mut self) {
        self.foreground = None;
        self.paused = false;
        self.last_frame = DrawFrame::Empty;
    }

    pub(super) fn receive(
        &mut self,
        format: &VideoFormatDesc,
        nb_samples: usize,
    ) -> Result<DrawFrame> {
        if self.paused {
            return Ok(self.last_frame.clone());
        }

        let Some(producer) = self.foreground.as_mut() else {
            return Ok(DrawFrame::Empty);
        };

        let frame = producer.receive(format, nb_samples)?;
        self.frame_count += 1;
        self.last_frame = frame.clone();
        Ok(frame)
    }

    pub(super) fn foreground_name(&self) -> Option<String> {
        self.foreground.as_ref().map(|p| p.name())
    }

    pub(super) fn state(&self) -> MonitorState {
        let mut state = MonitorState::new();
        state.insert("frame", self.frame_count);
        state.insert("paused", self.paused);
        if let Some(producer) = &self.foreground {
            state.insert("producer", producer.name());
            state.insert_state("foreground", producer.state());
        }
        state
    }
}
