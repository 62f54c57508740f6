// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

use crate::core::error::Result;
use crate::core::format::VideoFormatDesc;
use crate::core::frames::DrawFrame;
use crate::core::monitor::MonitorState;

/// A frame source loaded onto a stage layer.
///
/// `receive` is called once per tick from the pipeline thread and must
/// return promptly; implementations doing real I/O are expected to decode
/// ahead on their own threads and hand over buffered frames here. The
/// `nb_samples` argument is the tick's audio cadence slot; the returned
/// frame must carry exactly that many samples per channel.
///
/// Producers needing the predicted timecode for stamping hold the channel's
/// [`ChannelTimecode`](crate::core::timecode::ChannelTimecode) handle, which
/// already carries the prediction when `receive` runs.
pub trait FrameProducer: Send {
    fn receive(&mut self, format: &VideoFormatDesc, nb_samples: usize) -> Result<DrawFrame>;

    fn name(&self) -> String;

    /// Producer-specific monitor state, nested by the stage under its layer.
    fn state(&self) -> MonitorState {
        MonitorState::new()
    }
}
