// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! Channel timecode: frame counters, predict/commit clocking and sources.

mod channel_timecode;
mod frame_timecode;
mod source;

pub use channel_timecode::ChannelTimecode;
pub use frame_timecode::FrameTimecode;
pub use source::TimecodeSource;
