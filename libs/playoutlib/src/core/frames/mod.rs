// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! Frame payloads flowing through the pipeline.

mod draw_frame;
mod frame;

pub use draw_frame::DrawFrame;
pub use frame::{Frame, MixedFrame};

/// Numbered producer slot inside the stage.
///
/// Non-negative ids address layers; [`WHOLE_CHANNEL`] addresses the
/// composited channel output for routing purposes.
pub type LayerId = i32;

/// Route key for the composited whole-channel output.
pub const WHOLE_CHANNEL: LayerId = -1;
