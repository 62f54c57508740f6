// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! playoutlib core: the channel pipeline and its collaborator contracts.
//!
//! Producer, consumer and image-mixer implementations live in separate
//! crates and plug in through the traits defined here.

pub mod channel;
pub mod clocks;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod frames;
pub mod listeners;
pub mod mixer;
pub mod monitor;
pub mod output;
pub mod routes;
pub mod stage;
pub mod timecode;

// Re-export core types
pub use self::channel::{TickFn, VideoChannel};
pub use self::clocks::{Clock, SystemClock};
pub use self::diagnostics::{Color, Graph};
pub use self::error::{PipelineError, Result};
pub use self::format::{FieldMode, Framerate, VideoFormat, VideoFormatDesc};
pub use self::frames::{DrawFrame, Frame, LayerId, MixedFrame, WHOLE_CHANNEL};
pub use self::listeners::{ListenerToken, TimecodeListeners};
pub use self::mixer::{ImageMixer, Mixer};
pub use self::monitor::MonitorState;
pub use self::output::{FrameConsumer, Output};
pub use self::routes::Route;
pub use self::stage::{FrameProducer, Stage};
pub use self::timecode::{ChannelTimecode, FrameTimecode, TimecodeSource};
