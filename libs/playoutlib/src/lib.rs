//! # playoutlib - Realtime Playout Channel Pipeline
//!
//! A channel is a fixed-rate, soft-realtime loop that composites layered
//! producer frames into one output frame per tick and fans it out to
//! consumers, on a monotonic timecode clock with an exact audio sample
//! cadence.
//!
//! ## Architecture
//!
//! ```text
//! VideoChannel (one pipeline thread)
//!   ├─ Stage     - per-layer producers   → map<layer, DrawFrame>
//!   ├─ Mixer     - composites the layers → MixedFrame
//!   ├─ Output    - consumer fan-out (backpressure point)
//!   ├─ Routes    - weak per-layer / whole-channel subscribers
//!   └─ Timecode  - predict/commit frame counter + listeners
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use playoutlib::{VideoChannel, VideoFormat, VideoFormatDesc};
//!
//! let format = VideoFormatDesc::preset(VideoFormat::Hd1080p50);
//! let channel = VideoChannel::new(1, format, my_image_mixer, |state| {
//!     osc.publish(state);
//! })?;
//! channel.stage().load(10, my_producer)?;
//! channel.output().add(1, my_consumer);
//! ```

pub mod core;

pub use crate::core::{
    ChannelTimecode, Clock, Color, DrawFrame, FieldMode, Frame, FrameConsumer, FrameProducer,
    FrameTimecode, Framerate, Graph, ImageMixer, LayerId, ListenerToken, MixedFrame, Mixer,
    MonitorState, Output, PipelineError, Result, Route, Stage, SystemClock, TickFn,
    TimecodeSource, VideoChannel, VideoFormat, VideoFormatDesc, WHOLE_CHANNEL,
};
