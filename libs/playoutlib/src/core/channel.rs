// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! The video channel: one pipeline thread ticking at the frame rate.
//!
//! Every tick drives produce → mix → consume for one composited frame:
//!
//! 1. snapshot the format and rotate the audio cadence
//! 2. predict the timecode for producers
//! 3. produce one frame per layer
//! 4. commit the timecode
//! 5. invoke timecode listeners (scheduled-command dispatch)
//! 6. mix the layers into one frame
//! 7. hand the frame to the consumers (the backpressure point)
//! 8. fan per-layer and whole-channel frames out to routes
//! 9. publish monitor state
//!
//! The loop runs as fast as the consumers admit frames and never sleeps on
//! its own. Any failure inside a tick is logged and the tick is abandoned;
//! the next tick starts clean.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::diagnostics::{Color, Graph};
use crate::core::error::Result;
use crate::core::format::VideoFormatDesc;
use crate::core::frames::LayerId;
use crate::core::listeners::{panic_message, ListenerToken, TimecodeListeners};
use crate::core::mixer::{ImageMixer, Mixer};
use crate::core::monitor::MonitorState;
use crate::core::output::Output;
use crate::core::routes::{Route, Routes};
use crate::core::stage::Stage;
use crate::core::timecode::{ChannelTimecode, FrameTimecode};

/// Callback receiving the per-tick monitor state snapshot.
pub type TickFn = Box<dyn Fn(&MonitorState) + Send + Sync>;

struct FormatState {
    desc: VideoFormatDesc,
    cadence: Vec<usize>,
}

struct ChannelCore {
    index: i32,
    format: Mutex<FormatState>,
    timecode: Arc<ChannelTimecode>,
    graph: Arc<Graph>,
    stage: Arc<Stage>,
    mixer: Arc<Mixer>,
    output: Arc<Output>,
    routes: Routes,
    listeners: TimecodeListeners,
    state: Mutex<MonitorState>,
    tick_fn: TickFn,
}

/// A playout channel owning its pipeline thread.
///
/// Dropping the channel aborts the loop cooperatively: the in-flight tick
/// completes, then the thread exits and is joined.
pub struct VideoChannel {
    core: Arc<ChannelCore>,
    abort: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl VideoChannel {
    pub fn new(
        index: i32,
        format_desc: VideoFormatDesc,
        image_mixer: Box<dyn ImageMixer>,
        tick_fn: impl Fn(&MonitorState) + Send + Sync + 'static,
    ) -> Result<Self> {
        let graph = Arc::new(Graph::new());
        graph.set_color("produce-time", Color::new(0.0, 1.0, 0.0));
        graph.set_color("mix-time", Color::with_alpha(1.0, 0.0, 0.9, 0.8));
        graph.set_color("consume-time", Color::with_alpha(1.0, 0.4, 0.0, 0.8));
        graph.set_color("osc-time", Color::with_alpha(0.3, 0.4, 0.0, 0.8));
        graph.set_color("skipped-schedule", Color::new(0.3, 0.6, 0.6));
        graph.set_text(format!("video_channel[{}|{}]", index, format_desc.name));

        let timecode = Arc::new(ChannelTimecode::new(index, &format_desc));
        timecode.start();

        let core = Arc::new(ChannelCore {
            index,
            format: Mutex::new(FormatState {
                cadence: format_desc.audio_cadence.clone(),
                desc: format_desc,
            }),
            timecode,
            stage: Arc::new(Stage::new(index, Arc::clone(&graph))),
            mixer: Arc::new(Mixer::new(index, Arc::clone(&graph), image_mixer)),
            output: Arc::new(Output::new(index, Arc::clone(&graph))),
            routes: Routes::new(index),
            listeners: TimecodeListeners::new(),
            state: Mutex::new(MonitorState::new()),
            tick_fn: Box::new(tick_fn),
            graph,
        });

        tracing::info!("{} Successfully initialized", core.print());

        let abort = Arc::new(AtomicBool::new(false));
        let thread = {
            let core = Arc::clone(&core);
            let abort = Arc::clone(&abort);
            std::thread::Builder::new()
                .name(format!("video-channel-{index}"))
                .spawn(move || {
                    while !abort.load(Ordering::Acquire) {
                        match catch_unwind(AssertUnwindSafe(|| core.tick())) {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                tracing::error!("{} Tick failed: {}", core.print(), e);
                            }
                            Err(panic) => {
                                tracing::error!(
                                    "{} Tick panicked: {}",
                                    core.print(),
                                    panic_message(&panic)
                                );
                            }
                        }
                    }
                })?
        };

        Ok(Self {
            core,
            abort,
            thread: Some(thread),
        })
    }

    pub fn index(&self) -> i32 {
        self.core.index
    }

    pub fn stage(&self) -> &Arc<Stage> {
        &self.core.stage
    }

    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.core.mixer
    }

    pub fn output(&self) -> &Arc<Output> {
        &self.core.output
    }

    pub fn timecode(&self) -> &Arc<ChannelTimecode> {
        &self.core.timecode
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.core.graph
    }

    /// The route for `layer` (`WHOLE_CHANNEL` for the composited output),
    /// created on demand. The channel keeps only a weak reference: dropping
    /// the returned handle ends the subscription.
    pub fn route(&self, layer: LayerId) -> Arc<Route> {
        let format = self.core.format.lock().desc.clone();
        self.core.routes.get_or_create(layer, &format)
    }

    /// Register a per-tick timecode listener, invoked after each commit with
    /// the committed timecode and the channel's diagnostics graph.
    #[must_use = "dropping the token unregisters the listener"]
    pub fn add_timecode_listener(
        &self,
        listener: impl Fn(FrameTimecode, &Arc<Graph>) + Send + Sync + 'static,
    ) -> ListenerToken {
        self.core.listeners.add(listener)
    }

    pub fn video_format_desc(&self) -> VideoFormatDesc {
        self.core.format.lock().desc.clone()
    }

    /// Switch the channel to a new video format.
    ///
    /// Takes effect on the next tick: the cadence is replaced, the timecode
    /// is rebased so the counter continues without jumping backward, and the
    /// stage is cleared of residual layers.
    pub fn set_video_format_desc(&self, format_desc: VideoFormatDesc) {
        tracing::info!(
            "{} Switching format to {}",
            self.core.print(),
            format_desc.name
        );

        {
            let mut format = self.core.format.lock();
            format.cadence = format_desc.audio_cadence.clone();
            format.desc = format_desc.clone();
        }

        self.core.timecode.change_format(&format_desc);
        self.core.stage.clear();
        self.core
            .graph
            .set_text(format!("video_channel[{}|{}]", self.core.index, format_desc.name));
    }

    /// The monitor state published by the most recent completed tick.
    pub fn state(&self) -> MonitorState {
        self.core.state.lock().clone()
    }
}

impl Drop for VideoChannel {
    fn drop(&mut self) {
        tracing::info!("{} Uninitializing", self.core.print());
        self.abort.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl ChannelCore {
    fn print(&self) -> String {
        format!("video_channel[{}|{}]", self.index, self.format.lock().desc.name)
    }

    fn tick(&self) -> Result<()> {
        let tick_start = Instant::now();

        // Snapshot the format and rotate the cadence: the last entry moves
        // to the front and becomes this tick's sample count.
        let (format_desc, nb_samples) = {
            let mut format = self.format.lock();
            format.cadence.rotate_right(1);
            (format.desc.clone(), format.cadence[0])
        };
        let fps = format_desc.fps();

        let mut state = MonitorState::new();

        // Predict the timecode for producers to stamp their output with.
        self.timecode.tick(false);

        // Produce
        let produce_timer = Instant::now();
        let stage_frames = self.stage.produce(&format_desc, nb_samples);
        self.graph
            .set_value("produce-time", produce_timer.elapsed().as_secs_f64() * fps * 0.5);

        state.insert_state("stage", self.stage.state());

        // Ensure it is accurate now that the producers have run
        let timecode = self.timecode.tick(true);

        // Dispatch anything scheduled for the committed timecode
        self.listeners.invoke(timecode, &self.graph);

        // Mix
        let mix_timer = Instant::now();
        let mixed_frame = self
            .mixer
            .mix(&stage_frames, &format_desc, format_desc.audio_cadence[0])?;
        self.graph
            .set_value("mix-time", mix_timer.elapsed().as_secs_f64() * fps * 0.5);

        state.insert_state("mixer", self.mixer.state());

        // Consume; the consumers' admission control paces the loop
        let consume_timer = Instant::now();
        self.output.send(&timecode, &mixed_frame, &format_desc);
        self.graph
            .set_value("consume-time", consume_timer.elapsed().as_secs_f64() * fps * 0.5);

        self.routes.fan_out(&stage_frames);

        state.insert_state("output", self.output.state());
        state.insert("timecode", timecode.to_string());
        state.insert("timecode/source", self.timecode.source_name());

        let osc_timer = Instant::now();
        (self.tick_fn)(&state);
        self.graph
            .set_value("osc-time", osc_timer.elapsed().as_secs_f64() * fps * 0.5);

        *self.state.lock() = state;

        let period = Duration::from_nanos(format_desc.framerate.frame_duration_ns() as u64);
        if tick_start.elapsed() > period {
            self.graph.mark("skipped-schedule");
            tracing::debug!(
                "{} Tick overran its {:?} budget ({:?})",
                self.print(),
                period,
                tick_start.elapsed()
            );
        }

        Ok(())
    }
}
