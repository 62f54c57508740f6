// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::Mutex;

use super::frame_timecode::FrameTimecode;
use super::source::WeakSourceProxy;
use super::TimecodeSource;
use crate::core::clocks::{Clock, SystemClock};
use crate::core::format::{Framerate, VideoFormatDesc};

const MILLIS_PER_DAY: i64 = 1000 * 60 * 60 * 24;

/// The channel's frame clock.
///
/// Free-running by default: the counter is derived from the wall clock and
/// an offset anchored by [`start`](Self::start). A [`TimecodeSource`] can be
/// attached to slave the counter to an external signal instead; commits then
/// adopt the source's timecode whenever it is valid.
///
/// Ticking is two-phase. `tick(false)` *predicts* the counter for the frame
/// being produced, so producers can stamp their output before the costly
/// produce step runs. `tick(true)` *commits*: it re-reads the clock to
/// absorb jitter introduced by produce, and its result is authoritative for
/// the tick. Committed counters never decrease; a wall clock stepping
/// backward is clamped to one frame past the previous commit.
pub struct ChannelTimecode {
    index: i32,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

struct Inner {
    framerate: Framerate,
    timecode: FrameTimecode,
    committed: FrameTimecode,
    clock_offset_ms: i64,
    source: Option<Arc<dyn TimecodeSource>>,
    is_system_clock: bool,
}

impl ChannelTimecode {
    pub fn new(index: i32, format: &VideoFormatDesc) -> Self {
        Self::with_clock(index, format, Arc::new(SystemClock))
    }

    /// Construction-time clock selection; there is no runtime clock swap.
    pub fn with_clock(index: i32, format: &VideoFormatDesc, clock: Arc<dyn Clock>) -> Self {
        Self {
            index,
            clock,
            inner: Mutex::new(Inner {
                framerate: format.framerate,
                timecode: FrameTimecode::new(0, format.framerate.rounded()),
                committed: FrameTimecode::EMPTY,
                clock_offset_ms: 0,
                source: None,
                is_system_clock: false,
            }),
        }
    }

    /// Anchor the counter to the current wall clock; counting starts at
    /// zero from this instant.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        let now = self.clock.now_ms();
        inner.update_offset(now, FrameTimecode::EMPTY);
    }

    /// Advance the clock for one pipeline tick.
    ///
    /// With `commit == false` the returned value is the *prediction* for the
    /// tick being produced; with `commit == true` it is final. Producers
    /// read the prediction through [`timecode`](Self::timecode).
    pub fn tick(&self, commit: bool) -> FrameTimecode {
        let mut inner = self.inner.lock();
        let fps = inner.framerate.rounded();

        if commit && !inner.is_free() {
            let tc = inner
                .source
                .as_ref()
                .map(|src| src.timecode())
                .unwrap_or(FrameTimecode::EMPTY);

            if tc.is_valid() {
                let tc = tc.with_fps(fps);
                let now = self.clock.now_ms();
                inner.update_offset(now, tc);
                inner.timecode = tc;
                inner.committed = tc;
                return tc;
            }

            // source produced nothing usable; fall back to the wall clock
            tracing::warn!("[timecode-{}] Timecode update invalid. Ignoring", self.index);
        }

        let millis = (self.clock.now_ms() - inner.clock_offset_ms).rem_euclid(MILLIS_PER_DAY);
        let frames = (millis as f64 * inner.framerate.as_f64() / 1000.0).round() as i64;
        let mut tc = FrameTimecode::new(frames as u32, fps);

        if commit {
            tc = clamp_regression(tc, inner.committed);
            inner.committed = tc;
        }

        inner.timecode = tc;
        tc
    }

    /// Most recent value returned by [`tick`](Self::tick) — the prediction
    /// during produce, the committed value after.
    pub fn timecode(&self) -> FrameTimecode {
        self.inner.lock().timecode
    }

    /// Seed the counter. Accepted only while free-running; a slaved channel
    /// follows its source.
    pub fn set_timecode(&self, tc: FrameTimecode) {
        let mut inner = self.inner.lock();
        if inner.is_free() {
            let now = self.clock.now_ms();
            inner.update_offset(now, tc);
            inner.timecode = tc;
            // an explicit seed restarts the commit sequence
            inner.committed = FrameTimecode::EMPTY;
        }
    }

    /// Rebase the counter for a new video format so that the instant of the
    /// change maps consistently: observers see the counter continue at the
    /// new rate, never jump backward.
    pub fn change_format(&self, format: &VideoFormatDesc) {
        let mut inner = self.inner.lock();
        let fps = format.framerate.rounded();
        inner.framerate = format.framerate;
        inner.timecode = inner.timecode.with_fps(fps);
        if inner.committed.is_valid() {
            inner.committed = inner.committed.with_fps(fps);
        }
    }

    /// Whether the counter is free-running (no source, or source currently
    /// without timecode).
    pub fn is_free(&self) -> bool {
        self.inner.lock().is_free()
    }

    /// Slave the counter to `src`, keeping it alive for as long as it is
    /// attached. Returns false if the source cannot provide timecode.
    pub fn set_source(&self, src: Arc<dyn TimecodeSource>) -> bool {
        if !src.provides_timecode() {
            return false;
        }

        tracing::info!("[timecode-{}] Loaded source {}", self.index, src.name());
        let mut inner = self.inner.lock();
        inner.source = Some(src);
        inner.is_system_clock = false;
        true
    }

    /// Slave the counter to `src` without extending its lifetime; when the
    /// source is dropped the channel degrades to free-run.
    pub fn set_weak_source(&self, src: Arc<dyn TimecodeSource>) -> bool {
        if !src.provides_timecode() {
            return false;
        }

        tracing::info!("[timecode-{}] Loaded source {}", self.index, src.name());
        let proxy = Arc::new(WeakSourceProxy::new(self.index, &src));
        let mut inner = self.inner.lock();
        inner.source = Some(proxy);
        inner.is_system_clock = false;
        true
    }

    pub fn clear_source(&self) {
        tracing::info!("[timecode-{}] Set to freerun", self.index);
        let mut inner = self.inner.lock();
        inner.source = None;
        inner.is_system_clock = false;
    }

    /// Follow time-of-day: the counter becomes the wall clock's frame count
    /// since midnight.
    pub fn set_system_time(&self) {
        tracing::info!("[timecode-{}] Set to system clock", self.index);
        let mut inner = self.inner.lock();
        inner.source = None;
        inner.clock_offset_ms = 0;
        inner.is_system_clock = true;
    }

    pub fn source_name(&self) -> String {
        let inner = self.inner.lock();
        if let Some(src) = &inner.source {
            return src.name();
        }
        if inner.is_system_clock {
            return "system".to_string();
        }
        "free".to_string()
    }
}

impl Inner {
    fn is_free(&self) -> bool {
        !self.source.as_ref().is_some_and(|src| src.has_timecode())
    }

    fn update_offset(&mut self, now_ms: i64, tc: FrameTimecode) {
        self.clock_offset_ms = now_ms - tc.pts();
        self.is_system_clock = false;
    }
}

/// Committed counters are non-decreasing; a backward step of the wall clock
/// yields one frame past the previous commit instead. Large backward jumps
/// are the 24h wrap and pass through.
fn clamp_regression(tc: FrameTimecode, committed: FrameTimecode) -> FrameTimecode {
    if !committed.is_valid() || committed.fps() != tc.fps() {
        return tc;
    }

    if tc.total_frames() < committed.total_frames()
        && committed.total_frames() - tc.total_frames() < committed.max_frames() / 2
    {
        return committed.wrapping_add(1);
    }

    tc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::VideoFormat;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct TestClock(AtomicI64);

    impl TestClock {
        fn new(ms: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(ms)))
        }

        fn set_ms(&self, ms: i64) {
            self.0.store(ms, Ordering::SeqCst);
        }

        fn advance_ms(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for TestClock {
        fn now_ns(&self) -> i64 {
            self.0.load(Ordering::SeqCst) * 1_000_000
        }
        fn description(&self) -> &str {
            "test"
        }
    }

    fn pal_timecode(clock: &Arc<TestClock>) -> ChannelTimecode {
        let format = VideoFormatDesc::preset(VideoFormat::Pal);
        let clock: Arc<TestClock> = Arc::clone(clock);
        let clock: Arc<dyn Clock> = clock;
        let tc = ChannelTimecode::with_clock(1, &format, clock);
        tc.start();
        tc
    }

    #[test]
    fn test_counts_frames_from_start() {
        let clock = TestClock::new(1_000_000);
        let tc = pal_timecode(&clock);

        assert_eq!(tc.tick(true).total_frames(), 0);

        clock.advance_ms(40);
        assert_eq!(tc.tick(true).total_frames(), 1);

        clock.advance_ms(400);
        assert_eq!(tc.tick(true).total_frames(), 11);
    }

    #[test]
    fn test_predict_equals_commit_when_clock_is_still() {
        let clock = TestClock::new(5_000);
        let tc = pal_timecode(&clock);
        clock.advance_ms(123);

        let predicted = tc.tick(false);
        let committed = tc.tick(true);
        assert_eq!(predicted, committed);
    }

    #[test]
    fn test_commit_clamps_clock_regression() {
        let clock = TestClock::new(100_000);
        let tc = pal_timecode(&clock);

        clock.advance_ms(1000);
        let first = tc.tick(true);
        assert_eq!(first.total_frames(), 25);

        // Wall clock steps backward (e.g. NTP correction)
        clock.set_ms(100_200);
        let second = tc.tick(true);
        assert_eq!(second.total_frames(), 26, "clamped to last committed + 1");

        clock.set_ms(101_400);
        let third = tc.tick(true);
        assert_eq!(third.total_frames(), 35);
    }

    #[test]
    fn test_change_format_does_not_jump_backward() {
        let clock = TestClock::new(0);
        let tc = pal_timecode(&clock);

        clock.advance_ms(10_000);
        let before = tc.tick(true);
        assert_eq!(before.total_frames(), 250);

        let fifty = VideoFormatDesc::preset(VideoFormat::Hd1080p50);
        tc.change_format(&fifty);

        let after = tc.tick(true);
        assert_eq!(after.fps(), 50);
        assert!(after.pts() >= before.pts(), "counter must continue, not rewind");
        assert_eq!(after.total_frames(), 500);
    }

    #[test]
    fn test_source_drives_commits() {
        struct Src;
        impl TimecodeSource for Src {
            fn timecode(&self) -> FrameTimecode {
                FrameTimecode::new(1000, 25)
            }
            fn has_timecode(&self) -> bool {
                true
            }
            fn provides_timecode(&self) -> bool {
                true
            }
            fn name(&self) -> String {
                "decklink-1".to_string()
            }
        }

        let clock = TestClock::new(0);
        let tc = pal_timecode(&clock);
        assert_eq!(tc.source_name(), "free");

        assert!(tc.set_source(Arc::new(Src)));
        assert_eq!(tc.source_name(), "decklink-1");
        assert!(!tc.is_free());

        let committed = tc.tick(true);
        assert_eq!(committed.total_frames(), 1000);

        // prediction still derives from the (re-anchored) wall clock
        clock.advance_ms(40);
        assert_eq!(tc.tick(false).total_frames(), 1001);
    }

    #[test]
    fn test_weak_source_degrades_to_freerun() {
        struct Src;
        impl TimecodeSource for Src {
            fn timecode(&self) -> FrameTimecode {
                FrameTimecode::new(500, 25)
            }
            fn has_timecode(&self) -> bool {
                true
            }
            fn provides_timecode(&self) -> bool {
                true
            }
            fn name(&self) -> String {
                "input".to_string()
            }
        }

        let clock = TestClock::new(0);
        let tc = pal_timecode(&clock);

        let src: Arc<dyn TimecodeSource> = Arc::new(Src);
        assert!(tc.set_weak_source(Arc::clone(&src)));
        assert_eq!(tc.tick(true).total_frames(), 500);

        drop(src);
        assert!(tc.is_free());
        assert_eq!(tc.source_name(), "free");

        // free-running again, continuing from the source's last anchor
        clock.advance_ms(80);
        assert_eq!(tc.tick(true).total_frames(), 502);
    }

    #[test]
    fn test_set_timecode_only_when_free() {
        let clock = TestClock::new(0);
        let tc = pal_timecode(&clock);

        let seed = FrameTimecode::new(90_000, 25); // 01:00:00:00
        tc.set_timecode(seed);
        assert_eq!(tc.tick(true).total_frames(), 90_000);
    }
}
