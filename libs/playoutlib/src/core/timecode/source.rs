// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::frame_timecode::FrameTimecode;

/// An external clock a channel can slave its timecode to, typically a
/// producer decoding embedded timecode from an input signal.
pub trait TimecodeSource: Send + Sync {
    /// The source's current timecode; [`FrameTimecode::EMPTY`] when none is
    /// available right now.
    fn timecode(&self) -> FrameTimecode;

    /// Whether a timecode is currently available.
    fn has_timecode(&self) -> bool;

    /// Whether this source is able to provide timecode at all. Checked once
    /// when the source is attached.
    fn provides_timecode(&self) -> bool;

    fn name(&self) -> String;
}

/// Non-owning adapter around a [`TimecodeSource`].
///
/// The channel must never extend a producer's lifetime, so a weakly attached
/// source is observed through this proxy. Once the underlying source is
/// dropped the proxy degrades to "no timecode" permanently, logging the loss
/// once.
pub(super) struct WeakSourceProxy {
    index: i32,
    src: Weak<dyn TimecodeSource>,
    lost: AtomicBool,
}

impl WeakSourceProxy {
    pub(super) fn new(index: i32, src: &Arc<dyn TimecodeSource>) -> Self {
        Self {
            index,
            src: Arc::downgrade(src),
            lost: AtomicBool::new(false),
        }
    }

    fn upgrade(&self) -> Option<Arc<dyn TimecodeSource>> {
        if self.lost.load(Ordering::Relaxed) {
            return None;
        }

        let src = self.src.upgrade();
        if src.is_none() && !self.lost.swap(true, Ordering::Relaxed) {
            tracing::warn!("[timecode-{}] Lost timecode source", self.index);
        }
        src
    }
}

impl TimecodeSource for WeakSourceProxy {
    fn timecode(&self) -> FrameTimecode {
        self.upgrade()
            .map(|src| src.timecode())
            .unwrap_or(FrameTimecode::EMPTY)
    }

    fn has_timecode(&self) -> bool {
        self.upgrade().is_some_and(|src| src.has_timecode())
    }

    fn provides_timecode(&self) -> bool {
        self.upgrade().is_some_and(|src| src.provides_timecode())
    }

    fn name(&self) -> String {
        match self.upgrade() {
            Some(src) => src.name(),
            None => "free".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(FrameTimecode);

    impl TimecodeSource for FixedSource {
        fn timecode(&self) -> FrameTimecode {
            self.0
        }
        fn has_timecode(&self) -> bool {
            true
        }
        fn provides_timecode(&self) -> bool {
            true
        }
        fn name(&self) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn test_proxy_follows_live_source() {
        let tc = FrameTimecode::new(100, 25);
        let src: Arc<dyn TimecodeSource> = Arc::new(FixedSource(tc));
        let proxy = WeakSourceProxy::new(1, &src);

        assert!(proxy.has_timecode());
        assert_eq!(proxy.timecode(), tc);
        assert_eq!(proxy.name(), "fixed");
    }

    #[test]
    fn test_proxy_degrades_after_drop() {
        let src: Arc<dyn TimecodeSource> = Arc::new(FixedSource(FrameTimecode::new(1, 25)));
        let proxy = WeakSourceProxy::new(1, &src);
        drop(src);

        assert!(!proxy.has_timecode());
        assert_eq!(proxy.timecode(), FrameTimecode::EMPTY);
        assert_eq!(proxy.name(), "free");
    }
}
