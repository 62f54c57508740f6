// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! Per-channel diagnostics graph.
//!
//! Named time-series values and event markers for the pipeline stages. The
//! channel records `produce-time`, `mix-time`, `consume-time` and `osc-time`
//! each tick, scaled so that 1.0 equals two frame periods; timecode
//! listeners mark `skipped-schedule` when scheduled work misses its slot.
//!
//! The graph is shared read-write across the tick and with listeners, so it
//! is internally synchronized. Rendering is out of scope; the snapshot
//! accessors exist for telemetry and tests.

use std::collections::HashMap;

use parking_lot::Mutex;

/// RGBA color hint for a series, used by whatever renders the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn with_alpha(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Default)]
struct GraphInner {
    text: String,
    colors: HashMap<String, Color>,
    values: HashMap<String, f64>,
    marks: HashMap<String, u64>,
}

/// Internally synchronized diagnostics sink.
#[derive(Default)]
pub struct Graph {
    inner: Mutex<GraphInner>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value for `name`, clamped to `0.0..=1.0`.
    pub fn set_value(&self, name: &str, value: f64) {
        let clamped = value.clamp(0.0, 1.0);
        self.inner.lock().values.insert(name.to_string(), clamped);
    }

    pub fn set_color(&self, name: &str, color: Color) {
        self.inner.lock().colors.insert(name.to_string(), color);
    }

    /// Set the graph caption, typically the channel's log prefix.
    pub fn set_text(&self, text: impl Into<String>) {
        self.inner.lock().text = text.into();
    }

    /// Record an event marker for `name` (e.g. a skipped schedule slot).
    pub fn mark(&self, name: &str) {
        *self.inner.lock().marks.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.inner.lock().values.get(name).copied()
    }

    pub fn mark_count(&self, name: &str) -> u64 {
        self.inner.lock().marks.get(name).copied().unwrap_or(0)
    }

    pub fn text(&self) -> String {
        self.inner.lock().text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_clamped() {
        let graph = Graph::new();
        graph.set_value("produce-time", 3.5);
        assert_eq!(graph.value("produce-time"), Some(1.0));
        graph.set_value("produce-time", -0.2);
        assert_eq!(graph.value("produce-time"), Some(0.0));
        graph.set_value("produce-time", 0.25);
        assert_eq!(graph.value("produce-time"), Some(0.25));
    }

    #[test]
    fn test_marks_accumulate() {
        let graph = Graph::new();
        assert_eq!(graph.mark_count("skipped-schedule"), 0);
        graph.mark("skipped-schedule");
        graph.mark("skipped-schedule");
        assert_eq!(graph.mark_count("skipped-schedule"), 2);
    }

    #[test]
    fn test_text_round_trip() {
        let graph = Graph::new();
        graph.set_text("video_channel[1|PAL]");
        assert_eq!(graph.text(), "video_channel[1|PAL]");
    }
}
