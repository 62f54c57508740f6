// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

use super::frame::Frame;

/// Per-layer frame produced on one tick.
///
/// A draw frame is either empty (nothing on the layer this tick), a single
/// [`Frame`], or an ordered composite of sub-frames (the whole-channel route
/// receives one composite per tick). It is owned for the duration of the
/// tick and then either dropped or retained by a route subscriber.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DrawFrame {
    #[default]
    Empty,
    Single(Frame),
    Composite(Vec<DrawFrame>),
}

impl DrawFrame {
    pub fn single(frame: Frame) -> Self {
        DrawFrame::Single(frame)
    }

    pub fn composite(frames: Vec<DrawFrame>) -> Self {
        DrawFrame::Composite(frames)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DrawFrame::Empty => true,
            DrawFrame::Single(_) => false,
            DrawFrame::Composite(frames) => frames.iter().all(DrawFrame::is_empty),
        }
    }

    /// The non-retaining variant of `frame` delivered to routes: the same
    /// payload with every producer keepalive severed, so a route holding the
    /// result pins only the pixels and samples it actually retains.
    pub fn pop(frame: &DrawFrame) -> DrawFrame {
        match frame {
            DrawFrame::Empty => DrawFrame::Empty,
            DrawFrame::Single(f) => DrawFrame::Single(f.detached()),
            DrawFrame::Composite(frames) => {
                DrawFrame::Composite(frames.iter().map(DrawFrame::pop).collect())
            }
        }
    }

    /// Iterate the leaf frames in composition order.
    pub fn leaves(&self) -> Vec<&Frame> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Frame>) {
        match self {
            DrawFrame::Empty => {}
            DrawFrame::Single(f) => out.push(f),
            DrawFrame::Composite(frames) => {
                for frame in frames {
                    frame.collect_leaves(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_detection() {
        assert!(DrawFrame::Empty.is_empty());
        assert!(DrawFrame::composite(vec![DrawFrame::Empty, DrawFrame::Empty]).is_empty());
        assert!(!DrawFrame::single(Frame::new(vec![0; 4], vec![])).is_empty());
    }

    #[test]
    fn test_pop_severs_keepalive_recursively() {
        let slot: Arc<dyn std::any::Any + Send + Sync> = Arc::new(());
        let frame = Frame::new(vec![1; 4], vec![0.0; 8]).with_keepalive(slot);
        let composite = DrawFrame::composite(vec![
            DrawFrame::single(frame.clone()),
            DrawFrame::Empty,
        ]);

        let popped = DrawFrame::pop(&composite);
        assert_eq!(popped, composite);
        for leaf in popped.leaves() {
            assert!(!leaf.has_keepalive());
        }
    }

    #[test]
    fn test_leaves_preserve_order() {
        let a = Frame::new(vec![1], vec![]);
        let b = Frame::new(vec![2], vec![]);
        let composite = DrawFrame::composite(vec![
            DrawFrame::single(a.clone()),
            DrawFrame::composite(vec![DrawFrame::single(b.clone())]),
        ]);
        let leaves = composite.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(*leaves[0], a);
        assert_eq!(*leaves[1], b);
    }
}
