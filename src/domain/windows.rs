//! Appearance windows: which source frames end up in a player's clip.
//!
//! Every detected frame index starts a fixed-size window. Windows are emitted
//! in ascending order of their start and are never merged, so two detections
//! a couple of frames apart produce overlapping, repeated footage.

use std::collections::VecDeque;
use std::ops::Range;

pub const DEFAULT_WINDOW_FRAMES: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowPlan {
    pub windows: Vec<Range<u64>>,
    /// Start indices that lie beyond the end of the source.
    pub skipped: Vec<u64>,
}

impl WindowPlan {
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn total_frames(&self) -> u64 {
        self.windows.iter().map(|w| w.end - w.start).sum()
    }

    fn longest(&self) -> usize {
        self.windows
            .iter()
            .map(|w| (w.end - w.start) as usize)
            .max()
            .unwrap_or(1)
    }
}

/// Lay out windows of `window` frames over a source of `frame_count` frames.
///
/// A window whose start lies beyond the source is skipped; one that starts
/// inside but runs past the end is cut at the last frame.
pub fn plan_windows(frames: &[u64], window: u64, frame_count: u64) -> WindowPlan {
    let window = window.max(1);
    let mut starts = frames.to_vec();
    starts.sort_unstable();

    let mut plan = WindowPlan::default();
    for start in starts {
        if start >= frame_count {
            plan.skipped.push(start);
        } else {
            plan.windows
                .push(start..start.saturating_add(window).min(frame_count));
        }
    }
    plan
}

pub fn has_in_range(frames: &[u64], frame_count: u64) -> bool {
    frames.iter().any(|&frame| frame < frame_count)
}

/// Feeds decoded frames, in decode order, into the planned windows.
///
/// Only the last `longest window` frames are kept, which is enough to replay
/// the overlap between a window and the one that follows it.
pub struct WindowCursor<F> {
    windows: Vec<Range<u64>>,
    current: usize,
    next: u64,
    recent: VecDeque<(u64, F)>,
    capacity: usize,
}

impl<F: Clone> WindowCursor<F> {
    pub fn new(plan: &WindowPlan) -> Self {
        Self {
            next: plan.windows.first().map(|w| w.start).unwrap_or(0),
            windows: plan.windows.clone(),
            current: 0,
            recent: VecDeque::new(),
            capacity: plan.longest(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.current >= self.windows.len()
    }

    /// Frames before the current window's start are never needed again.
    pub fn wants(&self, index: u64) -> bool {
        self.windows
            .get(self.current)
            .map(|w| index >= w.start)
            .unwrap_or(false)
    }

    /// Offer the frame at `index`; `emit` receives every output frame it unlocks.
    pub fn push<E>(
        &mut self,
        index: u64,
        frame: F,
        mut emit: impl FnMut(F) -> Result<(), E>,
    ) -> Result<(), E> {
        if !self.wants(index) {
            return Ok(());
        }
        self.recent.push_back((index, frame));
        if self.recent.len() > self.capacity {
            self.recent.pop_front();
        }

        while let Some(window) = self.windows.get(self.current) {
            if self.next >= window.end {
                self.current += 1;
                if let Some(following) = self.windows.get(self.current) {
                    self.next = following.start;
                }
                continue;
            }
            let wanted = self.next;
            match self.recent.iter().find(|(i, _)| *i == wanted) {
                Some((_, frame)) => {
                    emit(frame.clone())?;
                    self.next += 1;
                }
                None => break,
            }
        }
        Ok(())
    }
}
