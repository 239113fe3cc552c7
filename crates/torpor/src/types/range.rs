//! The `range` object.

use serde::{Deserialize, Serialize};

/// A lazily-iterated arithmetic progression; `step` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// Number of values the range yields.
    #[must_use]
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = self.step.unsigned_abs();
        ((span as u64).div_ceil(step)) as usize
    }

    /// Value at an index, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        Some(self.start + self.step * index as i64)
    }

    /// Membership test without iterating.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        let in_span = if self.step > 0 {
            value >= self.start && value < self.stop
        } else {
            value <= self.start && value > self.stop
        };
        in_span && (value - self.start) % self.step == 0
    }

    /// `repr()` form; the step is shown only when not 1.
    #[must_use]
    pub fn repr(&self) -> String {
        if self.step == 1 {
            format!("range({}, {})", self.start, self.stop)
        } else {
            format!("range({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_and_get() {
        let r = Range { start: 0, stop: 5, step: 1 };
        assert_eq!(r.len(), 5);
        assert_eq!(r.get(4), Some(4));
        assert_eq!(r.get(5), None);

        let r = Range { start: 10, stop: 0, step: -3 };
        assert_eq!(r.len(), 4);
        assert_eq!(r.get(3), Some(1));

        let r = Range { start: 3, stop: 3, step: 1 };
        assert_eq!(r.len(), 0);
    }

    #[test]
    fn contains_respects_step() {
        let r = Range { start: 0, stop: 10, step: 2 };
        assert!(r.contains(4));
        assert!(!r.contains(5));
        assert!(!r.contains(10));
    }
}
