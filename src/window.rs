// Thermocast — Sliding Window Buffer
//
// Fixed ring of normalised samples. `full` is a one-way latch: it flips the
// first time the cursor wraps back to slot 0 and never clears.

use crate::config::*;
use crate::events::NormalizedVector;

#[derive(Debug, Clone)]
pub struct WindowBuffer {
    slots: [NormalizedVector; WINDOW_SIZE],
    cursor: usize,
    full: bool,
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBuffer {
    pub fn new() -> Self {
        Self {
            slots: [NormalizedVector::default(); WINDOW_SIZE],
            cursor: 0,
            full: false,
        }
    }

    /// Store `vector` at the cursor and advance it.
    ///
    /// Returns `true` only on the insertion that latches the window full.
    pub fn insert(&mut self, vector: NormalizedVector) -> bool {
        self.slots[self.cursor] = vector;
        self.cursor = (self.cursor + 1) % WINDOW_SIZE;

        if self.cursor == 0 && !self.full {
            self.full = true;
            return true;
        }
        false
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Samples held so far, saturating at `WINDOW_SIZE`.
    pub fn len(&self) -> usize {
        if self.full {
            WINDOW_SIZE
        } else {
            self.cursor
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest-to-newest copy of the window, or `None` until it is full.
    ///
    /// The slot under the cursor is the next to be overwritten, i.e. the
    /// oldest sample.
    pub fn snapshot_in_time_order(&self) -> Option<[NormalizedVector; WINDOW_SIZE]> {
        if !self.full {
            return None;
        }
        let mut ordered = self.slots;
        ordered.rotate_left(self.cursor);
        Some(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> NormalizedVector {
        let v = n as f32;
        NormalizedVector([v, v + 0.25, v + 0.5, v + 0.75])
    }

    #[test]
    fn not_full_before_window_size_inserts() {
        let mut window = WindowBuffer::new();
        assert!(window.is_empty());
        for n in 0..WINDOW_SIZE - 1 {
            assert!(!window.insert(sample(n)));
            assert!(!window.is_full());
            assert!(window.snapshot_in_time_order().is_none());
        }
        assert_eq!(window.len(), WINDOW_SIZE - 1);
    }

    #[test]
    fn latches_full_exactly_once() {
        let mut window = WindowBuffer::new();
        let mut latches = 0;
        for n in 0..3 * WINDOW_SIZE {
            if window.insert(sample(n)) {
                assert_eq!(n, WINDOW_SIZE - 1, "latched on insert {n}");
                latches += 1;
            }
            assert_eq!(window.is_full(), n >= WINDOW_SIZE - 1, "after insert {n}");
            if window.is_full() {
                assert_eq!(window.len(), WINDOW_SIZE);
                assert!(window.snapshot_in_time_order().is_some());
            }
        }
        assert_eq!(latches, 1);
    }

    #[test]
    fn snapshot_right_after_filling_is_arrival_order() {
        let mut window = WindowBuffer::new();
        for n in 0..WINDOW_SIZE {
            window.insert(sample(n));
        }
        let snap = window.snapshot_in_time_order().unwrap();
        for (i, v) in snap.iter().enumerate() {
            assert_eq!(*v, sample(i));
        }
    }

    #[test]
    fn snapshot_after_wrap_keeps_latest_oldest_first() {
        for extra in 1..=WINDOW_SIZE + 3 {
            let mut window = WindowBuffer::new();
            let total = WINDOW_SIZE + extra;
            for n in 0..total {
                window.insert(sample(n));
            }
            let snap = window.snapshot_in_time_order().unwrap();
            let expected: Vec<_> = (total - WINDOW_SIZE..total).map(sample).collect();
            assert_eq!(snap.to_vec(), expected, "after {total} inserts");
        }
    }
}
