//! Bounded append-and-trim buffer backing the rendered photo grid.

use crate::events::Photo;

/// Ordered photos in load order, capped at a fixed capacity.
///
/// When an append overflows the cap the oldest-loaded photos are dropped from
/// the head. Id uniqueness is not re-checked here; the pager's non-overlapping
/// offsets provide it.
#[derive(Debug, Clone)]
pub struct PhotoWindow {
    items: Vec<Photo>,
    cap: usize,
    trimmed: usize,
}

impl PhotoWindow {
    /// Empty window holding at most `cap` photos (a zero cap is treated as one).
    #[must_use]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            cap: cap.max(1),
            trimmed: 0,
        }
    }

    /// Append `incoming`, then keep only the trailing `cap` entries.
    pub fn append(&mut self, incoming: Vec<Photo>) {
        self.items.extend(incoming);
        if self.items.len() > self.cap {
            let excess = self.items.len() - self.cap;
            self.items.drain(..excess);
            self.trimmed += excess;
        }
    }

    /// Clear all photos.
    pub fn reset(&mut self) {
        self.items.clear();
        self.trimmed = 0;
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Photos dropped from the head since the last reset.
    #[must_use]
    pub const fn trimmed(&self) -> usize {
        self.trimmed
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Photo] {
        &self.items
    }
}
