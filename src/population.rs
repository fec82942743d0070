//! Double-buffered scheduler of the live insects.

use crate::insect::Insect;

/// Two insect buffers: the active one is drained during the current day, the
/// other collects everything that must be processed the next day.
///
/// All insertions go to the inactive buffer, so an insect created or updated
/// during day `n` is popped no earlier than day `n + 1`.
pub struct Population {
    buffers: [Vec<Insect>; 2],
    current: usize,
}

impl Population {
    pub fn new(insects: Vec<Insect>) -> Self {
        Self {
            buffers: [insects, Vec::new()],
            current: 0,
        }
    }

    /// Whether no insect is waiting in the active buffer.
    pub fn is_empty(&self) -> bool {
        self.buffers[self.current].is_empty()
    }

    /// Remove one insect from the active buffer.
    pub fn pop(&mut self) -> Option<Insect> {
        self.buffers[self.current].pop()
    }

    /// Schedule an insect for the next day.
    pub fn push(&mut self, insect: Insect) {
        self.buffers[1 - self.current].push(insect);
    }

    /// Schedule several insects for the next day.
    pub fn extend<I: IntoIterator<Item = Insect>>(&mut self, insects: I) {
        self.buffers[1 - self.current].extend(insects);
    }

    /// Make the next-day buffer active.
    pub fn advance_day(&mut self) {
        self.current = 1 - self.current;
    }

    /// Insects waiting in the active buffer.
    pub fn active(&self) -> &[Insect] {
        &self.buffers[self.current]
    }

    /// Insects scheduled for the next day.
    pub fn pending(&self) -> &[Insect] {
        &self.buffers[1 - self.current]
    }
}
