//! Message selection by keyword and date range.
//!
//! [`select`] is pure: it borrows the folder listing and the criteria and
//! yields qualifying messages lazily, in folder order.

pub mod criteria;

pub use criteria::FilterCriteria;

use crate::model::message::Message;

/// Lazily evaluated, restartable sequence of qualifying messages.
///
/// Cloning a `Selection` gives an independent cursor over the same input.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    messages: &'a [Message],
    criteria: &'a FilterCriteria,
    pos: usize,
}

impl<'a> Selection<'a> {
    /// Rewind to the start of the folder.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    /// Number of qualifying messages, without consuming this cursor.
    pub fn count_matching(&self) -> usize {
        let mut fresh = self.clone();
        fresh.restart();
        fresh.count()
    }
}

impl<'a> Iterator for Selection<'a> {
    type Item = &'a Message;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(message) = self.messages.get(self.pos) {
            self.pos += 1;
            if self.criteria.matches(message) {
                return Some(message);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.messages.len().saturating_sub(self.pos)))
    }
}

impl std::iter::FusedIterator for Selection<'_> {}

/// Select the messages of a folder that qualify under `criteria`.
pub fn select<'a>(messages: &'a [Message], criteria: &'a FilterCriteria) -> Selection<'a> {
    Selection {
        messages,
        criteria,
        pos: 0,
    }
}
