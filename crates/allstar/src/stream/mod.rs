//! # Input Streams
//!
//! Symbol sources consumed by the simulators.
//!
//! ## Overview
//!
//! [`IntStream`] is the common cursor interface: look-ahead by offset,
//! consume, seek and nested marks. [`CharStream`] adds text extraction over
//! code points, [`TokenStream`] adds token access. Marks must be released in
//! the reverse order they were taken; releasing out of order is a
//! [`StateError::MarkReleaseOrder`].
//!
//! Both provided implementations are fully buffered, so marks only guard
//! against misuse and never pin memory.

mod chars;
mod tokens;

pub use chars::CodePointCharStream;
pub use tokens::VecTokenStream;

use crate::error::StateError;
use crate::lexer::Token;

/// Symbol value returned past the end of input.
pub const EOF: i32 = crate::atn::TOKEN_EOF;

pub trait IntStream {
    /// Advances past the current symbol.
    fn consume(&mut self) -> Result<(), StateError>;

    /// Symbol at `offset` relative to the cursor: `1` is the current symbol,
    /// `-1` the previous one. Positions outside the input read as [`EOF`];
    /// offset `0` reads as `0`.
    fn la(&self, offset: isize) -> i32;

    /// Opens a mark and returns its handle.
    fn mark(&mut self) -> usize;

    /// Closes `marker`, which must be the most recently opened mark.
    fn release(&mut self, marker: usize) -> Result<(), StateError>;

    /// Index of the current symbol.
    fn index(&self) -> usize;

    /// Moves the cursor to `index`, clamped to the input size.
    fn seek(&mut self, index: usize);

    fn size(&self) -> usize;

    fn source_name(&self) -> &str {
        "<unknown>"
    }
}

pub trait CharStream: IntStream {
    /// Text of code points `start..end`, clamped to the input.
    fn text(&self, start: usize, end: usize) -> String;
}

pub trait TokenStream: IntStream {
    /// Token at `offset` relative to the cursor, with the same offset rules
    /// as [`IntStream::la`].
    fn lt(&self, offset: isize) -> Option<&Token>;

    fn get(&self, index: usize) -> Option<&Token>;

    /// Concatenated text of tokens `start..end`.
    fn text(&self, start: usize, end: usize) -> String;
}

/// Shared bookkeeping for strictly nested marks.
#[derive(Debug, Clone, Default)]
pub(crate) struct MarkStack {
    open: Vec<usize>,
    next: usize,
}

impl MarkStack {
    pub(crate) fn mark(&mut self) -> usize {
        let marker = self.next;
        self.next += 1;
        self.open.push(marker);
        marker
    }

    pub(crate) fn release(&mut self, marker: usize) -> Result<(), StateError> {
        match self.open.last() {
            Some(&top) if top == marker => {
                self.open.pop();
                Ok(())
            }
            top => Err(StateError::MarkReleaseOrder {
                expected: top.copied(),
                found: marker,
            }),
        }
    }
}

/// Resolves a look-ahead offset against `index` into an absolute position.
pub(crate) fn offset_position(index: usize, offset: isize) -> Option<usize> {
    match offset {
        0 => None,
        o if o > 0 => index.checked_add(o.unsigned_abs() - 1),
        o => index.checked_sub(o.unsigned_abs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_release_lifo() {
        let mut marks = MarkStack::default();
        let outer = marks.mark();
        let inner = marks.mark();
        assert_eq!(
            marks.release(outer),
            Err(StateError::MarkReleaseOrder {
                expected: Some(inner),
                found: outer
            })
        );
        marks.release(inner).unwrap();
        marks.release(outer).unwrap();
        assert!(marks.release(outer).is_err());
    }

    #[test]
    fn test_offset_position() {
        assert_eq!(offset_position(3, 1), Some(3));
        assert_eq!(offset_position(3, 2), Some(4));
        assert_eq!(offset_position(3, -1), Some(2));
        assert_eq!(offset_position(0, -1), None);
        assert_eq!(offset_position(3, 0), None);
    }
}
