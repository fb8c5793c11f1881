use compact_str::CompactString;

use super::{offset_position, CharStream, IntStream, MarkStack, EOF};
use crate::error::StateError;

/// A character stream over the code points of a string.
#[derive(Debug, Clone)]
pub struct CodePointCharStream {
    data: Vec<char>,
    index: usize,
    marks: MarkStack,
    name: CompactString,
}

impl CodePointCharStream {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            data: text.chars().collect(),
            index: 0,
            marks: MarkStack::default(),
            name: CompactString::const_new("<unknown>"),
        }
    }

    #[must_use]
    pub fn with_source_name(mut self, name: &str) -> Self {
        self.name = CompactString::from(name);
        self
    }
}

impl IntStream for CodePointCharStream {
    fn consume(&mut self) -> Result<(), StateError> {
        if self.index >= self.data.len() {
            return Err(StateError::ConsumeAtEof);
        }
        self.index += 1;
        Ok(())
    }

    fn la(&self, offset: isize) -> i32 {
        if offset == 0 {
            return 0;
        }
        offset_position(self.index, offset)
            .and_then(|pos| self.data.get(pos))
            .map_or(EOF, |&c| c as i32)
    }

    fn mark(&mut self) -> usize {
        self.marks.mark()
    }

    fn release(&mut self, marker: usize) -> Result<(), StateError> {
        self.marks.release(marker)
    }

    fn index(&self) -> usize {
        self.index
    }

    fn seek(&mut self, index: usize) {
        self.index = index.min(self.data.len());
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

impl CharStream for CodePointCharStream {
    fn text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.data.len());
        if start >= end {
            return String::new();
        }
        self.data[start..end].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead_and_consume() {
        let mut input = CodePointCharStream::new("añ");
        assert_eq!(input.la(1), 'a' as i32);
        assert_eq!(input.la(2), 'ñ' as i32);
        assert_eq!(input.la(3), EOF);
        assert_eq!(input.la(-1), EOF);
        input.consume().unwrap();
        assert_eq!(input.la(-1), 'a' as i32);
        input.consume().unwrap();
        assert_eq!(input.consume(), Err(StateError::ConsumeAtEof));
        assert_eq!(input.la(1), EOF);
    }

    #[test]
    fn test_text_and_seek() {
        let mut input = CodePointCharStream::new("hello").with_source_name("greeting");
        assert_eq!(input.text(1, 4), "ell");
        assert_eq!(input.text(3, 99), "lo");
        assert_eq!(input.text(4, 2), "");
        input.seek(99);
        assert_eq!(input.index(), 5);
        assert_eq!(input.source_name(), "greeting");
    }
}
