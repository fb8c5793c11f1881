//! Reading serialized ATNs from disk.
//!
//! The file holds the serialized integers as text, separated by commas or
//! whitespace, optionally wrapped in `[...]` (a JSON array loads as-is).
//! Values may be decimal or `0x`-prefixed hex. With `words` set the values
//! are the packed 16-bit words instead.

use std::fs;
use std::path::Path;

use allstar::codec::{decode_words, deserialize};
use allstar::options::DeserializationOptions;
use allstar::{Atn, DeserializeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{text}' at position {position}")]
    InvalidValue { position: usize, text: String },

    #[error("value {value} at position {position} is not a 16-bit word")]
    NotAWord { position: usize, value: i64 },

    #[error(transparent)]
    Atn(#[from] DeserializeError),
}

/// Parses the integer list out of `text`.
pub fn parse_values(text: &str) -> Result<Vec<i64>, LoadError> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']'))
        .filter(|item| !item.is_empty())
        .enumerate()
        .map(|(position, item)| {
            let (digits, negative) = match item.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (item, false),
            };
            let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16),
                None => digits.parse::<i64>(),
            };
            parsed
                .map(|v| if negative { -v } else { v })
                .map_err(|_| LoadError::InvalidValue {
                    position,
                    text: item.to_owned(),
                })
        })
        .collect()
}

/// Converts parsed values to the serialized integer form.
pub fn to_serialized(values: &[i64], words: bool) -> Result<Vec<i32>, LoadError> {
    if words {
        let words = values
            .iter()
            .enumerate()
            .map(|(position, &value)| {
                u16::try_from(value).map_err(|_| LoadError::NotAWord { position, value })
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(decode_words(&words)?);
    }
    values
        .iter()
        .map(|&value| {
            i32::try_from(value).map_err(|_| DeserializeError::ValueOutOfRange { value }.into())
        })
        .collect()
}

/// Reads and deserializes the ATN stored at `path`.
pub fn load_atn(
    path: &Path,
    words: bool,
    options: &DeserializationOptions,
) -> Result<Atn, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let data = to_serialized(&parse_values(&text)?, words)?;
    tracing::debug!(path = %path.display(), values = data.len(), "loaded serialized ATN");
    Ok(deserialize(&data, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_separators() {
        assert_eq!(
            parse_values("[4, 1,\n 0x10 -1]").unwrap(),
            vec![4, 1, 16, -1]
        );
    }

    #[test]
    fn test_invalid_value_position() {
        let err = parse_values("1 2 three").unwrap_err();
        assert!(matches!(err, LoadError::InvalidValue { position: 2, .. }));
    }

    #[test]
    fn test_words_are_unpacked() {
        let values = parse_values("4 0xFFFF 0xFFFF 0x8001 0").unwrap();
        assert_eq!(to_serialized(&values, true).unwrap(), vec![4, -1, 65536]);
        assert!(matches!(
            to_serialized(&[70_000], true),
            Err(LoadError::NotAWord { position: 0, .. })
        ));
    }
}
