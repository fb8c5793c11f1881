//! Packing of serialized values into 16-bit words.
//!
//! Values up to `0x7FFF` take one word. Larger values take two: the high
//! word carries bit 15 as a marker plus bits 16..31 of the value, the low
//! word bits 0..15. `-1` is written as two all-ones words.

use crate::error::DeserializeError;

const SINGLE_WORD_MAX: i32 = 0x7FFF;
const PAIR_MARKER: u16 = 0x8000;

/// Packs `data` into words.
pub fn encode_words(data: &[i32]) -> Result<Vec<u16>, DeserializeError> {
    let mut words = Vec::with_capacity(data.len());
    for &value in data {
        if value == -1 {
            words.extend([0xFFFF, 0xFFFF]);
        } else if (0..=SINGLE_WORD_MAX).contains(&value) {
            words.push(value as u16);
        } else if value > 0 && value < i32::MAX {
            words.push(((value >> 16) as u16) | PAIR_MARKER);
            words.push((value & 0xFFFF) as u16);
        } else {
            return Err(DeserializeError::ValueOutOfRange {
                value: i64::from(value),
            });
        }
    }
    Ok(words)
}

/// Unpacks words produced by [`encode_words`].
pub fn decode_words(words: &[u16]) -> Result<Vec<i32>, DeserializeError> {
    let mut data = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let high = words[i];
        if high & PAIR_MARKER == 0 {
            data.push(i32::from(high));
            i += 1;
            continue;
        }
        let low = *words
            .get(i + 1)
            .ok_or(DeserializeError::InvalidWordEncoding { offset: i })?;
        if high == 0xFFFF && low == 0xFFFF {
            data.push(-1);
        } else {
            data.push((i32::from(high & !PAIR_MARKER) << 16) | i32::from(low));
        }
        i += 2;
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minus_one_is_two_all_ones_words() {
        assert_eq!(encode_words(&[-1]).unwrap(), vec![0xFFFF, 0xFFFF]);
        assert_eq!(decode_words(&[0xFFFF, 0xFFFF]).unwrap(), vec![-1]);
    }

    #[test]
    fn test_word_boundaries() {
        let values = [0, 1, 0x7FFF, 0x8000, 0xFFFF, 0x1_0000, 0x10FFFF, 0x7FFF_FFFE];
        let words = encode_words(&values).unwrap();
        assert_eq!(&words[..3], &[0, 1, 0x7FFF]);
        assert_eq!(&words[3..5], &[0x8000, 0x8000]);
        assert_eq!(decode_words(&words).unwrap(), values);
    }

    #[test]
    fn test_unencodable_values() {
        assert!(matches!(
            encode_words(&[-2]),
            Err(DeserializeError::ValueOutOfRange { value: -2 })
        ));
        assert!(encode_words(&[i32::MAX]).is_err());
    }

    #[test]
    fn test_dangling_high_word() {
        assert_eq!(
            decode_words(&[3, 0x8001]),
            Err(DeserializeError::InvalidWordEncoding { offset: 1 })
        );
    }
}
