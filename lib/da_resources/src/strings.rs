//! String pools shared by binary XML documents and resource tables.

use crate::errors::{ResourcesError, ResourcesResult};

pub(crate) const SORTED_FLAG: u32 = 1 << 0;
pub(crate) const UTF8_FLAG: u32 = 1 << 8;

/// A decoded string pool.
///
/// Strings are decoded eagerly, whatever their on-disk encoding, so that
/// values referencing the pool can be resolved at decode time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringPool {
    pub(crate) sorted: bool,
    pub(crate) utf8: bool,
    pub(crate) strings: Vec<String>,
}

impl StringPool {
    #[must_use]
    pub fn is_utf8(&self) -> bool {
        self.utf8
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn get(&self, index: u32) -> ResourcesResult<&str> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(ResourcesError::StringIndex(index))
    }

    /// Same as [`StringPool::get`], `0xffffffff` standing for "no string".
    pub fn get_opt(&self, index: u32) -> ResourcesResult<Option<&str>> {
        if index == u32::MAX {
            Ok(None)
        } else {
            self.get(index).map(Some)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

/// Decodes the length prefix of an UTF-8 pool entry (one or two bytes).
pub(crate) fn utf8_length(input: &[u8]) -> Option<(usize, &[u8])> {
    let (&first, rest) = input.split_first()?;
    if first & 0x80 == 0 {
        Some((usize::from(first), rest))
    } else {
        let (&second, rest) = rest.split_first()?;
        Some(((usize::from(first & 0x7f) << 8) | usize::from(second), rest))
    }
}

/// Decodes the length prefix of an UTF-16 pool entry (one or two units).
pub(crate) fn utf16_length(input: &[u8]) -> Option<(usize, &[u8])> {
    let first = u16::from_le_bytes([*input.first()?, *input.get(1)?]);
    let rest = &input[2..];
    if first & 0x8000 == 0 {
        Some((usize::from(first), rest))
    } else {
        let second = u16::from_le_bytes([*rest.first()?, *rest.get(1)?]);
        Some((
            (usize::from(first & 0x7fff) << 16) | usize::from(second),
            &rest[2..],
        ))
    }
}

/// Decodes one pool entry starting at `input`.
pub(crate) fn decode_entry(input: &[u8], utf8: bool) -> Option<String> {
    if utf8 {
        let (_chars, rest) = utf8_length(input)?;
        let (bytes, rest) = utf8_length(rest)?;
        let raw = rest.get(..bytes)?;
        if rest.get(bytes) != Some(&0) {
            log::warn!("utf-8 string is not null terminated");
        }
        Some(String::from_utf8_lossy(raw).into_owned())
    } else {
        let (units, rest) = utf16_length(input)?;
        let raw = rest.get(..units.checked_mul(2)?)?;
        let units = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect::<Vec<u16>>();
        Some(String::from_utf16_lossy(&units))
    }
}
