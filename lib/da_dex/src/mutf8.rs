//! Modified UTF-8, the string encoding of Dex string data.

use crate::errors::{DexError, DexResult};

fn continuation(byte: Option<&u8>) -> DexResult<u16> {
    match byte {
        Some(b) if b & 0xc0 == 0x80 => Ok(u16::from(b & 0x3f)),
        Some(_) => Err(DexError::InvalidMutf8("bad continuation byte".to_string())),
        None => Err(DexError::InvalidMutf8("truncated sequence".to_string())),
    }
}

/// Decodes a MUTF-8 buffer, without its null terminator.
///
/// Characters are decoded to UTF-16 units first since lone surrogates are
/// legal in MUTF-8; those end up replaced in the returned string.
pub(crate) fn decode(input: &[u8]) -> DexResult<String> {
    let mut units = Vec::with_capacity(input.len());
    let mut bytes = input.iter();

    while let Some(&a) = bytes.next() {
        let unit = if a == 0 {
            return Err(DexError::InvalidMutf8("unexpected null byte".to_string()));
        } else if a < 0x80 {
            u16::from(a)
        } else if a & 0xe0 == 0xc0 {
            (u16::from(a & 0x1f) << 6) | continuation(bytes.next())?
        } else if a & 0xf0 == 0xe0 {
            let b = continuation(bytes.next())?;
            let c = continuation(bytes.next())?;
            (u16::from(a & 0x0f) << 12) | (b << 6) | c
        } else {
            return Err(DexError::InvalidMutf8(format!("bad leading byte {a:#04x}")));
        };
        units.push(unit);
    }

    Ok(String::from_utf16_lossy(&units))
}

/// Encodes a string to MUTF-8, without null terminator.
#[cfg(any(test, feature = "builder"))]
pub(crate) fn encode(s: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        if unit != 0 && unit < 0x80 {
            buf.push(unit as u8);
        } else if unit < 0x800 {
            buf.push((0xc0 | (unit >> 6)) as u8);
            buf.push((0x80 | (unit & 0x3f)) as u8);
        } else {
            buf.push((0xe0 | (unit >> 12)) as u8);
            buf.push((0x80 | ((unit >> 6) & 0x3f)) as u8);
            buf.push((0x80 | (unit & 0x3f)) as u8);
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        assert_eq!(decode(b"Lcom/example/Main;").unwrap(), "Lcom/example/Main;");
    }

    #[test]
    fn multibyte_and_null() {
        for s in ["é", "\u{20ac}", "a\u{0}b", "😀"] {
            assert_eq!(decode(&encode(s)).unwrap(), s);
        }
        // U+0000 never appears as a raw null byte
        assert_eq!(encode("\u{0}"), vec![0xc0, 0x80]);
    }

    #[test]
    fn invalid_sequences() {
        assert!(decode(&[0xc3]).is_err());
        assert!(decode(&[0xe2, 0x82]).is_err());
        assert!(decode(&[0xff]).is_err());
        assert!(decode(&[b'a', 0, b'b']).is_err());
    }
}
