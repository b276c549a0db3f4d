//! LEB128 variable-length integers, as found in Dex class data and
//! debug streams.

use nom::bytes::complete::take_till;
use nom::combinator::{map, verify};
use nom::error::ParseError;
use nom::number::complete::le_u8;
use nom::IResult;

/// Parses an unsigned LEB128 value of at most 5 bytes.
pub fn uleb128<'a, E: ParseError<&'a [u8]>>(input: &'a [u8]) -> IResult<&'a [u8], u32, E> {
    let (input, bs) = verify(take_till(|b| b & 0x80 == 0), |bs: &[u8]| bs.len() < 5)(input)?;
    let (input, b) = map(le_u8, u32::from)(input)?;

    let value = bs
        .iter()
        .rev()
        .fold(b, |acc, v| (acc << 7) | u32::from(v & 0x7f));
    Ok((input, value))
}

/// Appends the unsigned LEB128 encoding of `value` to `output`.
pub fn write_uleb128(output: &mut Vec<u8>, value: u32) {
    let mut w = value;
    loop {
        let byte = (w & 0x7f) as u8;
        w >>= 7;
        if w == 0 {
            output.push(byte);
            break;
        }
        output.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom::error::Error;

    fn parse(input: &[u8]) -> u32 {
        uleb128::<Error<&[u8]>>(input).unwrap().1
    }

    #[test]
    fn uleb128_parser() {
        assert_eq!(0, parse(&[0x00]));
        assert_eq!(1, parse(&[0x01]));
        assert_eq!(127, parse(&[0x7f]));
        assert_eq!(16256, parse(&[0x80, 0x7f]));
        assert_eq!(u32::MAX, parse(&[0xff, 0xff, 0xff, 0xff, 0x0f]));
    }

    #[test]
    fn uleb128_too_long() {
        assert!(uleb128::<Error<&[u8]>>(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).is_err());
        assert!(uleb128::<Error<&[u8]>>(&[0x80]).is_err());
    }

    #[test]
    fn uleb128_writer() {
        for value in [0, 1, 127, 128, 16256, 0x0fff_ffff, u32::MAX] {
            let mut buf = Vec::new();
            write_uleb128(&mut buf, value);
            assert_eq!(value, parse(&buf));
        }
        let mut buf = Vec::new();
        write_uleb128(&mut buf, 16256);
        assert_eq!(buf, vec![0x80, 0x7f]);
    }
}
