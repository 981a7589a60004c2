//! The small subset of ASN.1 BER needed for ACSE APDUs: single-byte tags, definite lengths.

use nom::{
    IResult,
    error::{Error, ErrorKind},
    number::complete::u8,
};

/// Context-specific, constructed tag `[n]`.
pub const fn context_constructed(tag_number: u8) -> u8 {
    0xA0 | tag_number
}

/// Context-specific, primitive tag `[n]`.
pub const fn context_primitive(tag_number: u8) -> u8 {
    0x80 | tag_number
}

pub const INTEGER: u8 = 0x02;
pub const OCTET_STRING: u8 = 0x04;
pub const OBJECT_IDENTIFIER: u8 = 0x06;

pub fn encode_length(length: usize, buf: &mut Vec<u8>) {
    if length <= 0x7F {
        buf.push(length as u8);
    } else if length <= 0xFF {
        buf.extend_from_slice(&[0x81, length as u8]);
    } else {
        buf.push(0x82);
        buf.extend_from_slice(&(length.min(0xFFFF) as u16).to_be_bytes());
    }
}

pub fn encode_tlv(tag: u8, content: &[u8], buf: &mut Vec<u8>) {
    buf.push(tag);
    encode_length(content.len(), buf);
    buf.extend_from_slice(content);
}

pub fn parse_length(input: &[u8]) -> IResult<&[u8], usize> {
    let (mut input, first) = u8(input)?;
    if first & 0x80 == 0 {
        return Ok((input, usize::from(first)));
    }

    let octets = first & 0x7F;
    if octets == 0 || octets > 2 {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::LengthValue)));
    }

    let mut length = 0usize;
    for _ in 0..octets {
        let (rest, byte) = u8(input)?;
        length = (length << 8) | usize::from(byte);
        input = rest;
    }
    Ok((input, length))
}

/// Parses one tag-length-value, returning the tag and its content.
pub fn parse_tlv(input: &[u8]) -> IResult<&[u8], (u8, &[u8])> {
    let (input, tag) = u8(input)?;
    if tag & 0x1F == 0x1F {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    let (input, length) = parse_length(input)?;
    if input.len() < length {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Eof)));
    }
    let (content, rest) = input.split_at(length);
    Ok((rest, (tag, content)))
}

/// Parses a TLV and checks its tag.
pub fn parse_expected(input: &[u8], expected: u8) -> IResult<&[u8], &[u8]> {
    let (rest, (tag, content)) = parse_tlv(input)?;
    if tag != expected {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    Ok((rest, content))
}

/// Parses a small BER INTEGER (one or two content bytes).
pub fn parse_small_integer(input: &[u8]) -> IResult<&[u8], u8> {
    let (rest, content) = parse_expected(input, INTEGER)?;
    match content {
        [value] | [0x00, value] => Ok((rest, *value)),
        _ => Err(nom::Err::Error(Error::new(input, ErrorKind::LengthValue))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_tags() {
        assert_eq!(context_constructed(1), 0xA1);
        assert_eq!(context_constructed(30), 0xBE);
        assert_eq!(context_primitive(10), 0x8A);
    }

    #[test]
    fn test_encode_length_forms() {
        let mut buf = Vec::new();
        encode_length(0x7F, &mut buf);
        encode_length(0x80, &mut buf);
        encode_length(0x0100, &mut buf);
        assert_eq!(buf, vec![0x7F, 0x81, 0x80, 0x82, 0x01, 0x00]);
    }

    #[test]
    fn test_parse_length_forms() {
        assert_eq!(parse_length(&[0x05]).unwrap().1, 5);
        assert_eq!(parse_length(&[0x81, 0x80]).unwrap().1, 128);
        assert_eq!(parse_length(&[0x82, 0x01, 0x00]).unwrap().1, 256);
        assert!(parse_length(&[0x80]).is_err());
        assert!(parse_length(&[0x83, 0x01, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_parse_tlv() {
        let input = [0xA2, 0x03, 0x02, 0x01, 0x00, 0xFF];
        let (rest, (tag, content)) = parse_tlv(&input).unwrap();

        assert_eq!(tag, 0xA2);
        assert_eq!(content, &[0x02, 0x01, 0x00]);
        assert_eq!(rest, &[0xFF]);
        assert_eq!(parse_small_integer(content).unwrap().1, 0);
    }

    #[test]
    fn test_parse_tlv_truncated() {
        assert!(parse_tlv(&[0xA2, 0x03, 0x02]).is_err());
        assert!(parse_expected(&[0xA3, 0x00], 0xA2).is_err());
    }
}
