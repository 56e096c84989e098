// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{Error, ErrorKind, Result, tag};
use chrono::{DateTime, LocalResult, TimeZone, Utc};
use const_oid::ObjectIdentifier;

/// Strict DER reader over a borrowed buffer.
///
/// The reader tracks its absolute position within the outermost buffer so
/// that errors from arbitrarily nested elements report a usable offset.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the full buffer.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    fn err(&self, kind: ErrorKind, offset: usize) -> Error {
        Error { kind, offset: self.base + offset }
    }

    /// Builds an error pointing at the current read position, for callers
    /// that hit a structural problem mid-element.
    pub fn error(&self, kind: ErrorKind) -> Error {
        self.err(kind, self.pos)
    }

    /// Whether all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Fails unless every byte of the buffer has been consumed.
    pub fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.err(ErrorKind::NonCanonical, self.pos))
        }
    }

    /// Returns the tag of the next element without consuming it.
    pub fn peek_tag(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.err(ErrorKind::Truncated, self.pos))
    }

    /// Returns the tag of the next element, or None at end of input.
    pub fn peek_tag_opt(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = self.peek_tag()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a length field, enforcing definite minimal form.
    fn read_length(&mut self, header: usize) -> Result<usize> {
        let first = self.read_byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        if count == 0 {
            // 0x80 is the BER indefinite form.
            return Err(self.err(ErrorKind::InvalidLength, header));
        }
        if count > 4 {
            return Err(self.err(ErrorKind::Overflow, header));
        }
        let mut length: usize = 0;
        for i in 0..count {
            let byte = self.read_byte()?;
            if i == 0 && byte == 0 {
                return Err(self.err(ErrorKind::NonCanonical, header));
            }
            length = (length << 8) | byte as usize;
        }
        if length < 0x80 {
            // Fits the short form, so the long form is non-minimal.
            return Err(self.err(ErrorKind::NonCanonical, header));
        }
        Ok(length)
    }

    /// Consumes the next element, checking its tag, and returns its content
    /// bytes together with the element's header offset.
    fn expect(&mut self, expected: u8) -> Result<(&'a [u8], usize)> {
        let header = self.pos;
        let actual = self.read_byte()?;
        if actual != expected {
            return Err(self.err(ErrorKind::UnexpectedTag, header));
        }
        let length = self.read_length(header)?;
        let start = self.pos;
        let end = start
            .checked_add(length)
            .ok_or_else(|| self.err(ErrorKind::Overflow, header))?;
        if end > self.data.len() {
            return Err(self.err(ErrorKind::Truncated, header));
        }
        self.pos = end;
        Ok((&self.data[start..end], start))
    }

    /// Consumes the next element whatever its tag and returns the complete
    /// encoding, header included.
    pub fn tlv(&mut self) -> Result<&'a [u8]> {
        let header = self.pos;
        self.read_byte()?;
        let length = self.read_length(header)?;
        let end = self
            .pos
            .checked_add(length)
            .ok_or_else(|| self.err(ErrorKind::Overflow, header))?;
        if end > self.data.len() {
            return Err(self.err(ErrorKind::Truncated, header));
        }
        self.pos = end;
        Ok(&self.data[header..end])
    }

    /// Reads a BOOLEAN, accepting only the DER values 0x00 and 0xff.
    pub fn boolean(&mut self) -> Result<bool> {
        let (content, offset) = self.expect(tag::BOOLEAN)?;
        match content {
            [0x00] => Ok(false),
            [0xff] => Ok(true),
            [_] => Err(self.err(ErrorKind::NonCanonical, offset)),
            _ => Err(self.err(ErrorKind::InvalidLength, offset)),
        }
    }

    /// Reads an INTEGER and returns its two's-complement content bytes,
    /// rejecting non-minimal paddings.
    pub fn integer_bytes(&mut self) -> Result<&'a [u8]> {
        let (content, offset) = self.expect(tag::INTEGER)?;
        match content {
            [] => Err(self.err(ErrorKind::InvalidLength, offset)),
            [0x00, next, ..] if *next < 0x80 => Err(self.err(ErrorKind::NonCanonical, offset)),
            [0xff, next, ..] if *next >= 0x80 => Err(self.err(ErrorKind::NonCanonical, offset)),
            _ => Ok(content),
        }
    }

    /// Reads a non-negative INTEGER into a u64.
    pub fn uint(&mut self) -> Result<u64> {
        let offset = self.pos;
        let content = self.integer_bytes()?;
        if content[0] & 0x80 != 0 {
            return Err(self.err(ErrorKind::Overflow, offset));
        }
        let magnitude = if content[0] == 0 { &content[1..] } else { content };
        if magnitude.len() > 8 {
            return Err(self.err(ErrorKind::Overflow, offset));
        }
        let mut value: u64 = 0;
        for &byte in magnitude {
            value = (value << 8) | byte as u64;
        }
        Ok(value)
    }

    /// Reads a NULL.
    pub fn null(&mut self) -> Result<()> {
        let (content, offset) = self.expect(tag::NULL)?;
        if !content.is_empty() {
            return Err(self.err(ErrorKind::InvalidLength, offset));
        }
        Ok(())
    }

    /// Reads an OBJECT IDENTIFIER.
    pub fn oid(&mut self) -> Result<ObjectIdentifier> {
        let (content, offset) = self.expect(tag::OBJECT_IDENTIFIER)?;
        ObjectIdentifier::from_bytes(content)
            .map_err(|_| self.err(ErrorKind::NonCanonical, offset))
    }

    /// Reads an OCTET STRING.
    pub fn octet_string(&mut self) -> Result<&'a [u8]> {
        Ok(self.expect(tag::OCTET_STRING)?.0)
    }

    /// Reads a BIT STRING and returns (unused bits, content).
    pub fn bit_string(&mut self) -> Result<(u8, &'a [u8])> {
        let (content, offset) = self.expect(tag::BIT_STRING)?;
        let (&unused, bits) = content
            .split_first()
            .ok_or_else(|| self.err(ErrorKind::InvalidLength, offset))?;
        if unused > 7 || (bits.is_empty() && unused != 0) {
            return Err(self.err(ErrorKind::InvalidLength, offset));
        }
        if unused > 0 {
            let mask = (1u8 << unused) - 1;
            if bits[bits.len() - 1] & mask != 0 {
                // DER requires the padding bits to be zero.
                return Err(self.err(ErrorKind::NonCanonical, offset));
            }
        }
        Ok((unused, bits))
    }

    /// Reads a UTF8String.
    pub fn utf8_string(&mut self) -> Result<&'a str> {
        let (content, offset) = self.expect(tag::UTF8_STRING)?;
        std::str::from_utf8(content).map_err(|_| self.err(ErrorKind::NonCanonical, offset))
    }

    /// Reads a PrintableString, enforcing the RFC 5280 character subset.
    pub fn printable_string(&mut self) -> Result<&'a str> {
        let (content, offset) = self.expect(tag::PRINTABLE_STRING)?;
        if !content.iter().all(|&b| is_printable_char(b)) {
            return Err(self.err(ErrorKind::NonCanonical, offset));
        }
        // Charset check above guarantees ASCII.
        Ok(std::str::from_utf8(content).unwrap())
    }

    /// Reads an IA5String, enforcing 7-bit ASCII.
    pub fn ia5_string(&mut self) -> Result<&'a str> {
        let (content, offset) = self.expect(tag::IA5_STRING)?;
        if !content.is_ascii() {
            return Err(self.err(ErrorKind::NonCanonical, offset));
        }
        Ok(std::str::from_utf8(content).unwrap())
    }

    /// Reads a UTCTime or GeneralizedTime under the RFC 5280 rules. A
    /// GeneralizedTime carrying a year UTCTime could express is rejected.
    pub fn time(&mut self) -> Result<DateTime<Utc>> {
        match self.peek_tag()? {
            tag::UTC_TIME => {
                let (content, offset) = self.expect(tag::UTC_TIME)?;
                let digits = ascii_time(self, content, offset, 13)?;
                let short_year: i32 = digits[..2].parse().unwrap();
                let year = if short_year >= 50 { 1900 + short_year } else { 2000 + short_year };
                self.civil_time(&digits[2..], year, offset)
            }
            tag::GENERALIZED_TIME => {
                let (content, offset) = self.expect(tag::GENERALIZED_TIME)?;
                let digits = ascii_time(self, content, offset, 15)?;
                let year: i32 = digits[..4].parse().unwrap();
                if (1950..2050).contains(&year) {
                    return Err(self.err(ErrorKind::NonCanonical, offset));
                }
                self.civil_time(&digits[4..], year, offset)
            }
            _ => Err(self.err(ErrorKind::UnexpectedTag, self.pos)),
        }
    }

    fn civil_time(&self, rest: &str, year: i32, offset: usize) -> Result<DateTime<Utc>> {
        let field = |range: std::ops::Range<usize>| -> u32 { rest[range].parse().unwrap() };
        let (month, day) = (field(0..2), field(2..4));
        let (hour, minute, second) = (field(4..6), field(6..8), field(8..10));
        match Utc.with_ymd_and_hms(year, month, day, hour, minute, second) {
            LocalResult::Single(at) => Ok(at),
            _ => Err(self.err(ErrorKind::NonCanonical, offset)),
        }
    }

    /// Reads a SEQUENCE, handing its content to the closure and enforcing
    /// that the closure consumes every byte of it.
    pub fn sequence<T>(&mut self, parse: impl FnOnce(&mut Decoder<'a>) -> Result<T>) -> Result<T> {
        self.nested(tag::SEQUENCE, parse)
    }

    /// Reads a SET OF, checking the DER ascending-order constraint between
    /// elements and handing each element's decoder to the closure.
    pub fn set_of<T>(
        &mut self,
        mut parse: impl FnMut(&mut Decoder<'a>) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.nested(tag::SET, |content| {
            let mut items = Vec::new();
            let mut previous: Option<&[u8]> = None;
            while !content.is_empty() {
                let start = content.pos;
                let encoded = content.tlv()?;
                if let Some(prev) = previous {
                    if encoded < prev {
                        return Err(content.err(ErrorKind::NonCanonical, start));
                    }
                }
                previous = Some(encoded);
                let mut element = Decoder {
                    data: encoded,
                    pos: 0,
                    base: content.base + start,
                };
                items.push(parse(&mut element)?);
                element.finish()?;
            }
            Ok(items)
        })
    }

    /// Reads an EXPLICIT `[n]` wrapper.
    pub fn explicit<T>(
        &mut self,
        number: u8,
        parse: impl FnOnce(&mut Decoder<'a>) -> Result<T>,
    ) -> Result<T> {
        self.nested(tag::context_constructed(number), parse)
    }

    /// Reads an EXPLICIT `[n]` wrapper if it is the next element.
    pub fn optional_explicit<T>(
        &mut self,
        number: u8,
        parse: impl FnOnce(&mut Decoder<'a>) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.peek_tag_opt() == Some(tag::context_constructed(number)) {
            return Ok(Some(self.explicit(number, parse)?));
        }
        Ok(None)
    }

    /// Reads an IMPLICIT primitive `[n]` element's content.
    pub fn implicit_primitive(&mut self, number: u8) -> Result<&'a [u8]> {
        Ok(self.expect(tag::context(number))?.0)
    }

    /// Reads an IMPLICIT constructed `[n]` element (re-tagged SEQUENCE).
    pub fn implicit_constructed<T>(
        &mut self,
        number: u8,
        parse: impl FnOnce(&mut Decoder<'a>) -> Result<T>,
    ) -> Result<T> {
        self.nested(tag::context_constructed(number), parse)
    }

    fn nested<T>(
        &mut self,
        expected: u8,
        parse: impl FnOnce(&mut Decoder<'a>) -> Result<T>,
    ) -> Result<T> {
        let (content, start) = self.expect(expected)?;
        let mut inner = Decoder {
            data: content,
            pos: 0,
            base: self.base + start,
        };
        let value = parse(&mut inner)?;
        inner.finish()?;
        Ok(value)
    }
}

fn ascii_time<'a>(
    dec: &Decoder<'a>,
    content: &'a [u8],
    offset: usize,
    expected_len: usize,
) -> Result<&'a str> {
    if content.len() != expected_len
        || content[expected_len - 1] != b'Z'
        || !content[..expected_len - 1].iter().all(u8::is_ascii_digit)
    {
        return Err(dec.err(ErrorKind::NonCanonical, offset));
    }
    Ok(std::str::from_utf8(&content[..expected_len - 1]).unwrap())
}

fn is_printable_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests nested-content enforcement: a SEQUENCE whose closure leaves
    // bytes unread must fail with the leftover position.
    #[test]
    fn test_sequence_requires_full_consumption() {
        // SEQUENCE { INTEGER 1, INTEGER 2 }
        let data = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let err = Decoder::new(&data)
            .sequence(|seq| {
                seq.uint()?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonCanonical);
        assert_eq!(err.offset, 5);
    }

    // Tests SET OF element-order enforcement.
    #[test]
    fn test_set_of_rejects_unsorted() {
        // SET { INTEGER 2, INTEGER 1 } - descending, so invalid DER.
        let data = [0x31, 0x06, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01];
        let err = Decoder::new(&data).set_of(|e| e.uint()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonCanonical);
        assert_eq!(err.offset, 5);
    }

    // Tests the BIT STRING padding rules.
    #[test]
    fn test_bit_string_padding() {
        // Three unused bits, all zero: valid.
        let data = [0x03, 0x02, 0x03, 0xf8];
        assert_eq!(
            Decoder::new(&data).bit_string().unwrap(),
            (3u8, &[0xf8][..])
        );

        // Three unused bits with a set padding bit: invalid DER.
        let data = [0x03, 0x02, 0x03, 0xfc];
        let err = Decoder::new(&data).bit_string().unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonCanonical);
    }

    // Tests strict time parsing: truncated forms, missing zone suffix and
    // GeneralizedTime years that belong in UTCTime are all rejected.
    #[test]
    fn test_time_strictness() {
        // UTCTime without seconds (valid BER, not 5280 DER).
        let data = [&[0x17, 0x0b][..], b"2104130833Z"].concat();
        assert!(Decoder::new(&data).time().is_err());

        // UTCTime with an offset instead of Z.
        let data = [&[0x17, 0x11][..], b"210413083331+0100"].concat();
        assert!(Decoder::new(&data).time().is_err());

        // GeneralizedTime for 2021 must have been a UTCTime.
        let data = [&[0x18, 0x0f][..], b"20210413083331Z"].concat();
        let err = Decoder::new(&data).time().unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonCanonical);
    }

    // Tests that a u64 read refuses negative and oversized integers.
    #[test]
    fn test_uint_bounds() {
        // -1
        let err = Decoder::new(&[0x02, 0x01, 0xff]).uint().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Overflow);

        // 2^64, nine magnitude bytes.
        let data = [0x02, 0x09, 0x01, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = Decoder::new(&data).uint().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Overflow);

        // u64::MAX still fits.
        let data = [0x02, 0x09, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(Decoder::new(&data).uint().unwrap(), u64::MAX);
    }
}
