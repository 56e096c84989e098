// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::tag;
use chrono::{DateTime, Datelike, Timelike, Utc};
use const_oid::ObjectIdentifier;

/// Append-only DER writer.
///
/// All methods emit the distinguished encoding directly; none can fail.
/// Inputs whose well-formedness is not guaranteed by their Rust type
/// (PrintableString character sets, BIT STRING padding bits) are validated
/// by the callers in the `x509` layer before they reach the encoder.
#[derive(Default)]
pub struct Encoder {
    out: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the encoder and returns the accumulated DER bytes.
    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Splices an already-encoded DER element verbatim.
    pub fn raw(&mut self, der: &[u8]) {
        self.out.extend_from_slice(der);
    }

    fn header(&mut self, tag: u8, len: usize) {
        self.out.push(tag);
        if len < 0x80 {
            self.out.push(len as u8);
            return;
        }
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        self.out.push(0x80 | (bytes.len() - skip) as u8);
        self.out.extend_from_slice(&bytes[skip..]);
    }

    fn primitive(&mut self, tag: u8, content: &[u8]) {
        self.header(tag, content.len());
        self.out.extend_from_slice(content);
    }

    /// Writes a BOOLEAN.
    pub fn boolean(&mut self, value: bool) {
        self.primitive(tag::BOOLEAN, &[if value { 0xff } else { 0x00 }]);
    }

    /// Writes a non-negative INTEGER from a u64.
    pub fn uint(&mut self, value: u64) {
        self.unsigned_integer(&value.to_be_bytes());
    }

    /// Writes a non-negative INTEGER from a big-endian magnitude. Redundant
    /// leading zeros are stripped and a zero byte is prepended when the top
    /// bit is set, yielding the minimal two's-complement encoding.
    pub fn unsigned_integer(&mut self, magnitude: &[u8]) {
        let skip = magnitude.iter().take_while(|&&b| b == 0).count();
        let trimmed = &magnitude[skip..];
        if trimmed.is_empty() {
            self.primitive(tag::INTEGER, &[0x00]);
            return;
        }
        if trimmed[0] & 0x80 != 0 {
            self.header(tag::INTEGER, trimmed.len() + 1);
            self.out.push(0x00);
            self.out.extend_from_slice(trimmed);
        } else {
            self.primitive(tag::INTEGER, trimmed);
        }
    }

    /// Writes a NULL.
    pub fn null(&mut self) {
        self.header(tag::NULL, 0);
    }

    /// Writes an OBJECT IDENTIFIER.
    pub fn oid(&mut self, oid: &ObjectIdentifier) {
        self.primitive(tag::OBJECT_IDENTIFIER, oid.as_bytes());
    }

    /// Writes an OCTET STRING.
    pub fn octet_string(&mut self, content: &[u8]) {
        self.primitive(tag::OCTET_STRING, content);
    }

    /// Writes a BIT STRING with the given number of unused trailing bits.
    pub fn bit_string(&mut self, unused_bits: u8, content: &[u8]) {
        self.header(tag::BIT_STRING, content.len() + 1);
        self.out.push(unused_bits);
        self.out.extend_from_slice(content);
    }

    /// Writes a UTF8String.
    pub fn utf8_string(&mut self, value: &str) {
        self.primitive(tag::UTF8_STRING, value.as_bytes());
    }

    /// Writes a PrintableString. The caller is responsible for restricting
    /// the value to the RFC 5280 character subset.
    pub fn printable_string(&mut self, value: &str) {
        self.primitive(tag::PRINTABLE_STRING, value.as_bytes());
    }

    /// Writes an IA5String. The caller is responsible for the value being
    /// 7-bit ASCII.
    pub fn ia5_string(&mut self, value: &str) {
        self.primitive(tag::IA5_STRING, value.as_bytes());
    }

    /// Writes a timestamp under the RFC 5280 rule: UTCTime for dates in
    /// 1950 through 2049, GeneralizedTime for anything outside that window.
    pub fn time(&mut self, at: DateTime<Utc>) {
        let formatted = if (1950..2050).contains(&at.year()) {
            format!(
                "{:02}{:02}{:02}{:02}{:02}{:02}Z",
                at.year() % 100,
                at.month(),
                at.day(),
                at.hour(),
                at.minute(),
                at.second()
            )
        } else {
            format!(
                "{:04}{:02}{:02}{:02}{:02}{:02}Z",
                at.year(),
                at.month(),
                at.day(),
                at.hour(),
                at.minute(),
                at.second()
            )
        };
        let tag = if formatted.len() == 13 {
            tag::UTC_TIME
        } else {
            tag::GENERALIZED_TIME
        };
        self.primitive(tag, formatted.as_bytes());
    }

    /// Writes a SEQUENCE whose content is produced by the closure.
    pub fn sequence(&mut self, build: impl FnOnce(&mut Encoder)) {
        self.constructed(tag::SEQUENCE, build);
    }

    /// Writes a SET OF from pre-encoded elements, sorting them into the
    /// ascending encoded-byte order DER requires.
    pub fn set_of(&mut self, mut elements: Vec<Vec<u8>>) {
        elements.sort();
        let total: usize = elements.iter().map(Vec::len).sum();
        self.header(tag::SET, total);
        for element in elements {
            self.out.extend_from_slice(&element);
        }
    }

    /// Writes an EXPLICIT `[n]` wrapper around the closure's content.
    pub fn explicit(&mut self, number: u8, build: impl FnOnce(&mut Encoder)) {
        self.constructed(tag::context_constructed(number), build);
    }

    /// Writes an IMPLICIT primitive `[n]` element with raw content bytes.
    pub fn implicit_primitive(&mut self, number: u8, content: &[u8]) {
        self.primitive(tag::context(number), content);
    }

    /// Writes an IMPLICIT constructed `[n]` element (re-tagged SEQUENCE).
    pub fn implicit_constructed(&mut self, number: u8, build: impl FnOnce(&mut Encoder)) {
        self.constructed(tag::context_constructed(number), build);
    }

    fn constructed(&mut self, tag: u8, build: impl FnOnce(&mut Encoder)) {
        let mut inner = Encoder::new();
        build(&mut inner);
        let content = inner.finish();
        self.header(tag, content.len());
        self.out.extend_from_slice(&content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Tests the minimal-length header rule around the one- and two-byte
    // length boundaries.
    #[test]
    fn test_length_forms() {
        let mut enc = Encoder::new();
        enc.octet_string(&[0xaa; 127]);
        let der = enc.finish();
        assert_eq!(&der[..2], &[0x04, 0x7f]);

        let mut enc = Encoder::new();
        enc.octet_string(&[0xaa; 128]);
        let der = enc.finish();
        assert_eq!(&der[..3], &[0x04, 0x81, 0x80]);

        let mut enc = Encoder::new();
        enc.octet_string(&[0xaa; 256]);
        let der = enc.finish();
        assert_eq!(&der[..4], &[0x04, 0x82, 0x01, 0x00]);
    }

    // Tests minimal INTEGER encoding, including the leading-zero rule for
    // magnitudes with the top bit set (certificate serial numbers rely on
    // this).
    #[test]
    fn test_integer_minimal() {
        let mut enc = Encoder::new();
        enc.uint(0);
        enc.uint(127);
        enc.uint(128);
        enc.unsigned_integer(&[0x00, 0x00, 0x01]);
        let der = enc.finish();
        assert_eq!(
            der,
            [0x02, 0x01, 0x00, 0x02, 0x01, 0x7f, 0x02, 0x02, 0x00, 0x80, 0x02, 0x01, 0x01]
        );
    }

    // Tests the RFC 5280 UTCTime/GeneralizedTime switchover at year 2050.
    #[test]
    fn test_time_encoding_rule() {
        let mut enc = Encoder::new();
        enc.time(Utc.with_ymd_and_hms(2049, 12, 31, 23, 59, 59).unwrap());
        enc.time(Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap());
        let der = enc.finish();
        assert_eq!(&der[..2], &[0x17, 0x0d]);
        assert_eq!(&der[2..15], b"491231235959Z");
        assert_eq!(&der[15..17], &[0x18, 0x0f]);
        assert_eq!(&der[17..], b"20500101000000Z");
    }
}
