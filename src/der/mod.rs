// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Strict DER encoding and decoding.
//!
//! Only the distinguished encoding rules are implemented: lengths are
//! minimal, INTEGERs are minimal, SET OF is sorted, and the decoder rejects
//! anything the encoder would not produce. BER forms (indefinite lengths,
//! non-minimal lengths, padded integers) are errors, not tolerated input.
//!
//! https://www.itu.int/rec/T-REC-X.690

use std::fmt;

mod decode;
mod encode;

pub use decode::Decoder;
pub use encode::Encoder;

/// Result type used by DER APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a DER violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The element tag differs from the one the caller expected.
    UnexpectedTag,
    /// The length octets are malformed or indefinite.
    InvalidLength,
    /// The buffer ended before the element did.
    Truncated,
    /// The element is well-formed BER but not the distinguished encoding.
    NonCanonical,
    /// A numeric value exceeds the range representable by the caller's type.
    Overflow,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::UnexpectedTag => "unexpected tag",
            ErrorKind::InvalidLength => "invalid length",
            ErrorKind::Truncated => "truncated input",
            ErrorKind::NonCanonical => "non-canonical encoding",
            ErrorKind::Overflow => "value overflow",
        };
        f.write_str(text)
    }
}

/// Error type used by DER APIs. The offset points at the first byte of the
/// offending element within the outermost buffer handed to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("DER error at byte {offset}: {kind}")]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Absolute byte offset into the decoded buffer.
    pub offset: usize,
}

/// ASN.1 tag constants for the universal class types used by this crate.
pub mod tag {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const UTF8_STRING: u8 = 0x0c;
    pub const PRINTABLE_STRING: u8 = 0x13;
    pub const IA5_STRING: u8 = 0x16;
    pub const UTC_TIME: u8 = 0x17;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;

    /// Context-specific primitive tag `[n]`.
    pub const fn context(number: u8) -> u8 {
        0x80 | number
    }

    /// Context-specific constructed tag `[n]`.
    pub const fn context_constructed(number: u8) -> u8 {
        0xa0 | number
    }
}
