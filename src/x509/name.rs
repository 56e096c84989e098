// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{Error, Result, oid};
use crate::der::{self, Decoder, Encoder};
use const_oid::ObjectIdentifier;
use std::fmt;

/// A DN attribute value encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameValue {
    /// UTF8String value.
    Utf8(String),
    /// PrintableString value (restricted ASCII subset from RFC 5280).
    Printable(String),
    /// IA5String value (7-bit ASCII).
    Ia5(String),
}

impl NameValue {
    /// The text of the value, whatever its string type.
    pub fn text(&self) -> &str {
        match self {
            NameValue::Utf8(value) | NameValue::Printable(value) | NameValue::Ia5(value) => value,
        }
    }

    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            NameValue::Utf8(value) => enc.utf8_string(value),
            NameValue::Printable(value) => {
                if !is_printable_string(value) {
                    return Err(Error::InvalidPrintableString);
                }
                enc.printable_string(value);
            }
            NameValue::Ia5(value) => {
                if !value.is_ascii() {
                    return Err(Error::InvalidIa5String);
                }
                enc.ia5_string(value);
            }
        }
        Ok(())
    }
}

pub(crate) fn is_printable_string(value: &str) -> bool {
    value.as_bytes().iter().all(|b| {
        b.is_ascii_alphanumeric()
            || matches!(
                *b,
                b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?'
            )
    })
}

/// A single DN attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameAttribute {
    /// Attribute OID (for example `2.5.4.3` for CN).
    pub oid: ObjectIdentifier,
    /// Encoded attribute value.
    pub value: NameValue,
}

/// Distinguished Name represented as ordered attributes, each forming its
/// own single-valued RDN.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    /// Ordered list of RDN attributes.
    pub attrs: Vec<NameAttribute>,
}

impl DistinguishedName {
    /// Creates an empty DN.
    pub fn new() -> Self {
        Self { attrs: Vec::new() }
    }

    /// Whether the DN has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Adds a UTF8String CN attribute.
    pub fn common_name(self, value: impl Into<String>) -> Self {
        self.push(oid::COMMON_NAME, NameValue::Utf8(value.into()))
    }

    /// Adds a UTF8String O attribute.
    pub fn organization(self, value: impl Into<String>) -> Self {
        self.push(oid::ORGANIZATION, NameValue::Utf8(value.into()))
    }

    /// Adds a UTF8String OU attribute.
    pub fn organizational_unit(self, value: impl Into<String>) -> Self {
        self.push(oid::ORGANIZATIONAL_UNIT, NameValue::Utf8(value.into()))
    }

    /// Adds a UTF8String L attribute.
    pub fn locality(self, value: impl Into<String>) -> Self {
        self.push(oid::LOCALITY, NameValue::Utf8(value.into()))
    }

    /// Adds a UTF8String ST attribute.
    pub fn state_or_province(self, value: impl Into<String>) -> Self {
        self.push(oid::STATE_OR_PROVINCE, NameValue::Utf8(value.into()))
    }

    /// Adds a PrintableString C attribute.
    pub fn country(self, value: impl Into<String>) -> Self {
        self.push(oid::COUNTRY, NameValue::Printable(value.into()))
    }

    /// Adds an IA5String email attribute.
    pub fn email(self, value: impl Into<String>) -> Self {
        self.push(oid::EMAIL_ADDRESS, NameValue::Ia5(value.into()))
    }

    /// Adds the CA/Browser Forum organizationIdentifier attribute carrying
    /// the `{scheme}{country}-{register}-{number}` registration reference.
    pub fn organization_identifier(self, value: impl Into<String>) -> Self {
        self.push(
            oid::CABF_ORGANIZATION_IDENTIFIER,
            NameValue::Utf8(value.into()),
        )
    }

    /// Adds an arbitrary attribute.
    pub fn push(mut self, oid: ObjectIdentifier, value: NameValue) -> Self {
        self.attrs.push(NameAttribute { oid, value });
        self
    }

    /// Writes the RDNSequence encoding of the name.
    pub(crate) fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let mut rdns = Vec::with_capacity(self.attrs.len());
        for attr in &self.attrs {
            let mut atav = Encoder::new();
            atav.oid(&attr.oid);
            attr.value.encode(&mut atav)?;
            let mut wrapped = Encoder::new();
            wrapped.sequence(|seq| seq.raw(&atav.finish()));
            let mut rdn = Encoder::new();
            rdn.set_of(vec![wrapped.finish()]);
            rdns.push(rdn.finish());
        }
        enc.sequence(|seq| {
            for rdn in &rdns {
                seq.raw(rdn);
            }
        });
        Ok(())
    }

    /// Returns the DER encoding of the name.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.finish())
    }

    /// Reads an RDNSequence. Multi-valued RDNs are flattened in encoded
    /// order; only the three string types this crate issues are accepted.
    pub(crate) fn decode(dec: &mut Decoder<'_>) -> der::Result<Self> {
        let mut attrs = Vec::new();
        dec.sequence(|rdns| {
            while !rdns.is_empty() {
                let members = rdns.set_of(|atav| {
                    atav.sequence(|inner| {
                        let oid = inner.oid()?;
                        let value = match inner.peek_tag()? {
                            der::tag::UTF8_STRING => {
                                NameValue::Utf8(inner.utf8_string()?.to_string())
                            }
                            der::tag::PRINTABLE_STRING => {
                                NameValue::Printable(inner.printable_string()?.to_string())
                            }
                            der::tag::IA5_STRING => {
                                NameValue::Ia5(inner.ia5_string()?.to_string())
                            }
                            _ => return Err(inner.error(der::ErrorKind::UnexpectedTag)),
                        };
                        Ok(NameAttribute { oid, value })
                    })
                })?;
                attrs.extend(members);
            }
            Ok(())
        })?;
        Ok(Self { attrs })
    }

    /// Parses a DER buffer into a name.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(der_bytes);
        let name = Self::decode(&mut dec)?;
        dec.finish().map_err(Error::from)?;
        Ok(name)
    }
}

/// The RFC 2253 string form: attributes in reverse order, short keywords
/// where the RFC defines them, dotted-decimal OIDs otherwise.
impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.attrs.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(
                f,
                "{}={}",
                keyword(&attr.oid),
                escape_2253(attr.value.text())
            )?;
        }
        Ok(())
    }
}

fn keyword(oid: &ObjectIdentifier) -> String {
    let known = [
        (oid::COMMON_NAME, "CN"),
        (oid::COUNTRY, "C"),
        (oid::LOCALITY, "L"),
        (oid::STATE_OR_PROVINCE, "ST"),
        (oid::ORGANIZATION, "O"),
        (oid::ORGANIZATIONAL_UNIT, "OU"),
    ];
    known
        .iter()
        .find(|(candidate, _)| candidate == oid)
        .map(|(_, keyword)| (*keyword).into())
        .unwrap_or_else(|| oid.to_string())
}

fn escape_2253(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let escape = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests the DER round trip of a PSD2-flavored subject with the CAB
    // Forum organizationIdentifier attribute.
    #[test]
    fn test_name_roundtrip() {
        let name = DistinguishedName::new()
            .country("GR")
            .state_or_province("Attica")
            .locality("Athens")
            .organization("Payments Hellas")
            .organizational_unit("Open Banking")
            .common_name("api.payments.example")
            .organization_identifier("PSDGR-BOG-123456");

        let der_bytes = name.to_der().unwrap();
        let restored = DistinguishedName::from_der(&der_bytes).unwrap();
        assert_eq!(name, restored);
        assert_eq!(restored.to_der().unwrap(), der_bytes);
    }

    // Tests the reversed RFC 2253 string form with keyword mapping and
    // dotted-decimal fallback.
    #[test]
    fn test_name_string_form() {
        let name = DistinguishedName::new()
            .country("GR")
            .organization("Payments Hellas")
            .common_name("api.payments.example")
            .organization_identifier("PSDGR-BOG-123456");

        assert_eq!(
            name.to_string(),
            "2.23.140.3.1=PSDGR-BOG-123456,CN=api.payments.example,O=Payments Hellas,C=GR"
        );
    }

    // Tests RFC 2253 escaping of separator characters.
    #[test]
    fn test_name_string_escaping() {
        let name = DistinguishedName::new()
            .organization("Acme, Inc.")
            .common_name("x");
        assert_eq!(name.to_string(), "CN=x,O=Acme\\, Inc.");
    }

    // Tests that PrintableString and IA5String values are charset-checked
    // at encode time.
    #[test]
    fn test_name_charset_validation() {
        let name = DistinguishedName::new().country("Ελ");
        assert!(matches!(name.to_der(), Err(Error::InvalidPrintableString)));

        let name = DistinguishedName::new().email("καφές@example.com");
        assert!(matches!(name.to_der(), Err(Error::InvalidIa5String)));
    }
}
