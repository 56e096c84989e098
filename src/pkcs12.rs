// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! PKCS#12 keystore encoding and decoding.
//!
//! One fixed, modern profile is implemented in both directions: certificates
//! travel in a plain `data` SafeContents, the private key in a PKCS#8
//! shrouded bag under PBES2 (PBKDF2-HMAC-SHA256, AES-256-CBC), and the whole
//! archive is authenticated with HMAC-SHA256 keyed via the RFC 7292
//! appendix B derivation. Anything else is rejected rather than guessed at.
//!
//! https://datatracker.ietf.org/doc/html/rfc7292

use crate::der::{self, Decoder, Encoder};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use const_oid::ObjectIdentifier;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const OID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const OID_SHROUDED_KEY_BAG: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.2");
const OID_CERT_BAG: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.3");
const OID_X509_CERTIFICATE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.22.1");
const OID_LOCAL_KEY_ID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.21");
const OID_PBES2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.13");
const OID_PBKDF2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.12");
const OID_HMAC_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.9");
const OID_AES256_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.42");
const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

const ITERATIONS: u32 = 2048;
const MAC_KEY_ID: u8 = 3;

/// Result type used by PKCS#12 APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used by PKCS#12 APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported PFX version {version}")]
    UnsupportedVersion { version: u64 },
    #[error("archive MAC verification failed")]
    MacMismatch,
    #[error("missing archive MAC")]
    MissingMac,
    #[error("unsupported content type {oid}")]
    UnsupportedContentType { oid: String },
    #[error("unsupported bag type {oid}")]
    UnsupportedBagType { oid: String },
    #[error("unsupported encryption scheme {oid}")]
    UnsupportedEncryption { oid: String },
    #[error("private key decryption failed")]
    DecryptionFailed,
    #[error("archive contains no private key")]
    MissingPrivateKey,
    #[error("archive contains no certificate")]
    MissingCertificate,
    #[error("random salt generation failed: {details}")]
    SaltGenerationFailed { details: String },
    #[error(transparent)]
    Der(#[from] der::Error),
}

/// The decoded archive: certificates in stored order plus the PKCS#8 key.
#[derive(Debug, Clone)]
pub struct Contents {
    /// Certificate DER blobs; the entity certificate first by convention.
    pub certificates: Vec<Vec<u8>>,
    /// PKCS#8 private key DER.
    pub private_key: Vec<u8>,
}

/// Builds a password-protected archive from certificate DER blobs and a
/// PKCS#8 private key.
pub fn encode(password: &str, certificates: &[&[u8]], private_key: &[u8]) -> Result<Vec<u8>> {
    let mut kdf_salt = [0u8; 16];
    let mut iv = [0u8; 16];
    let mut mac_salt = [0u8; 16];
    for salt in [&mut kdf_salt, &mut iv, &mut mac_salt] {
        getrandom::fill(salt).map_err(|e| Error::SaltGenerationFailed {
            details: e.to_string(),
        })?;
    }

    // The first certificate is assumed to match the private key; both get
    // the same localKeyId so consumers can pair them.
    let local_key_id: Vec<u8> = certificates
        .first()
        .map(|cert| Sha1::digest(cert).to_vec())
        .unwrap_or_default();

    // Certificates as cert bags in a plain data SafeContents.
    let mut cert_safe = Encoder::new();
    cert_safe.sequence(|bags| {
        for (index, cert) in certificates.iter().enumerate() {
            bags.sequence(|bag| {
                bag.oid(&OID_CERT_BAG);
                bag.explicit(0, |value| {
                    value.sequence(|cert_bag| {
                        cert_bag.oid(&OID_X509_CERTIFICATE);
                        cert_bag.explicit(0, |inner| inner.octet_string(cert));
                    });
                });
                if index == 0 && !local_key_id.is_empty() {
                    encode_local_key_id(bag, &local_key_id);
                }
            });
        }
    });

    // The private key as a PKCS#8 shrouded bag under PBES2.
    let mut key = derive_pbes2_key(password, &kdf_salt);
    let encrypted = Aes256CbcEnc::new_from_slices(&key, &iv)
        .expect("key and IV lengths are fixed")
        .encrypt_padded_vec_mut::<Pkcs7>(private_key);
    key.zeroize();

    let mut key_safe = Encoder::new();
    key_safe.sequence(|bags| {
        bags.sequence(|bag| {
            bag.oid(&OID_SHROUDED_KEY_BAG);
            bag.explicit(0, |value| {
                value.sequence(|epki| {
                    encode_pbes2_parameters(epki, &kdf_salt, &iv);
                    epki.octet_string(&encrypted);
                });
            });
            if !local_key_id.is_empty() {
                encode_local_key_id(bag, &local_key_id);
            }
        });
    });

    // Two plain data ContentInfos wrap the two SafeContents.
    let cert_safe_der = cert_safe.finish();
    let key_safe_der = key_safe.finish();
    let mut auth_safe = Encoder::new();
    auth_safe.sequence(|contents| {
        for safe_der in [&cert_safe_der, &key_safe_der] {
            contents.sequence(|info| {
                info.oid(&OID_DATA);
                info.explicit(0, |content| content.octet_string(safe_der));
            });
        }
    });
    let auth_safe_der = auth_safe.finish();

    // Authenticate the AuthenticatedSafe with the PKCS#12 KDF + HMAC.
    let mut mac_key = pkcs12_kdf(password, &mac_salt, MAC_KEY_ID, ITERATIONS, 32);
    let mut mac = HmacSha256::new_from_slice(&mac_key).expect("HMAC accepts any key length");
    mac.update(&auth_safe_der);
    let digest = mac.finalize().into_bytes();
    mac_key.zeroize();

    let mut pfx = Encoder::new();
    pfx.sequence(|outer| {
        outer.uint(3);
        outer.sequence(|info| {
            info.oid(&OID_DATA);
            info.explicit(0, |content| content.octet_string(&auth_safe_der));
        });
        outer.sequence(|mac_data| {
            mac_data.sequence(|mac_info| {
                mac_info.sequence(|alg| {
                    alg.oid(&OID_SHA256);
                    alg.null();
                });
                mac_info.octet_string(&digest);
            });
            mac_data.octet_string(&mac_salt);
            mac_data.uint(ITERATIONS as u64);
        });
    });
    Ok(pfx.finish())
}

/// Opens a password-protected archive, verifying the MAC before touching
/// any content.
pub fn decode(data: &[u8], password: &str) -> Result<Contents> {
    let mut failure: Option<Error> = None;
    let mut dec = Decoder::new(data);
    let parsed = dec.sequence(|outer| {
        let version = outer.uint()?;
        if version != 3 {
            failure = Some(Error::UnsupportedVersion { version });
            return Err(outer.error(der::ErrorKind::UnexpectedTag));
        }
        let auth_safe_der = decode_data_content(outer, &mut failure)?;
        let mac = outer.sequence(|mac_data| {
            let digest = mac_data.sequence(|mac_info| {
                mac_info.sequence(|alg| {
                    let alg_oid = alg.oid()?;
                    if alg_oid != OID_SHA256 {
                        failure = Some(Error::UnsupportedEncryption {
                            oid: alg_oid.to_string(),
                        });
                        return Err(alg.error(der::ErrorKind::UnexpectedTag));
                    }
                    alg.null()?;
                    Ok(())
                })?;
                Ok(mac_info.octet_string()?.to_vec())
            })?;
            let salt = mac_data.octet_string()?.to_vec();
            let iterations = mac_data.uint()?;
            Ok((digest, salt, iterations))
        })?;
        Ok((auth_safe_der, mac))
    });
    if let Some(e) = failure {
        return Err(e);
    }
    let (auth_safe_der, (digest, mac_salt, iterations)) = parsed?;
    dec.finish()?;

    let mut mac_key = pkcs12_kdf(password, &mac_salt, MAC_KEY_ID, iterations as u32, 32);
    let mut mac = HmacSha256::new_from_slice(&mac_key).expect("HMAC accepts any key length");
    mac.update(&auth_safe_der);
    let verified = mac.verify_slice(&digest);
    mac_key.zeroize();
    if verified.is_err() {
        return Err(Error::MacMismatch);
    }

    let mut certificates = Vec::new();
    let mut private_key: Option<Vec<u8>> = None;

    let mut dec = Decoder::new(&auth_safe_der);
    let mut failure: Option<Error> = None;
    let result = dec.sequence(|contents| {
        while !contents.is_empty() {
            let safe_der = decode_data_content(contents, &mut failure)?;
            let mut safe_dec = Decoder::new(&safe_der);
            safe_dec.sequence(|bags| {
                while !bags.is_empty() {
                    bags.sequence(|bag| {
                        decode_safe_bag(
                            bag,
                            password,
                            &mut certificates,
                            &mut private_key,
                            &mut failure,
                        )
                    })?;
                }
                Ok(())
            })?;
            safe_dec.finish()?;
        }
        Ok(())
    });
    if let Some(e) = failure {
        return Err(e);
    }
    result?;
    dec.finish()?;

    if certificates.is_empty() {
        return Err(Error::MissingCertificate);
    }
    let private_key = private_key.ok_or(Error::MissingPrivateKey)?;
    Ok(Contents {
        certificates,
        private_key,
    })
}

fn encode_local_key_id(bag: &mut Encoder, local_key_id: &[u8]) {
    let mut attribute = Encoder::new();
    attribute.sequence(|attr| {
        attr.oid(&OID_LOCAL_KEY_ID);
        let mut value = Encoder::new();
        value.octet_string(local_key_id);
        attr.set_of(vec![value.finish()]);
    });
    bag.set_of(vec![attribute.finish()]);
}

fn encode_pbes2_parameters(enc: &mut Encoder, salt: &[u8], iv: &[u8]) {
    enc.sequence(|alg| {
        alg.oid(&OID_PBES2);
        alg.sequence(|params| {
            params.sequence(|kdf| {
                kdf.oid(&OID_PBKDF2);
                kdf.sequence(|kdf_params| {
                    kdf_params.octet_string(salt);
                    kdf_params.uint(ITERATIONS as u64);
                    kdf_params.sequence(|prf| {
                        prf.oid(&OID_HMAC_SHA256);
                        prf.null();
                    });
                });
            });
            params.sequence(|scheme| {
                scheme.oid(&OID_AES256_CBC);
                scheme.octet_string(iv);
            });
        });
    });
}

/// Reads a `data` ContentInfo and returns the wrapped OCTET STRING bytes.
fn decode_data_content(dec: &mut Decoder<'_>, failure: &mut Option<Error>) -> der::Result<Vec<u8>> {
    dec.sequence(|info| {
        let content_type = info.oid()?;
        if content_type != OID_DATA {
            *failure = Some(Error::UnsupportedContentType {
                oid: content_type.to_string(),
            });
            return Err(info.error(der::ErrorKind::UnexpectedTag));
        }
        info.explicit(0, |content| Ok(content.octet_string()?.to_vec()))
    })
}

fn decode_safe_bag(
    bag: &mut Decoder<'_>,
    password: &str,
    certificates: &mut Vec<Vec<u8>>,
    private_key: &mut Option<Vec<u8>>,
    failure: &mut Option<Error>,
) -> der::Result<()> {
    let bag_id = bag.oid()?;
    if bag_id == OID_CERT_BAG {
        let cert = bag.explicit(0, |value| {
            value.sequence(|cert_bag| {
                let cert_type = cert_bag.oid()?;
                if cert_type != OID_X509_CERTIFICATE {
                    *failure = Some(Error::UnsupportedBagType {
                        oid: cert_type.to_string(),
                    });
                    return Err(cert_bag.error(der::ErrorKind::UnexpectedTag));
                }
                cert_bag.explicit(0, |inner| Ok(inner.octet_string()?.to_vec()))
            })
        })?;
        certificates.push(cert);
    } else if bag_id == OID_SHROUDED_KEY_BAG {
        let (salt, iterations, iv, encrypted) = bag.explicit(0, |value| {
            value.sequence(|epki| {
                let params = epki.sequence(|alg| {
                    let alg_oid = alg.oid()?;
                    if alg_oid != OID_PBES2 {
                        *failure = Some(Error::UnsupportedEncryption {
                            oid: alg_oid.to_string(),
                        });
                        return Err(alg.error(der::ErrorKind::UnexpectedTag));
                    }
                    alg.sequence(|params| {
                        let (salt, iterations) = params.sequence(|kdf| {
                            let kdf_oid = kdf.oid()?;
                            if kdf_oid != OID_PBKDF2 {
                                *failure = Some(Error::UnsupportedEncryption {
                                    oid: kdf_oid.to_string(),
                                });
                                return Err(kdf.error(der::ErrorKind::UnexpectedTag));
                            }
                            kdf.sequence(|kdf_params| {
                                let salt = kdf_params.octet_string()?.to_vec();
                                let iterations = kdf_params.uint()?;
                                kdf_params.sequence(|prf| {
                                    let prf_oid = prf.oid()?;
                                    if prf_oid != OID_HMAC_SHA256 {
                                        *failure = Some(Error::UnsupportedEncryption {
                                            oid: prf_oid.to_string(),
                                        });
                                        return Err(prf.error(der::ErrorKind::UnexpectedTag));
                                    }
                                    prf.null()?;
                                    Ok(())
                                })?;
                                Ok((salt, iterations))
                            })
                        })?;
                        let iv = params.sequence(|scheme| {
                            let scheme_oid = scheme.oid()?;
                            if scheme_oid != OID_AES256_CBC {
                                *failure = Some(Error::UnsupportedEncryption {
                                    oid: scheme_oid.to_string(),
                                });
                                return Err(scheme.error(der::ErrorKind::UnexpectedTag));
                            }
                            Ok(scheme.octet_string()?.to_vec())
                        })?;
                        Ok((salt, iterations, iv))
                    })
                })?;
                let encrypted = epki.octet_string()?.to_vec();
                Ok((params.0, params.1, params.2, encrypted))
            })
        })?;

        let mut key = derive_pbes2_key_iter(password, &salt, iterations as u32);
        let decrypted = Aes256CbcDec::new_from_slices(&key, &iv)
            .ok()
            .and_then(|cipher| cipher.decrypt_padded_vec_mut::<Pkcs7>(&encrypted).ok());
        key.zeroize();
        match decrypted {
            Some(plain) => *private_key = Some(plain),
            None => {
                *failure = Some(Error::DecryptionFailed);
                return Err(bag.error(der::ErrorKind::UnexpectedTag));
            }
        }
    } else {
        *failure = Some(Error::UnsupportedBagType {
            oid: bag_id.to_string(),
        });
        return Err(bag.error(der::ErrorKind::UnexpectedTag));
    }

    // Optional bag attributes; their content is not interpreted.
    if !bag.is_empty() {
        bag.tlv()?;
    }
    Ok(())
}

fn derive_pbes2_key(password: &str, salt: &[u8]) -> [u8; 32] {
    derive_pbes2_key_iter(password, salt, ITERATIONS)
}

fn derive_pbes2_key_iter(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// The RFC 7292 appendix B key derivation with SHA-256 (u = 32, v = 64).
/// The password enters as a null-terminated UTF-16-BE BMPString.
fn pkcs12_kdf(password: &str, salt: &[u8], id: u8, iterations: u32, n: usize) -> Vec<u8> {
    const U: usize = 32;
    const V: usize = 64;

    let mut bmp_password = Vec::with_capacity(2 * password.len() + 2);
    for unit in password.encode_utf16() {
        bmp_password.extend_from_slice(&unit.to_be_bytes());
    }
    bmp_password.extend_from_slice(&[0, 0]);

    let repeat_to_multiple = |data: &[u8]| -> Vec<u8> {
        if data.is_empty() {
            return Vec::new();
        }
        let target = data.len().div_ceil(V) * V;
        data.iter().copied().cycle().take(target).collect()
    };

    let diversifier = [id; V];
    let mut input = repeat_to_multiple(salt);
    input.extend(repeat_to_multiple(&bmp_password));
    bmp_password.zeroize();

    let mut output = Vec::with_capacity(n.div_ceil(U) * U);
    while output.len() < n {
        let mut block: [u8; U] = {
            let mut hasher = Sha256::new();
            hasher.update(diversifier);
            hasher.update(&input);
            hasher.finalize().into()
        };
        for _ in 1..iterations {
            block = Sha256::digest(block).into();
        }
        output.extend_from_slice(&block);

        // B = block repeated to v bytes; each v-byte chunk of I becomes
        // (chunk + B + 1) mod 2^(v*8).
        let filler: Vec<u8> = block.iter().copied().cycle().take(V).collect();
        for chunk in input.chunks_mut(V) {
            let mut carry = 1u16;
            for (byte, add) in chunk.iter_mut().rev().zip(filler.iter().rev()) {
                let sum = *byte as u16 + *add as u16 + carry;
                *byte = sum as u8;
                carry = sum >> 8;
            }
        }
    }
    output.truncate(n);
    output
}
