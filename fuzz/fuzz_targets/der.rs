// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![no_main]

use darkbio_qwac::x509::{Certificate, CertificateList};
use libfuzzer_sys::fuzz_target;

// Anything the strict parsers accept must re-encode to the identical
// bytes; anything else must fail without panicking.
fuzz_target!(|data: &[u8]| {
    if let Ok(cert) = Certificate::from_der(data) {
        assert_eq!(cert.to_der(), data);
        let _ = cert.subject_key_identifier();
        let _ = cert.authority_key_identifier();
        let _ = cert.basic_constraints();
        let _ = cert.key_usage();
        let _ = cert.qc_statements();
        let _ = cert.crl_distribution_uris();
    }
    if let Ok(crl) = CertificateList::from_der(data) {
        assert_eq!(crl.to_der(), data);
    }
});
