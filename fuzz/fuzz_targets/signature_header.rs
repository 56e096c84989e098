// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![no_main]

use darkbio_qwac::httpsig::{BodyDigest, SignatureHeader};
use libfuzzer_sys::fuzz_target;

// Header parsers must round trip accepted input and reject the rest
// without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(header) = SignatureHeader::parse(text) {
        let reparsed = SignatureHeader::parse(&header.to_header_value())
            .expect("serialized Signature header must reparse");
        assert_eq!(reparsed, header);
    }
    if let Ok(digest) = BodyDigest::parse(text) {
        let reparsed = BodyDigest::parse(&digest.to_header_value())
            .expect("serialized Digest header must reparse");
        assert_eq!(reparsed, digest);
    }
});
