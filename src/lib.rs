// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

// Pull in the README as the package doc
#![doc = include_str!("../README.md")]

pub mod authority;
pub mod clock;
pub mod der;
pub mod httpsig;
pub mod keys;
pub mod pem;
pub mod pkcs12;
pub mod store;
pub mod x509;
