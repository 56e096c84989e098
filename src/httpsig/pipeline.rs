// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::digest::{BodyDigest, DigestAlgorithm};
use super::keys::{CredentialStore, SecurityKey, ValidationKeyStore};
use super::{Error, RequestTarget, Result, SignatureHeader, signing_string};
use crate::clock::{Clock, SystemClock};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;

/// A path-scoped signature rule.
///
/// `pattern` is a `/`-separated template: a `*` segment matches exactly one
/// path segment, and a trailing `*` matches any remaining suffix. `headers`
/// is the signature input list responses on this path are signed with.
#[derive(Debug, Clone)]
pub struct PathRule {
    /// Path template, for example `/payments/*`.
    pub pattern: String,
    /// Signature input list for response signing on this rule.
    pub headers: Vec<String>,
}

impl PathRule {
    /// Creates a rule from a pattern and a header list.
    pub fn new(pattern: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            pattern: pattern.into(),
            headers: headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
        }
    }

    fn matches(&self, path: &str) -> bool {
        let template: Vec<&str> = self.pattern.split('/').filter(|s| !s.is_empty()).collect();
        let path = path.split('?').next().unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for (index, expected) in template.iter().enumerate() {
            if *expected == "*" && index == template.len() - 1 {
                // Trailing wildcard swallows the rest of the path.
                return segments.len() >= index;
            }
            match segments.get(index) {
                Some(segment) if *expected == "*" || segment == expected => {}
                _ => return false,
            }
        }
        segments.len() == template.len()
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Ordered path rules; the first match wins.
    pub rules: Vec<PathRule>,
    /// Whether inbound requests on matched paths are validated.
    pub request_validation: bool,
    /// Whether outbound responses on matched paths are signed. `None`
    /// signs exactly when a signing credential is configured.
    pub response_signing: Option<bool>,
    /// Header carrying the base64 X.509 used to validate requests.
    pub request_certificate_header: String,
    /// Header carrying the base64 X.509 advertised with responses.
    pub response_certificate_header: String,
    /// Header a fronting proxy uses to carry the original request path.
    pub forwarded_path_header: String,
    /// Request-side creation time header name; mapped to the response
    /// equivalent in response signature input lists.
    pub request_created_header: String,
    /// Response-side creation time header name.
    pub response_created_header: String,
    /// Response id header name.
    pub response_id_header: String,
    /// Largest body the pipeline will buffer for digest checks.
    pub max_body_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            request_validation: true,
            response_signing: None,
            request_certificate_header: "tpp-signature-certificate".into(),
            response_certificate_header: "aspsp-signature-certificate".into(),
            forwarded_path_header: "x-forwarded-path".into(),
            request_created_header: "x-request-created".into(),
            response_created_header: "x-response-created".into(),
            response_id_header: "x-response-id".into(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Bidirectional HTTP signature middleware.
///
/// Inbound requests on matched paths must carry a valid signature (and
/// digest when referenced); outbound responses on matched paths are signed
/// with the configured credential. The pipeline is framework-agnostic: the
/// host adapts its request type to `http::Request<Bytes>` and supplies the
/// downstream stage as a closure.
pub struct SignaturePipeline<V, C> {
    config: PipelineConfig,
    validation_keys: V,
    credentials: C,
    clock: Arc<dyn Clock>,
}

impl<V: ValidationKeyStore, C: CredentialStore> SignaturePipeline<V, C> {
    /// Creates a pipeline on the wall clock.
    pub fn new(config: PipelineConfig, validation_keys: V, credentials: C) -> Self {
        Self::with_clock(config, validation_keys, credentials, Arc::new(SystemClock))
    }

    /// Creates a pipeline with an injected clock.
    pub fn with_clock(
        config: PipelineConfig,
        validation_keys: V,
        credentials: C,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            validation_keys,
            credentials,
            clock,
        }
    }

    /// Runs a request through the pipeline: validates it when a rule
    /// matches (or a `Signature` header is present), invokes `next`, and
    /// signs the response on matched rules.
    pub async fn handle<F, Fut>(&self, request: Request<Bytes>, next: F) -> Response<Bytes>
    where
        F: FnOnce(Request<Bytes>) -> Fut,
        Fut: Future<Output = Response<Bytes>>,
    {
        let path_and_query = self.request_path(&request);
        let rule = self
            .config
            .rules
            .iter()
            .find(|rule| rule.matches(&path_and_query));
        let has_signature = request.headers().contains_key("signature");
        if rule.is_none() && !has_signature {
            return next(request).await;
        }

        if self.config.request_validation {
            if let Err(failure) = self.validate_request(&request, &path_and_query).await {
                tracing::warn!(path = %path_and_query, error = %failure, "rejected unsigned or mis-signed request");
                return problem_response(&failure);
            }
        }

        let rule_headers = rule.map(|rule| rule.headers.clone());
        let target = RequestTarget {
            method: request.method().to_string(),
            path_and_query: path_and_query.clone(),
        };
        let request_headers = request.headers().clone();

        let response = next(request).await;

        let Some(rule_headers) = rule_headers else {
            return response;
        };
        if self.config.response_signing == Some(false) {
            return response;
        }
        match self
            .sign_response(response, &rule_headers, &target, &request_headers)
            .await
        {
            Ok(signed) => signed,
            Err(failure) => {
                // A partially signed response must never leave the
                // pipeline; fail the whole exchange instead.
                tracing::error!(path = %path_and_query, error = %failure, "response signing failed");
                internal_problem_response()
            }
        }
    }

    /// Inbound validation per the documented state machine.
    async fn validate_request(
        &self,
        request: &Request<Bytes>,
        path_and_query: &str,
    ) -> Result<()> {
        let raw = request
            .headers()
            .get("signature")
            .ok_or(Error::MissingSignature)?
            .to_str()
            .map_err(|_| Error::MalformedSignature {
                details: "header is not valid UTF-8".into(),
            })?;
        let signature = SignatureHeader::parse(raw)?;

        let candidates = self.resolve_validation_keys(request.headers()).await?;

        if *request.method() == Method::POST || *request.method() == Method::PUT {
            let body = request.body();
            if body.len() > self.config.max_body_size {
                return Err(Error::BodyTooLarge);
            }
            if signature.headers.iter().any(|name| name == "digest") {
                let header = request
                    .headers()
                    .get("digest")
                    .ok_or(Error::MissingDigest)?
                    .to_str()
                    .map_err(|_| Error::MalformedDigest {
                        details: "header is not valid UTF-8".into(),
                    })?;
                let digest = BodyDigest::parse(header)?;
                if !digest.matches(body) {
                    return Err(Error::DigestMismatch);
                }
            }
        }

        if let Some(expires) = signature.expires {
            if expires < self.clock.now().timestamp() {
                return Err(Error::Expired);
            }
        }

        let target = RequestTarget {
            method: request.method().to_string(),
            path_and_query: path_and_query.to_string(),
        };
        let input = signing_string(
            &signature.headers,
            request.headers(),
            Some(&target),
            signature.created,
            signature.expires,
        )?;

        let algorithm = signature.scheme().algorithm();
        for candidate in &candidates {
            if candidate
                .key
                .verify(algorithm, input.as_bytes(), &signature.signature)
                .is_ok()
            {
                return Ok(());
            }
        }
        tracing::debug!(key_id = %signature.key_id, candidates = candidates.len(), "no candidate key verified the signature");
        Err(Error::SignatureInvalid)
    }

    /// Key resolution: a certificate travelling with the request wins,
    /// otherwise the configured trust store supplies the candidates.
    async fn resolve_validation_keys(&self, headers: &HeaderMap) -> Result<Vec<SecurityKey>> {
        let name = header_name(&self.config.request_certificate_header)?;
        if let Some(value) = headers.get(&name) {
            let der = BASE64
                .decode(value.as_bytes())
                .map_err(|_| Error::BadCertificate)?;
            return Ok(vec![SecurityKey::from_certificate_der(&der)?]);
        }
        let keys = self.validation_keys.validation_keys().await?;
        if keys.is_empty() {
            return Err(Error::NoValidationKeys);
        }
        Ok(keys)
    }

    /// Signs a response: fresh digest, generated response id, creation
    /// time, then a signature over the rule's header list. Headers are
    /// staged and only applied after the signature exists.
    async fn sign_response(
        &self,
        response: Response<Bytes>,
        rule_headers: &[String],
        target: &RequestTarget,
        request_headers: &HeaderMap,
    ) -> Result<Response<Bytes>> {
        let Some(credentials) = self.credentials.signing_credentials().await? else {
            return if self.config.response_signing == Some(true) {
                Err(Error::NoSigningCredentials)
            } else {
                Ok(response)
            };
        };

        let (mut parts, body) = response.into_parts();
        let digest = BodyDigest::compute(DigestAlgorithm::Sha256, &body);
        let created = self.clock.now().timestamp();
        let response_id = uuid::Uuid::new_v4().to_string();

        let mut staged = parts.headers.clone();
        staged.insert("digest", header_value(&digest.to_header_value())?);
        staged.insert(
            header_name(&self.config.response_id_header)?,
            header_value(&response_id)?,
        );
        staged.insert(
            header_name(&self.config.response_created_header)?,
            header_value(&created.to_string())?,
        );

        // The response reuses the inbound rule's list, with the request
        // creation header swapped for its response counterpart.
        let header_list: Vec<String> = rule_headers
            .iter()
            .map(|name| {
                let name = name.to_ascii_lowercase();
                if name == self.config.request_created_header {
                    self.config.response_created_header.clone()
                } else {
                    name
                }
            })
            .collect();

        // Listed headers the handler did not set are echoed from the
        // request (x-request-id and friends), so the response verifies
        // standalone.
        for name in &header_list {
            if name.starts_with('(') || staged.contains_key(name.as_str()) {
                continue;
            }
            let listed = header_name(name)?;
            for value in request_headers.get_all(&listed) {
                staged.append(listed.clone(), value.clone());
            }
        }

        let input = signing_string(&header_list, &staged, Some(target), Some(created), None)?;
        let signature = credentials
            .key
            .sign(credentials.scheme.algorithm(), input.as_bytes())?;
        let header = SignatureHeader {
            key_id: credentials.key_id.clone(),
            algorithm: Some(credentials.scheme),
            headers: header_list,
            created: Some(created),
            expires: None,
            signature,
        };

        parts.headers = staged;
        parts
            .headers
            .insert("signature", header_value(&header.to_header_value())?);
        if let Some(certificate) = &credentials.certificate {
            parts.headers.insert(
                header_name(&self.config.response_certificate_header)?,
                header_value(&BASE64.encode(certificate))?,
            );
        }
        Ok(Response::from_parts(parts, body))
    }

    /// The effective request path: a proxy-forwarded path wins over the
    /// request line.
    fn request_path(&self, request: &Request<Bytes>) -> String {
        if let Ok(name) = HeaderName::from_bytes(self.config.forwarded_path_header.as_bytes()) {
            if let Some(value) = request.headers().get(&name) {
                if let Ok(path) = value.to_str() {
                    return path.to_string();
                }
            }
        }
        request
            .uri()
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| request.uri().path().to_string())
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| Error::MalformedSignature {
        details: format!("configured header name {name:?} is invalid"),
    })
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::MalformedSignature {
        details: "header value contains invalid characters".into(),
    })
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::BadCertificate
        | Error::DigestMismatch
        | Error::SignatureInvalid
        | Error::Expired => StatusCode::UNAUTHORIZED,
        Error::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        Error::Key(_) | Error::NoSigningCredentials => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// An RFC 7807 problem-details response for a pipeline failure.
fn problem_response(error: &Error) -> Response<Bytes> {
    build_problem(status_for(error), &error.to_string())
}

/// The opaque 500 for server-side signing failures; details stay in the
/// logs.
fn internal_problem_response() -> Response<Bytes> {
    build_problem(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Response signing failed.",
    )
}

fn build_problem(status: StatusCode, detail: &str) -> Response<Bytes> {
    let body = serde_json::json!({
        "status": status.as_u16(),
        "title": status.canonical_reason().unwrap_or("Error"),
        "detail": detail,
    });
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/problem+json")
        .body(Bytes::from(body.to_string()))
        .expect("static problem response cannot fail to build")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::httpsig::{InMemoryKeyStore, SignatureScheme};
    use crate::keys::{SignatureAlgorithm, SigningKey};
    use crate::x509::{CertificateParams, DistinguishedName, random_serial, sign_certificate};
    use chrono::TimeZone;

    const NOW: i64 = 1_618_302_811;

    fn signer() -> (Vec<u8>, SigningKey) {
        let key = SigningKey::generate(2048).unwrap();
        let cert = sign_certificate(
            &CertificateParams {
                serial: &random_serial().unwrap(),
                algorithm: SignatureAlgorithm::Rs256,
                issuer: &DistinguishedName::new().common_name("Client"),
                subject: &DistinguishedName::new().common_name("Client"),
                not_before: chrono::Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
                not_after: chrono::Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap(),
                subject_key: &key.public_key(),
                extensions: &[],
            },
            &key,
        )
        .unwrap();
        (cert.to_der().to_vec(), key)
    }

    fn pipeline(
        trusted: &[u8],
        credentials: InMemoryKeyStore,
    ) -> SignaturePipeline<InMemoryKeyStore, InMemoryKeyStore> {
        let config = PipelineConfig {
            rules: vec![PathRule::new(
                "/payments/*",
                &["(request-target)", "(created)", "digest", "x-request-id"],
            )],
            ..Default::default()
        };
        SignaturePipeline::with_clock(
            config,
            InMemoryKeyStore::new().trust_certificate(trusted).unwrap(),
            credentials,
            Arc::new(FixedClock::at_unix(NOW)),
        )
    }

    /// Builds a signed POST with a correct digest over `body`.
    fn signed_request(key: &SigningKey, path: &str, body: &[u8]) -> Request<Bytes> {
        let digest = BodyDigest::compute(DigestAlgorithm::Sha256, body);
        let mut headers = HeaderMap::new();
        headers.insert("digest", digest.to_header_value().parse().unwrap());
        headers.insert("x-request-id", "req-7".parse().unwrap());

        let list: Vec<String> = ["(request-target)", "(created)", "digest", "x-request-id"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let input = signing_string(
            &list,
            &headers,
            Some(&RequestTarget {
                method: "POST".into(),
                path_and_query: path.into(),
            }),
            Some(NOW),
            None,
        )
        .unwrap();
        let signature = key.sign(SignatureAlgorithm::Rs256, input.as_bytes()).unwrap();
        let header = SignatureHeader {
            key_id: hex::encode(key.public_key().key_identifier()),
            algorithm: Some(SignatureScheme::RsaSha256),
            headers: list,
            created: Some(NOW),
            expires: None,
            signature,
        };

        let mut builder = Request::builder().method(Method::POST).uri(path);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        builder
            .header("signature", header.to_header_value())
            .body(Bytes::copy_from_slice(body))
            .unwrap()
    }

    async fn ok_next(_request: Request<Bytes>) -> Response<Bytes> {
        Response::builder()
            .status(StatusCode::OK)
            .body(Bytes::from_static(br#"{"ok":true}"#))
            .unwrap()
    }

    fn problem_detail(response: &Response<Bytes>) -> String {
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        body["detail"].as_str().unwrap().to_string()
    }

    // Tests that unmatched, unsigned traffic passes through untouched.
    #[tokio::test]
    async fn test_forwards_unmatched() {
        let (cert, _) = signer();
        let pipeline = pipeline(&cert, InMemoryKeyStore::new());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Bytes::new())
            .unwrap();
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("signature"));
    }

    // Tests the happy path: a correctly signed request is accepted and
    // forwarded.
    #[tokio::test]
    async fn test_accepts_valid_signature() {
        let (cert, key) = signer();
        let pipeline = pipeline(&cert, InMemoryKeyStore::new());
        let request = signed_request(&key, "/payments/sepa", br#"{"amount":1}"#);
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Tests that a matched path without a Signature header is a 400 with
    // a problem-details body.
    #[tokio::test]
    async fn test_missing_signature() {
        let (cert, _) = signer();
        let pipeline = pipeline(&cert, InMemoryKeyStore::new());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/payments/sepa")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/problem+json"
        );
        assert!(problem_detail(&response).contains("Missing signature"));
    }

    // Tests that a signature listing digest without a Digest header on
    // the request is a 400 mentioning the missing digest.
    #[tokio::test]
    async fn test_missing_digest() {
        let (cert, key) = signer();
        let pipeline = pipeline(&cert, InMemoryKeyStore::new());
        let mut request = signed_request(&key, "/payments/sepa", br#"{"amount":1}"#);
        request.headers_mut().remove("digest");
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(problem_detail(&response).contains("Missing digest"));
    }

    // Tests that mutating one byte of the body after signing yields a 401
    // with the digest failure detail.
    #[tokio::test]
    async fn test_mutated_body() {
        let (cert, key) = signer();
        let pipeline = pipeline(&cert, InMemoryKeyStore::new());
        let request = signed_request(&key, "/payments/sepa", br#"{"amount":1}"#);
        let (parts, _) = request.into_parts();
        let request = Request::from_parts(parts, Bytes::from_static(br#"{"amount":2}"#));
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(problem_detail(&response), "Digest validation failed.");
    }

    // Tests that a signature from an untrusted key is a 401.
    #[tokio::test]
    async fn test_untrusted_signer() {
        let (cert, _) = signer();
        let (_, rogue) = signer();
        let pipeline = pipeline(&cert, InMemoryKeyStore::new());
        let request = signed_request(&rogue, "/payments/sepa", br#"{"amount":1}"#);
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(problem_detail(&response), "Signature validation failed.");
    }

    // Tests that an expired signature is a 401.
    #[tokio::test]
    async fn test_expired_signature() {
        let (cert, key) = signer();
        let pipeline = pipeline(&cert, InMemoryKeyStore::new());
        let mut request = signed_request(&key, "/payments/sepa", br#"{"amount":1}"#);
        // Re-sign with an expires in the past.
        let digest = BodyDigest::compute(DigestAlgorithm::Sha256, br#"{"amount":1}"#);
        let mut headers = HeaderMap::new();
        headers.insert("digest", digest.to_header_value().parse().unwrap());
        let list = vec!["(created)".to_string(), "(expires)".to_string(), "digest".to_string()];
        let input = signing_string(&list, &headers, None, Some(NOW - 600), Some(NOW - 300))
            .unwrap();
        let signature = key.sign(SignatureAlgorithm::Rs256, input.as_bytes()).unwrap();
        let header = SignatureHeader {
            key_id: "stale".into(),
            algorithm: Some(SignatureScheme::RsaSha256),
            headers: list,
            created: Some(NOW - 600),
            expires: Some(NOW - 300),
            signature,
        };
        request
            .headers_mut()
            .insert("signature", header.to_header_value().parse().unwrap());
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(problem_detail(&response), "Signature has expired.");
    }

    // Tests key resolution from the request certificate header when the
    // trust store is empty, plus the empty-store and garbage-certificate
    // failure modes.
    #[tokio::test]
    async fn test_certificate_header_resolution() {
        let (cert, key) = signer();
        let config = PipelineConfig {
            rules: vec![PathRule::new(
                "/payments/*",
                &["(request-target)", "(created)", "digest", "x-request-id"],
            )],
            ..Default::default()
        };
        let pipeline = SignaturePipeline::with_clock(
            config,
            InMemoryKeyStore::new(),
            InMemoryKeyStore::new(),
            Arc::new(FixedClock::at_unix(NOW)),
        );

        // No keys anywhere: 400.
        let request = signed_request(&key, "/payments/sepa", br#"{"amount":1}"#);
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The certificate rides along: accepted.
        let mut request = signed_request(&key, "/payments/sepa", br#"{"amount":1}"#);
        request.headers_mut().insert(
            "tpp-signature-certificate",
            BASE64.encode(&cert).parse().unwrap(),
        );
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::OK);

        // A garbage certificate: 401.
        let mut request = signed_request(&key, "/payments/sepa", br#"{"amount":1}"#);
        request.headers_mut().insert(
            "tpp-signature-certificate",
            BASE64.encode(b"junk").parse().unwrap(),
        );
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Tests the body size cap.
    #[tokio::test]
    async fn test_body_cap() {
        let (cert, key) = signer();
        let config = PipelineConfig {
            rules: vec![PathRule::new("/payments/*", &["digest"])],
            max_body_size: 16,
            ..Default::default()
        };
        let pipeline = SignaturePipeline::with_clock(
            config,
            InMemoryKeyStore::new().trust_certificate(&cert).unwrap(),
            InMemoryKeyStore::new(),
            Arc::new(FixedClock::at_unix(NOW)),
        );
        let request = signed_request(&key, "/payments/sepa", &[0x41; 64]);
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    // Tests response signing: the matched response carries Signature,
    // Digest, certificate, id and created headers, and the signature
    // verifies over the canonical response input.
    #[tokio::test]
    async fn test_response_signing() {
        let (client_cert, client_key) = signer();
        let (server_cert, server_key) = signer();
        let archive = crate::pkcs12::encode(
            "pw",
            &[&server_cert],
            &server_key.to_pkcs8_der().unwrap(),
        )
        .unwrap();
        let credentials =
            InMemoryKeyStore::from_pkcs12(&archive, "pw", SignatureScheme::RsaSha256).unwrap();
        let pipeline = pipeline(&client_cert, credentials);

        let request = signed_request(&client_key, "/payments/sepa", br#"{"amount":1}"#);
        let response = pipeline.handle(request, ok_next).await;
        assert_eq!(response.status(), StatusCode::OK);

        // All signing artifacts must be present.
        let signature_value = response.headers()["signature"].to_str().unwrap();
        let digest_value = response.headers()["digest"].to_str().unwrap();
        let response_id = response.headers()["x-response-id"].to_str().unwrap();
        assert!(!response_id.is_empty());
        assert_eq!(
            response.headers()["x-response-created"].to_str().unwrap(),
            NOW.to_string()
        );

        // The advertised certificate is the signer's.
        let advertised = BASE64
            .decode(response.headers()["aspsp-signature-certificate"].as_bytes())
            .unwrap();
        assert_eq!(advertised, server_cert);

        // The digest covers the body.
        let digest = BodyDigest::parse(digest_value).unwrap();
        assert!(digest.matches(response.body()));

        // And the signature verifies over the canonical response input.
        let header = SignatureHeader::parse(signature_value).unwrap();
        assert_eq!(
            header.headers,
            ["(request-target)", "(created)", "digest", "x-request-id"]
        );
        let input = signing_string(
            &header.headers,
            response.headers(),
            Some(&RequestTarget {
                method: "POST".into(),
                path_and_query: "/payments/sepa".into(),
            }),
            header.created,
            header.expires,
        )
        .unwrap();
        server_key
            .public_key()
            .verify(
                SignatureAlgorithm::Rs256,
                input.as_bytes(),
                &header.signature,
            )
            .unwrap();
    }

    // Tests the path template matcher.
    #[test]
    fn test_path_rules() {
        let exact = PathRule::new("/accounts", &[]);
        assert!(exact.matches("/accounts"));
        assert!(exact.matches("/accounts?page=2"));
        assert!(!exact.matches("/accounts/123"));
        assert!(!exact.matches("/payments"));

        let single = PathRule::new("/accounts/*/balances", &[]);
        assert!(single.matches("/accounts/123/balances"));
        assert!(!single.matches("/accounts/123"));
        assert!(!single.matches("/accounts/123/balances/eur"));

        let suffix = PathRule::new("/payments/*", &[]);
        assert!(suffix.matches("/payments"));
        assert!(suffix.matches("/payments/sepa"));
        assert!(suffix.matches("/payments/sepa/123"));
        assert!(!suffix.matches("/accounts/payments"));
    }
}
