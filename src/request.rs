// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use crate::{
    BodyInput,
    Error,
    HeaderStore,
    Message,
    MessageParts,
    Method,
    Uri,
};

/// An outbound request: method, target URI and the shared message state.
///
/// The `Host` header is kept consistent with the URI unless explicitly
/// overridden through [`Request::with_uri`] with `preserve_host`.
#[derive(Clone, Debug)]
pub struct Request {
    parts: MessageParts,
    method: Method,
    uri: Uri,
}

impl Request {
    pub fn new(method: impl Into<Method>, uri: impl Into<Uri>) -> Self {
        Self::with_options(method, uri, HeaderStore::new(), BodyInput::Absent, "1.1")
    }

    /// Full constructor mirroring the boundary inputs: headers, a tagged
    /// body and a protocol version.
    pub fn with_options(
        method: impl Into<Method>,
        uri: impl Into<Uri>,
        headers: HeaderStore,
        body: BodyInput,
        version: &str,
    ) -> Self {
        let uri = uri.into();
        let request = Self {
            parts: MessageParts::new(version, headers, body.into_stream()),
            method: method.into(),
            uri,
        };

        if request.has_header("Host") {
            request
        } else {
            request.update_host_from_uri()
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn with_method(self, method: &str) -> Result<Self, Error> {
        let method = Method::parse(method)?;
        if method == self.method {
            return Ok(self);
        }

        let mut new = self;
        new.method = method;
        Ok(new)
    }

    /// Replaces the target URI, recomputing the `Host` header from the new
    /// URI's host and port — unless `preserve_host` is set and a non-empty
    /// `Host` header already exists, or the URI carries no host at all.
    #[must_use]
    pub fn with_uri(self, uri: Uri, preserve_host: bool) -> Self {
        if uri == self.uri {
            return self;
        }

        let mut new = self;
        new.uri = uri;

        if preserve_host && !new.header_line("Host").is_empty() {
            return new;
        }
        new.update_host_from_uri()
    }

    fn update_host_from_uri(self) -> Self {
        let authority = self.uri.authority();
        if authority.is_empty() {
            return self;
        }

        match self.parts.headers.set("Host", authority) {
            Ok(headers) => self.replace_headers(headers),
            Err(_) => self,
        }
    }
}

impl Message for Request {
    fn parts(&self) -> &MessageParts {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut MessageParts {
        &mut self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BodyStream;

    #[test]
    fn test_new_defaults() {
        let request = Request::new("GET", "/");
        assert_eq!(request.method(), &Method::Get);
        assert_eq!(request.protocol_version(), "1.1");
        assert_eq!(request.body().contents().unwrap(), "");
    }

    #[test]
    fn test_host_is_derived_from_the_uri() {
        let request = Request::new("GET", "http://example.com:8080/index.html");
        assert_eq!(request.header_line("Host"), "example.com:8080");
    }

    #[test]
    fn test_default_port_is_elided_from_host() {
        let request = Request::new("GET", "https://example.com:443/");
        assert_eq!(request.header_line("Host"), "example.com");
    }

    #[test]
    fn test_with_uri_recomputes_host() {
        let request = Request::new("GET", "http://a.example/")
            .with_uri(Uri::parse("http://b.example/"), false);
        assert_eq!(request.header_line("Host"), "b.example");
    }

    #[test]
    fn test_with_uri_preserve_host_keeps_existing_header() {
        let request = Request::new("GET", "http://a.example/")
            .with_uri(Uri::parse("http://b.example/"), true);
        assert_eq!(request.header_line("Host"), "a.example");
    }

    #[test]
    fn test_with_uri_without_host_leaves_header_alone() {
        let request = Request::new("GET", "http://a.example/")
            .with_uri(Uri::parse("/relative"), false);
        assert_eq!(request.header_line("Host"), "a.example");
    }

    #[test]
    fn test_with_protocol_version_validates_and_short_circuits() {
        let request = Request::new("GET", "/");
        assert!(request.clone().with_protocol_version("").is_err());

        let request = request.with_protocol_version("2.0").unwrap();
        assert_eq!(request.protocol_version(), "2.0");
    }

    #[test]
    fn test_with_body_same_stream_is_a_no_op() {
        let stream = BodyStream::from_text("test");
        let request = Request::new("GET", "/").with_body(stream.clone());
        let same = request.clone().with_body(stream.clone());
        assert!(same.body().ptr_eq(&request.body()));

        let different = request.with_body(BodyStream::from_text("other"));
        assert!(!different.body().ptr_eq(&stream));
    }

    #[test]
    fn test_header_mutation_is_copy_on_write() {
        let request = Request::new("GET", "/");
        let with_header = request.clone().with_header("Content-Type", "application/json").unwrap();

        assert!(!request.has_header("Content-Type"));
        assert_eq!(with_header.header("Content-Type"), ["application/json"]);
    }

    #[test]
    fn test_with_method_no_op_keeps_value() {
        let request = Request::new("GET", "/").with_method("GET").unwrap();
        assert_eq!(request.method(), &Method::Get);
        assert!(Request::new("GET", "/").with_method("").is_err());
    }
}
