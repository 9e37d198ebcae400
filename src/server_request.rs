// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use hashbrown::HashMap;
use serde_json::Value;

use std::cell::RefCell;
use std::rc::Rc;

use crate::{
    form,
    BodyInput,
    Error,
    HeaderStore,
    MediaTypeParserRegistry,
    Message,
    MessageParts,
    Method,
    Uri,
    UploadedFileNode,
    normalize_media_type,
};

/// An inbound request as seen by the application: the base request plus
/// the boundary state the gateway delivered alongside it.
///
/// Server params are an immutable snapshot of the gateway variables the
/// request was built from. Query params keep their order and duplicate
/// keys. The parsed body is computed on demand from the negotiated media
/// type and memoized per instance.
#[derive(Clone, Debug)]
pub struct ServerRequest {
    parts: MessageParts,
    method: Method,
    uri: Uri,
    server_params: Rc<HashMap<String, String>>,
    cookie_params: HashMap<String, String>,
    query_params: Vec<(String, String)>,
    uploaded_files: Rc<Vec<(String, UploadedFileNode)>>,
    attributes: HashMap<String, Value>,
    parsed_body: RefCell<Option<Option<Value>>>,
    registry: Rc<MediaTypeParserRegistry>,
}

impl ServerRequest {
    pub fn new(method: impl Into<Method>, uri: impl Into<Uri>) -> Self {
        Self::with_options(
            method,
            uri,
            HeaderStore::new(),
            BodyInput::Absent,
            "1.1",
            HashMap::new(),
            MediaTypeParserRegistry::default(),
        )
    }

    /// Full constructor mirroring the boundary inputs. Query params are
    /// taken from the URI query string; the `Host` header is derived from
    /// the URI authority unless one was already provided.
    pub fn with_options(
        method: impl Into<Method>,
        uri: impl Into<Uri>,
        headers: HeaderStore,
        body: BodyInput,
        version: &str,
        server_params: HashMap<String, String>,
        registry: MediaTypeParserRegistry,
    ) -> Self {
        let uri = uri.into();
        let query_params = form::parse_pairs(uri.query());
        let request = Self {
            parts: MessageParts::new(version, headers, body.into_stream()),
            method: method.into(),
            uri,
            server_params: Rc::new(server_params),
            cookie_params: HashMap::new(),
            query_params,
            uploaded_files: Rc::new(Vec::new()),
            attributes: HashMap::new(),
            parsed_body: RefCell::new(None),
            registry: Rc::new(registry),
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

    /// Swaps the target URI. By default the `Host` header follows the new
    /// URI's authority; with `preserve_host` an already present `Host`
    /// header is kept.
    #[must_use]
    pub fn with_uri(self, uri: Uri, preserve_host: bool) -> Self {
        if uri == self.uri {
            return self;
        }

        let keep_host = preserve_host && !self.header("Host").is_empty();
        let mut new = self;
        new.uri = uri;
        if keep_host {
            new
        } else {
            new.update_host_from_uri()
        }
    }

    fn update_host_from_uri(self) -> Self {
        let authority = self.uri.authority();
        if authority.is_empty() {
            return self;
        }

        match self.parts.headers.set("Host", authority.as_str()) {
            Ok(headers) => self.replace_headers(headers),
            Err(_) => self,
        }
    }

    #[must_use]
    pub fn server_params(&self) -> &HashMap<String, String> {
        &self.server_params
    }

    #[must_use]
    pub fn cookie_params(&self) -> &HashMap<String, String> {
        &self.cookie_params
    }

    #[must_use]
    pub fn with_cookie_params(self, cookies: HashMap<String, String>) -> Self {
        let mut new = self;
        new.cookie_params = cookies;
        new
    }

    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Replaces the decoded query pairs. The request URI is left alone, so
    /// the two can intentionally disagree afterwards.
    #[must_use]
    pub fn with_query_params(self, params: Vec<(String, String)>) -> Self {
        let mut new = self;
        new.query_params = params;
        new
    }

    #[must_use]
    pub fn uploaded_files(&self) -> &[(String, UploadedFileNode)] {
        &self.uploaded_files
    }

    #[must_use]
    pub fn with_uploaded_files(self, files: Vec<(String, UploadedFileNode)>) -> Self {
        let mut new = self;
        new.uploaded_files = Rc::new(files);
        new
    }

    #[must_use]
    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn with_attribute(self, name: &str, value: impl Into<Value>) -> Self {
        let mut new = self;
        new.attributes.insert(name.to_string(), value.into());
        new
    }

    #[must_use]
    pub fn without_attribute(self, name: &str) -> Self {
        if !self.attributes.contains_key(name) {
            return self;
        }

        let mut new = self;
        new.attributes.remove(name);
        new
    }

    /// The raw `Content-Type` header line, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        let line = self.header_line("Content-Type");
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }

    /// The lowercased media type with parameters stripped, e.g.
    /// `application/json` for `Application/JSON; charset=utf-8`.
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        normalize_media_type(&self.header_line("Content-Type"))
    }

    #[must_use]
    pub fn parser_registry(&self) -> &MediaTypeParserRegistry {
        &self.registry
    }

    /// Pins the parsed body, bypassing the media-type parsers.
    #[must_use]
    pub fn with_parsed_body(self, body: Option<Value>) -> Self {
        let new = self;
        *new.parsed_body.borrow_mut() = Some(body);
        new
    }

    /// The structured interpretation of the body, negotiated through the
    /// media-type parser registry.
    ///
    /// The first call reads the body and memoizes the outcome; later calls
    /// return the memo without touching the stream. When no parser claims
    /// the media type, the body is not read at all. Parser failures
    /// propagate and are not memoized, so a retry re-parses.
    pub fn parsed_body(&self) -> Result<Option<Value>, Error> {
        if let Some(cached) = &*self.parsed_body.borrow() {
            return Ok(cached.clone());
        }

        let parser = self
            .media_type()
            .and_then(|media_type| self.registry.resolve(&media_type));
        let Some(parser) = parser else {
            *self.parsed_body.borrow_mut() = Some(None);
            return Ok(None);
        };

        let contents = self.body().contents()?;
        let parsed = self.registry.run(parser, &contents)?;
        *self.parsed_body.borrow_mut() = Some(parsed.clone());
        Ok(parsed)
    }
}

impl Message for ServerRequest {
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
    use serde_json::json;

    use crate::ParserConfig;

    fn request_with_body(content_type: &str, body: &str) -> ServerRequest {
        let mut headers = HeaderStore::new();
        headers = headers.set("Content-Type", content_type).unwrap();
        ServerRequest::with_options(
            "POST",
            "http://example.com/submit",
            headers,
            body.into(),
            "1.1",
            HashMap::new(),
            MediaTypeParserRegistry::default(),
        )
    }

    #[test]
    fn test_query_params_come_from_the_uri() {
        let request = ServerRequest::new("GET", "http://example.com/search?q=rust&q=http&page=2");
        assert_eq!(
            request.query_params(),
            &[
                ("q".to_string(), "rust".to_string()),
                ("q".to_string(), "http".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_host_header_follows_the_uri() {
        let request = ServerRequest::new("GET", "http://example.com:8080/");
        assert_eq!(request.header_line("Host"), "example.com:8080");
    }

    #[test]
    fn test_with_query_params_leaves_the_uri_alone() {
        let request = ServerRequest::new("GET", "http://example.com/?a=1")
            .with_query_params(vec![("b".to_string(), "2".to_string())]);
        assert_eq!(request.uri().query(), "a=1");
        assert_eq!(request.query_params(), &[("b".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_attributes() {
        let request = ServerRequest::new("GET", "/")
            .with_attribute("route", "home")
            .with_attribute("user_id", 42);

        assert_eq!(request.attribute("route"), Some(&json!("home")));
        assert_eq!(request.attribute("user_id"), Some(&json!(42)));

        let request = request.without_attribute("route");
        assert_eq!(request.attribute("route"), None);

        // Removing an absent attribute is a no-op.
        let request = request.without_attribute("missing");
        assert_eq!(request.attribute("user_id"), Some(&json!(42)));
    }

    #[test]
    fn test_media_type_is_normalized() {
        let request = request_with_body("Application/JSON; charset=utf-8", "{}");
        assert_eq!(request.content_type().as_deref(), Some("Application/JSON; charset=utf-8"));
        assert_eq!(request.media_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn test_parsed_body_negotiates_json() {
        let request = request_with_body("application/json", r#"{"name": "messaggero"}"#);
        assert_eq!(
            request.parsed_body().unwrap(),
            Some(json!({"name": "messaggero"}))
        );
    }

    #[test]
    fn test_parsed_body_suffix_fallback() {
        let request = request_with_body("application/vnd.api+json", r#"{"ok": true}"#);
        assert_eq!(request.parsed_body().unwrap(), Some(json!({"ok": true})));
    }

    #[test]
    fn test_parsed_body_without_parser_is_none() {
        let request = request_with_body("text/plain", "just text");
        assert_eq!(request.parsed_body().unwrap(), None);
    }

    #[test]
    fn test_parsed_body_is_memoized() {
        let request = request_with_body("application/json", r#"{"n": 1}"#);
        assert_eq!(request.parsed_body().unwrap(), Some(json!({"n": 1})));

        // The first call consumed the non-rewound portion of the stream;
        // the memo answers without reading again.
        assert_eq!(request.parsed_body().unwrap(), Some(json!({"n": 1})));
    }

    #[test]
    fn test_with_parsed_body_overrides_negotiation() {
        let request = request_with_body("application/json", r#"{"ignored": true}"#)
            .with_parsed_body(Some(json!({"pinned": true})));
        assert_eq!(request.parsed_body().unwrap(), Some(json!({"pinned": true})));
    }

    #[test]
    fn test_malformed_json_is_absent_and_memoized() {
        let request = request_with_body("application/json", "{broken");
        assert_eq!(request.parsed_body().unwrap(), None);
        assert_eq!(*request.parsed_body.borrow(), Some(None));
    }

    #[test]
    fn test_parse_error_is_not_memoized() {
        let headers = HeaderStore::new().set("Content-Type", "application/json").unwrap();
        let registry = MediaTypeParserRegistry::with_config(ParserConfig { json_size_limit: 4 });
        let request = ServerRequest::with_options(
            "POST",
            "http://example.com/submit",
            headers,
            r#"{"way": "too large"}"#.into(),
            "1.1",
            HashMap::new(),
            registry,
        );

        assert!(matches!(request.parsed_body(), Err(Error::PayloadTooLarge { .. })));
        assert!(request.parsed_body.borrow().is_none());
    }
}
