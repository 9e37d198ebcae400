// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use hashbrown::HashMap;
use serde_json::Value;

use crate::{
    normalize_uploads,
    BodyInput,
    DescriptorTree,
    Error,
    HeaderStore,
    MediaTypeParserRegistry,
    ParserConfig,
    ServerRequest,
    Uri,
    uri::split_host_port,
};

/// A snapshot of the gateway boundary a [`ServerRequest`] is reconstructed
/// from: the server variable table plus the optional overrides a front
/// controller may inject.
///
/// Server variables keep their delivery order, which in turn fixes the
/// order of derived headers.
#[derive(Debug, Default)]
pub struct Environment {
    pub server: Vec<(String, String)>,
    /// Explicit headers; when set, no headers are derived from the server
    /// variables.
    pub headers: Option<HeaderStore>,
    /// Explicit cookie pairs; when set, the `Cookie` header is not parsed.
    pub cookies: Option<HashMap<String, String>>,
    /// Explicit decoded query pairs; when set, the URI query string is not
    /// re-parsed.
    pub query: Option<Vec<(String, String)>>,
    pub files: Vec<(String, DescriptorTree)>,
    /// A pre-parsed body, e.g. an already-decoded form. Takes precedence
    /// over media-type negotiation.
    pub post: Option<Value>,
    pub body: BodyInput,
}

impl Environment {
    #[must_use]
    pub fn with_server(server: Vec<(String, String)>) -> Self {
        Self { server, ..Self::default() }
    }

    /// Captures the variables of the current process, the way a CGI or
    /// FastCGI child receives them.
    #[must_use]
    pub fn from_process() -> Self {
        Self::with_server(std::env::vars().collect())
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.server
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Reconstructs a [`ServerRequest`] from an [`Environment`].
///
/// The builder owns the trust decisions: by default `X-Forwarded-Proto`
/// outranks the gateway's own scheme variables, which is only safe behind
/// a proxy that strips client-supplied forwarding headers.
#[derive(Clone, Debug)]
pub struct EnvironmentRequestBuilder {
    trust_forwarded_headers: bool,
    parser_config: ParserConfig,
}

impl Default for EnvironmentRequestBuilder {
    fn default() -> Self {
        Self {
            trust_forwarded_headers: true,
            parser_config: ParserConfig::default(),
        }
    }
}

impl EnvironmentRequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    #[must_use]
    pub fn parser_config(mut self, config: ParserConfig) -> Self {
        self.parser_config = config;
        self
    }

    pub fn build(&self, environment: Environment) -> Result<ServerRequest, Error> {
        let method = environment
            .get("REQUEST_METHOD")
            .ok_or(Error::MissingMethod)?
            .to_string();
        let version = protocol_version(environment.get("SERVER_PROTOCOL"));

        let headers = match &environment.headers {
            Some(headers) => headers.clone(),
            None => headers_from_server(&environment)?,
        };
        let uri = self.uri_from_server(&environment, &headers);

        let cookies = match environment.cookies {
            Some(ref cookies) => cookies.clone(),
            None => parse_cookie_header(&headers.line("Cookie")),
        };
        let files = normalize_uploads(environment.files);
        let server_params: HashMap<String, String> = environment.server.into_iter().collect();

        let mut request = ServerRequest::with_options(
            method,
            uri,
            headers,
            environment.body,
            &version,
            server_params,
            MediaTypeParserRegistry::with_config(self.parser_config),
        )
        .with_cookie_params(cookies)
        .with_uploaded_files(files);

        if let Some(query) = environment.query {
            request = request.with_query_params(query);
        }
        if let Some(post) = environment.post {
            request = request.with_parsed_body(Some(post));
        }
        Ok(request)
    }

    fn uri_from_server(&self, environment: &Environment, headers: &HeaderStore) -> Uri {
        let mut uri = Uri::new().with_scheme(&self.scheme(environment, headers));

        let host_header = headers.line("Host");
        if !host_header.is_empty() {
            let (host, port) = split_host_port(&host_header);
            uri = uri.with_host(host).with_port(port);
        } else if let Some(name) = environment.get("SERVER_NAME") {
            uri = uri.with_host(name);
        } else if let Some(addr) = environment.get("SERVER_ADDR") {
            uri = uri.with_host(addr);
        }

        if uri.port().is_none() {
            if let Some(port) = environment.get("SERVER_PORT").and_then(|port| port.parse().ok()) {
                uri = uri.with_port(Some(port));
            }
        }

        let mut query_from_target = None;
        if let Some(target) = environment.get("REQUEST_URI") {
            match target.split_once('?') {
                Some((path, query)) => {
                    uri = uri.with_path(path);
                    query_from_target = Some(query.to_string());
                }
                None => uri = uri.with_path(target),
            }
        }

        if let Some(query) = environment.get("QUERY_STRING") {
            uri.with_query(query)
        } else if let Some(query) = &query_from_target {
            uri.with_query(query)
        } else {
            uri
        }
    }

    fn scheme(&self, environment: &Environment, headers: &HeaderStore) -> String {
        if self.trust_forwarded_headers {
            if let Some(forwarded) = headers.get("X-Forwarded-Proto").first() {
                return forwarded.to_ascii_lowercase();
            }
        }
        if let Some(scheme) = environment.get("REQUEST_SCHEME") {
            return scheme.to_ascii_lowercase();
        }
        match environment.get("HTTPS") {
            Some(value) if !value.is_empty() && !value.eq_ignore_ascii_case("off") => {
                "https".to_string()
            }
            _ => "http".to_string(),
        }
    }
}

/// `HTTP/1.1` becomes `1.1`; an unparseable or absent protocol falls back
/// to `1.1`.
fn protocol_version(protocol: Option<&str>) -> String {
    protocol
        .and_then(|protocol| protocol.strip_prefix("HTTP/"))
        .filter(|version| !version.is_empty())
        .unwrap_or("1.1")
        .to_string()
}

/// Derives the request headers from the server variable table.
///
/// `HTTP_FOO_BAR` becomes `Foo-Bar`; `CONTENT_TYPE`, `CONTENT_LENGTH` and
/// `CONTENT_MD5` map to their header counterparts. A `REDIRECT_HTTP_*`
/// variable only counts when the variable it shadows is absent.
fn headers_from_server(environment: &Environment) -> Result<HeaderStore, Error> {
    let mut headers = HeaderStore::new();

    for (key, value) in &environment.server {
        let mut key = key.as_str();
        if let Some(stripped) = key.strip_prefix("REDIRECT_") {
            if environment.has(stripped) {
                continue;
            }
            key = stripped;
        }

        let name = if let Some(raw) = key.strip_prefix("HTTP_") {
            header_name_from_variable(raw)
        } else if key.starts_with("CONTENT_") {
            header_name_from_variable(key)
        } else {
            continue;
        };

        headers = headers.add(&name, value.as_str())?;
    }

    Ok(headers)
}

/// `X_FORWARDED_PROTO` becomes `X-Forwarded-Proto`.
fn header_name_from_variable(variable: &str) -> String {
    variable
        .split('_')
        .map(|part| {
            let mut part = part.to_ascii_lowercase();
            if let Some(first) = part.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            part
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Splits a `Cookie` header into its pairs. Malformed fragments without a
/// `=` are skipped; the first occurrence of a name wins.
fn parse_cookie_header(line: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for fragment in line.split(';') {
        let Some((name, value)) = fragment.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        cookies
            .entry(name.to_string())
            .or_insert_with(|| value.trim().trim_matches('"').to_string());
    }
    cookies
}
