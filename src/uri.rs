// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! A deliberately small URI value: exactly the components the environment
//! reconstruction needs (scheme, host, port, path, query). This is not a
//! full RFC 3986 grammar.

use std::fmt;

/// The target of a request.
///
/// An absent component is the empty string (or `None` for the port), which
/// is also how an origin-form target (`/path?query`) is represented: empty
/// scheme and host.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uri {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
}

impl Uri {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Best-effort parse of either an absolute URI
    /// (`scheme://host[:port]/path[?query]`) or an origin-form target
    /// (`/path[?query]`). Anything else is treated as a bare path.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut uri = Uri::new();

        let rest = match input.split_once("://") {
            Some((scheme, rest)) => {
                uri.scheme = scheme.to_ascii_lowercase();
                rest
            }
            None => input,
        };

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, query),
            None => (rest, ""),
        };
        uri.query = query.to_string();

        if uri.scheme.is_empty() {
            uri.path = rest.to_string();
            return uri;
        }

        let (authority, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, ""),
        };
        let (host, port) = split_host_port(authority);
        uri.host = host.to_ascii_lowercase();
        uri.port = port;
        uri.path = path.to_string();
        uri
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_ascii_lowercase();
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_ascii_lowercase();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    /// Renders `host[:port]`, eliding the port when it is the default for
    /// the scheme. Empty when the URI carries no host.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.host.is_empty() {
            return String::new();
        }

        match self.port {
            Some(port) if !self.is_default_port(port) => format!("{}:{}", self.host, port),
            _ => self.host.clone(),
        }
    }

    fn is_default_port(&self, port: u16) -> bool {
        matches!(
            (self.scheme.as_str(), port),
            ("http", 80) | ("https", 443)
        )
    }
}

/// Splits `host[:port]`, leaving IPv6 bracket notation (`[::1]:8080`)
/// intact. An unparseable port segment is stripped and yields no port.
#[must_use]
pub fn split_host_port(authority: &str) -> (&str, Option<u16>) {
    if authority.starts_with('[') {
        if let Some(end) = authority.find(']') {
            let host = &authority[..=end];
            let port = authority[end + 1..]
                .strip_prefix(':')
                .and_then(|port| port.parse().ok());
            return (host, port);
        }
        return (authority, None);
    }

    match authority.rsplit_once(':') {
        // The host never keeps an unparseable port segment.
        Some((host, port)) => (host, port.parse().ok()),
        None => (authority, None),
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}://", self.scheme)?;
        }
        f.write_str(&self.authority())?;
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Uri::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/", "", "", None, "/", "")]
    #[case("/test.html?t=t", "", "", None, "/test.html", "t=t")]
    #[case("http://example.com", "http", "example.com", None, "", "")]
    #[case("http://example.com:8080/index.html", "http", "example.com", Some(8080), "/index.html", "")]
    #[case("https://EXAMPLE.com/a?b=c", "https", "example.com", None, "/a", "b=c")]
    fn test_parse(
        #[case] input: &str,
        #[case] scheme: &str,
        #[case] host: &str,
        #[case] port: Option<u16>,
        #[case] path: &str,
        #[case] query: &str,
    ) {
        let uri = Uri::parse(input);
        assert_eq!(uri.scheme(), scheme);
        assert_eq!(uri.host(), host);
        assert_eq!(uri.port(), port);
        assert_eq!(uri.path(), path);
        assert_eq!(uri.query(), query);
    }

    #[rstest]
    #[case("example.com", "example.com", None)]
    #[case("example.com:8080", "example.com", Some(8080))]
    #[case("example.com:bogus", "example.com", None)]
    #[case("example.com:99999", "example.com", None)]
    #[case("[::1]", "[::1]", None)]
    #[case("[::1]:9000", "[::1]", Some(9000))]
    fn test_split_host_port(#[case] input: &str, #[case] host: &str, #[case] port: Option<u16>) {
        assert_eq!(split_host_port(input), (host, port));
    }

    #[test]
    fn test_authority_elides_default_port() {
        let uri = Uri::new().with_scheme("https").with_host("example.com").with_port(Some(443));
        assert_eq!(uri.authority(), "example.com");

        let uri = uri.with_port(Some(8443));
        assert_eq!(uri.authority(), "example.com:8443");
    }

    #[test]
    fn test_display_round_trip() {
        let uri = Uri::new()
            .with_scheme("http")
            .with_host("example.com")
            .with_port(Some(8080))
            .with_path("/path")
            .with_query("foo=bar");
        assert_eq!(uri.to_string(), "http://example.com:8080/path?foo=bar");
    }
}
