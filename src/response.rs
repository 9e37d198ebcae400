// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use serde_json::Value;

use crate::{
    status,
    BodyInput,
    Error,
    HeaderStore,
    Message,
    MessageParts,
};

const REDIRECT_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// A JSON payload for [`Response::json`]: either a pre-formed JSON string
/// (validated, kept verbatim) or a structured value to be serialized with
/// HTML-safe escaping.
#[derive(Clone, Debug)]
pub enum JsonPayload {
    Raw(String),
    Structured(Value),
}

impl From<&str> for JsonPayload {
    fn from(value: &str) -> Self {
        JsonPayload::Raw(value.to_string())
    }
}

impl From<String> for JsonPayload {
    fn from(value: String) -> Self {
        JsonPayload::Raw(value)
    }
}

impl From<Value> for JsonPayload {
    fn from(value: Value) -> Self {
        JsonPayload::Structured(value)
    }
}

/// An outbound response: status code, reason phrase and the shared message
/// state.
#[derive(Clone, Debug)]
pub struct Response {
    parts: MessageParts,
    status: u16,
    reason: String,
}

impl Response {
    /// A response with the given status and the standard reason phrase when
    /// the code is a known one. The code is taken as-is here; range
    /// enforcement happens on mutation, not on construction from trusted
    /// input.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self::with_options(status, HeaderStore::new(), BodyInput::Absent, "1.1", None)
    }

    /// Full constructor. `reason: None` defaults to the standard phrase
    /// table; an explicit reason (including the empty string) is kept
    /// verbatim.
    #[must_use]
    pub fn with_options(
        status: u16,
        headers: HeaderStore,
        body: BodyInput,
        version: &str,
        reason: Option<&str>,
    ) -> Self {
        let reason = match reason {
            Some(reason) => reason.to_string(),
            None => status::reason_phrase(status).unwrap_or_default().to_string(),
        };
        Self {
            parts: MessageParts::new(version, headers, body.into_stream()),
            status,
            reason,
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    /// Replaces the status code, enforcing the 100..=599 range. An empty
    /// reason is substituted from the phrase table when the code is a known
    /// one; otherwise the supplied reason is kept verbatim.
    pub fn with_status(self, code: u16, reason: &str) -> Result<Self, Error> {
        if !(100..=599).contains(&code) {
            return Err(Error::InvalidStatusCode(code));
        }

        let reason = if reason.is_empty() {
            status::reason_phrase(code).unwrap_or(reason)
        } else {
            reason
        };

        let mut new = self;
        new.status = code;
        new.reason = reason.to_string();
        Ok(new)
    }
}

//
// Factory shortcuts over the base constructor.
//
impl Response {
    /// 204 No Content.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(204)
    }

    /// A `200 OK` JSON response. A raw string payload is validated and kept
    /// verbatim; a structured payload is serialized with `<`, `>`, `&` and
    /// quotes escaped so the output is safe to embed in HTML.
    pub fn json(payload: impl Into<JsonPayload>) -> Result<Self, Error> {
        Self::json_with(payload, 200, false)
    }

    /// [`Response::json`] with an explicit status and optional
    /// pretty-printing.
    pub fn json_with(payload: impl Into<JsonPayload>, status: u16, pretty: bool) -> Result<Self, Error> {
        let body = match payload.into() {
            JsonPayload::Raw(raw) => {
                serde_json::from_str::<Value>(&raw).map_err(|_| Error::MalformedJson)?;
                raw
            }
            JsonPayload::Structured(value) => {
                let serialized = if pretty {
                    serde_json::to_string_pretty(&value)
                } else {
                    serde_json::to_string(&value)
                };
                escape_json_for_html(&serialized.map_err(|_| Error::MalformedJson)?)
            }
        };

        let headers = HeaderStore::new().set("Content-Type", "application/json")?;
        Ok(Self::with_options(status, headers, BodyInput::Text(body), "1.1", None))
    }

    /// 401 with a plain-text body.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_options(401, HeaderStore::new(), BodyInput::Text(message.into()), "1.1", None)
    }

    /// 503 with a plain-text body.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_options(503, HeaderStore::new(), BodyInput::Text(message.into()), "1.1", None)
    }

    /// 429 with a plain-text body.
    #[must_use]
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::with_options(429, HeaderStore::new(), BodyInput::Text(message.into()), "1.1", None)
    }

    pub fn html(data: impl Into<String>, status: u16) -> Result<Self, Error> {
        let headers = HeaderStore::new().set("Content-Type", "text/html")?;
        Ok(Self::with_options(status, headers, BodyInput::Text(data.into()), "1.1", None))
    }

    /// A redirect carrying both a `Location` header with the raw URL and a
    /// minimal auto-refresh HTML body with the URL escaped against
    /// injection. The status must be one of 301, 302, 303, 307, 308.
    pub fn redirect(url: &str, status: u16) -> Result<Self, Error> {
        if !REDIRECT_CODES.contains(&status) {
            return Err(Error::InvalidRedirectStatus(status));
        }

        let safe_url = escape_html(url);
        let body = format!(
            "<!DOCTYPE html>\n\
             <html>\n\
             \x20   <head>\n\
             \x20       <meta charset=\"UTF-8\" />\n\
             \x20       <meta http-equiv=\"refresh\" content=\"0;url='{safe_url}'\" />\n\
             \x20       <title>Redirecting to {safe_url}</title>\n\
             \x20   </head>\n\
             \x20   <body>\n\
             \x20       Redirecting to <a href=\"{safe_url}\">{safe_url}</a>.\n\
             \x20   </body>\n\
             </html>"
        );

        let headers = HeaderStore::new().set("Location", url)?;
        Ok(Self::with_options(status, headers, BodyInput::Text(body), "1.1", None))
    }
}

impl Message for Response {
    fn parts(&self) -> &MessageParts {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut MessageParts {
        &mut self.parts
    }
}

/// HTML-escapes `&`, `<`, `>` and both quote characters.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for character in input.chars() {
        match character {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(character),
        }
    }
    out
}

/// Rewrites serialized JSON so `<`, `>`, `&` and quotes appear as `\u00XX`
/// escapes. The bare characters can only occur inside string literals, where
/// a quote is already `\"`, so the rewrite never touches structure.
fn escape_json_for_html(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut characters = json.chars();
    while let Some(character) = characters.next() {
        match character {
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            '\\' => match characters.next() {
                Some('"') => out.push_str("\\u0022"),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            _ => out.push(character),
        }
    }
    out
}
