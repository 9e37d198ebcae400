// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Content-type driven body parsing: a registry from normalized media type
//! to parsing function, with structured-syntax suffix fallback
//! (`application/vnd.api+json` retries as `application/json`).

use hashbrown::HashMap;
use quick_xml::events::Event;
use serde_json::{Map, Value};

use crate::{form, Error};

/// A body parser: a pure function of the body text and the registry
/// configuration to a parsed value. Returning `None` is the preferred way
/// to report recoverable malformed input; an `Err` is reserved for distinct
/// failures such as an oversized payload.
pub type MediaTypeParser = fn(&str, &ParserConfig) -> Result<Option<Value>, Error>;

/// Configuration passed to every parser, instead of state captured in
/// closures.
#[derive(Copy, Clone, Debug)]
pub struct ParserConfig {
    /// JSON payloads beyond this many bytes are rejected with
    /// [`Error::PayloadTooLarge`] before decoding is attempted.
    pub json_size_limit: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { json_size_limit: 1024 * 1024 }
    }
}

/// Maps a normalized media type to its parsing function.
#[derive(Clone, Debug)]
pub struct MediaTypeParserRegistry {
    parsers: HashMap<String, MediaTypeParser>,
    config: ParserConfig,
}

impl Default for MediaTypeParserRegistry {
    fn default() -> Self {
        Self::with_config(ParserConfig::default())
    }
}

impl MediaTypeParserRegistry {
    /// The default registry: JSON, XML (both `application/xml` and
    /// `text/xml`) and urlencoded forms.
    #[must_use]
    pub fn with_config(config: ParserConfig) -> Self {
        let mut registry = Self { parsers: HashMap::new(), config };
        registry.register("application/json", parse_json);
        registry.register("application/xml", parse_xml);
        registry.register("text/xml", parse_xml);
        registry.register("application/x-www-form-urlencoded", parse_urlencoded);
        registry
    }

    /// Registers a parser under an exact media-type key. A later
    /// registration for the same key wins and is consulted on the next
    /// parse.
    pub fn register(&mut self, media_type: &str, parser: MediaTypeParser) {
        self.parsers.insert(media_type.to_ascii_lowercase(), parser);
    }

    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Looks up a parser: exact media type first, then the
    /// structured-syntax suffix rewritten as `application/<suffix>`.
    #[must_use]
    pub fn resolve(&self, media_type: &str) -> Option<MediaTypeParser> {
        if let Some(parser) = self.parsers.get(media_type) {
            return Some(*parser);
        }

        let suffix = suffix_fallback(media_type)?;
        self.parsers.get(&suffix).copied()
    }

    /// Runs a resolved parser and enforces the contract that the result is
    /// a map, a list, or absent.
    pub fn run(&self, parser: MediaTypeParser, body: &str) -> Result<Option<Value>, Error> {
        match parser(body, &self.config)? {
            Some(value) if !value.is_object() && !value.is_array() => Err(Error::UnexpectedParserResult),
            result => Ok(result),
        }
    }
}

/// Normalizes a `Content-Type` header value to its media type: everything
/// up to the first `;` or `,`, trimmed and lower-cased. Empty input yields
/// `None`.
#[must_use]
pub fn normalize_media_type(content_type: &str) -> Option<String> {
    let media_type = content_type
        .split([';', ','])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if media_type.is_empty() {
        None
    } else {
        Some(media_type)
    }
}

fn suffix_fallback(media_type: &str) -> Option<String> {
    let (_, suffix) = media_type.rsplit_once('+')?;
    Some(format!("application/{suffix}"))
}

/// The default JSON parser: size-capped, absent for blank or malformed
/// input, absent for scalar documents.
fn parse_json(input: &str, config: &ParserConfig) -> Result<Option<Value>, Error> {
    if input.len() > config.json_size_limit {
        return Err(Error::PayloadTooLarge { size: input.len(), limit: config.json_size_limit });
    }

    if input.trim().is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(input) {
        Ok(value) if value.is_object() || value.is_array() => Ok(Some(value)),
        _ => Ok(None),
    }
}

/// Best-effort XML parsing into a map tree: elements become objects,
/// attributes are prefixed with `@`, repeated children collect into lists,
/// text-only elements become strings. Malformed input is absent, never an
/// error.
fn parse_xml(input: &str, _config: &ParserConfig) -> Result<Option<Value>, Error> {
    Ok(xml_to_value(input))
}

fn parse_urlencoded(input: &str, _config: &ParserConfig) -> Result<Option<Value>, Error> {
    Ok(Some(form::parse_to_value(input)))
}

fn xml_to_value(input: &str) -> Option<Value> {
    let mut reader = quick_xml::Reader::from_str(input);
    let mut stack: Vec<(String, Map<String, Value>, String)> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event() {
            Err(_) => return None,
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                if root.is_some() {
                    return None;
                }
                stack.push(element_frame(&start)?);
            }
            Ok(Event::Empty(start)) => {
                if root.is_some() {
                    return None;
                }
                let (name, attributes, _) = element_frame(&start)?;
                let value = finish_element(attributes, String::new());
                attach(&mut stack, &mut root, name, value);
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().ok()?;
                if let Some((_, _, buffer)) = stack.last_mut() {
                    buffer.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some((_, _, buffer)) = stack.last_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(_)) => {
                let (name, attributes, text) = stack.pop()?;
                let value = finish_element(attributes, text);
                attach(&mut stack, &mut root, name, value);
            }
            Ok(_) => {}
        }
    }

    if !stack.is_empty() {
        return None;
    }

    // A scalar root still has to satisfy the map-or-list parser contract.
    match root? {
        Value::String(text) => {
            let mut map = Map::new();
            map.insert("$text".to_string(), Value::String(text));
            Some(Value::Object(map))
        }
        value => Some(value),
    }
}

fn element_frame(start: &quick_xml::events::BytesStart<'_>) -> Option<(String, Map<String, Value>, String)> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Map::new();
    for attribute in start.attributes() {
        let attribute = attribute.ok()?;
        attributes.insert(
            format!("@{}", String::from_utf8_lossy(attribute.key.as_ref())),
            Value::String(String::from_utf8_lossy(&attribute.value).into_owned()),
        );
    }
    Some((name, attributes, String::new()))
}

fn finish_element(mut attributes: Map<String, Value>, text: String) -> Value {
    let text = text.trim().to_string();
    if attributes.is_empty() {
        return Value::String(text);
    }
    if !text.is_empty() {
        attributes.insert("$text".to_string(), Value::String(text));
    }
    Value::Object(attributes)
}

fn attach(
    stack: &mut [(String, Map<String, Value>, String)],
    root: &mut Option<Value>,
    name: String,
    value: Value,
) {
    match stack.last_mut() {
        Some((_, parent, _)) => match parent.remove(&name) {
            Some(Value::Array(mut existing)) => {
                existing.push(value);
                parent.insert(name, Value::Array(existing));
            }
            Some(existing) => {
                parent.insert(name, Value::Array(vec![existing, value]));
            }
            None => {
                parent.insert(name, value);
            }
        },
        None => *root = Some(value),
    }
}
