// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Query-string and urlencoded-form decoding.

use serde_json::{Map, Value};

/// Decodes one urlencoded component: `+` means space, percent sequences are
/// decoded bytewise, invalid UTF-8 is replaced.
#[must_use]
fn decode_component(component: &str) -> String {
    let plus_decoded = component.replace('+', " ");
    let bytes = urlencoding::decode_binary(plus_decoded.as_bytes()).into_owned();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Splits a query string into decoded (name, value) pairs, preserving order
/// and duplicate names. A segment without `=` becomes a pair with an empty
/// value.
#[must_use]
pub fn parse_pairs(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => (decode_component(name), decode_component(value)),
            None => (decode_component(segment), String::new()),
        })
        .collect()
}

/// Decodes an urlencoded form body into a map value, later keys winning
/// over earlier duplicates.
#[must_use]
pub fn parse_to_value(input: &str) -> Value {
    let mut map = Map::new();
    for (name, value) in parse_pairs(input) {
        map.insert(name, Value::String(value));
    }
    Value::Object(map)
}
