// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use hashbrown::HashMap;

use crate::{syntax, Error};

/// One or more header values, accepted anywhere a header is set. The
/// `From` impls make call sites read naturally for a single string, a list,
/// or a number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderValues(Vec<String>);

impl HeaderValues {
    fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for HeaderValues {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<usize> for HeaderValues {
    fn from(value: usize) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<Vec<&str>> for HeaderValues {
    fn from(values: Vec<&str>) -> Self {
        Self(values.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for HeaderValues {
    fn from(values: &[&str]) -> Self {
        Self(values.iter().map(|value| value.to_string()).collect())
    }
}

/// A case-insensitive, ordered, multi-value header collection.
///
/// Entries keep the case the name was last set with, while lookups go
/// through a lowercase index so `Content-Type`, `content-type` and
/// `CONTENT-TYPE` are the same header. Every mutation validates first and
/// returns a new store; the receiver is never touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderStore {
    /// (original-case name, ordered values), in insertion order.
    entries: Vec<(String, Vec<String>)>,
    /// lowercase name -> position in `entries`.
    index: HashMap<String, usize>,
}

impl HeaderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any case-insensitive match with the given values. The new
    /// entry is keyed by `name` as spelled here; values are trimmed of
    /// leading and trailing SP/HTAB.
    pub fn set(&self, name: &str, values: impl Into<HeaderValues>) -> Result<Self, Error> {
        let values = validate(name, values.into())?;

        let mut new = self.clone();
        match new.index.get(&name.to_ascii_lowercase()) {
            Some(&position) => new.entries[position] = (name.to_string(), values),
            None => {
                new.index.insert(name.to_ascii_lowercase(), new.entries.len());
                new.entries.push((name.to_string(), values));
            }
        }
        Ok(new)
    }

    /// Appends to an existing case-insensitive match instead of replacing
    /// it, keeping the originally stored case and the order of prior
    /// values. Creates the entry when absent.
    pub fn add(&self, name: &str, values: impl Into<HeaderValues>) -> Result<Self, Error> {
        let values = validate(name, values.into())?;

        let mut new = self.clone();
        match new.index.get(&name.to_ascii_lowercase()) {
            Some(&position) => new.entries[position].1.extend(values),
            None => {
                new.index.insert(name.to_ascii_lowercase(), new.entries.len());
                new.entries.push((name.to_string(), values));
            }
        }
        Ok(new)
    }

    /// Case-insensitive removal. Removing an absent name is not an error.
    #[must_use]
    pub fn remove(&self, name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if !self.index.contains_key(&lower) {
            return self.clone();
        }

        let entries = self
            .entries
            .iter()
            .filter(|(stored, _)| !stored.eq_ignore_ascii_case(name))
            .cloned()
            .collect();
        Self::from_entries(entries)
    }

    /// The ordered value list for a case-insensitive match; empty when the
    /// header is absent.
    #[must_use]
    pub fn get(&self, name: &str) -> &[String] {
        match self.index.get(&name.to_ascii_lowercase()) {
            Some(&position) => &self.entries[position].1,
            None => &[],
        }
    }

    /// The value list joined with `", "`; empty when the header is absent.
    #[must_use]
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(", ")
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order, names in their stored case.
    pub fn iter(&self) -> impl Iterator<Item = &(String, Vec<String>)> {
        self.entries.iter()
    }

    fn from_entries(entries: Vec<(String, Vec<String>)>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, (name, _))| (name.to_ascii_lowercase(), position))
            .collect();
        Self { entries, index }
    }
}

fn validate(name: &str, values: HeaderValues) -> Result<Vec<String>, Error> {
    syntax::validate_token(name).map_err(Error::InvalidHeaderName)?;

    let values = values.into_vec();
    if values.is_empty() {
        return Err(Error::EmptyHeaderValueList);
    }

    values
        .into_iter()
        .map(|value| {
            let trimmed = syntax::trim_whitespace(&value);
            syntax::validate_field_value(trimmed).map_err(Error::InvalidHeaderValue)?;
            Ok(trimmed.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_set_then_get_returns_trimmed_values() {
        let headers = HeaderStore::new().set("X-Test", "  value  ").unwrap();
        assert_eq!(headers.get("X-Test"), ["value"]);
    }

    #[rstest]
    #[case("Content-Type")]
    #[case("content-type")]
    #[case("CONTENT-TYPE")]
    fn test_lookup_is_case_insensitive(#[case] query: &str) {
        let headers = HeaderStore::new().set("Content-Type", "application/json").unwrap();
        assert!(headers.contains(query));
        assert_eq!(headers.get(query), ["application/json"]);
        assert_eq!(headers.line(query), "application/json");
    }

    #[test]
    fn test_set_collapses_case_variants_to_most_recent() {
        let headers = HeaderStore::new()
            .set("Content-Type", "text/html").unwrap()
            .set("content-type", "application/json").unwrap();

        assert_eq!(headers.len(), 1);
        let (name, values) = headers.iter().next().unwrap();
        assert_eq!(name, "content-type");
        assert_eq!(values, &["application/json"]);
    }

    #[test]
    fn test_add_preserves_stored_case_and_order() {
        let headers = HeaderStore::new()
            .set("X-Test", "value1").unwrap()
            .add("x-test", "value2").unwrap();

        assert_eq!(headers.get("X-Test"), ["value1", "value2"]);
        let (name, _) = headers.iter().next().unwrap();
        assert_eq!(name, "X-Test");
    }

    #[test]
    fn test_mutation_leaves_the_receiver_untouched() {
        let original = HeaderStore::new().set("X-Test", "value1").unwrap();
        let modified = original.set("X-Test", "value2").unwrap();

        assert_eq!(original.get("X-Test"), ["value1"]);
        assert_eq!(modified.get("X-Test"), ["value2"]);
    }

    #[test]
    fn test_remove_is_case_insensitive_and_tolerates_absence() {
        let headers = HeaderStore::new().set("Content-Type", "text/html").unwrap();
        assert!(!headers.remove("CONTENT-TYPE").contains("Content-Type"));
        assert_eq!(headers.remove("X-Not-Exists"), headers);
    }

    #[test]
    fn test_remove_keeps_the_index_consistent() {
        let headers = HeaderStore::new()
            .set("A", "1").unwrap()
            .set("B", "2").unwrap()
            .set("C", "3").unwrap()
            .remove("A");

        assert_eq!(headers.get("B"), ["2"]);
        assert_eq!(headers.get("C"), ["3"]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_numeric_names_and_values() {
        let headers = HeaderStore::new().set("123", 456usize).unwrap();
        assert_eq!(headers.get("123"), ["456"]);
    }

    #[rstest]
    #[case("Invalid Header Name")]
    #[case("")]
    #[case("name:")]
    fn test_invalid_names_are_rejected(#[case] name: &str) {
        assert!(matches!(
            HeaderStore::new().set(name, "value"),
            Err(Error::InvalidHeaderName(_))
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            HeaderStore::new().set("X-Test", "invalid\0value"),
            Err(Error::InvalidHeaderValue(_))
        ));
        assert!(matches!(
            HeaderStore::new().set("X-Test", "folded\r\n value"),
            Err(Error::InvalidHeaderValue(_))
        ));
    }

    #[test]
    fn test_empty_value_list_is_rejected() {
        assert!(matches!(
            HeaderStore::new().set("X-Test", Vec::<String>::new()),
            Err(Error::EmptyHeaderValueList)
        ));
    }

    #[test]
    fn test_line_joins_multiple_values() {
        let headers = HeaderStore::new()
            .set("X-Multi", vec!["value1", "value2", "value3"]).unwrap();
        assert_eq!(headers.line("X-Multi"), "value1, value2, value3");
        assert_eq!(headers.line("X-Not-Exists"), "");
    }
}
