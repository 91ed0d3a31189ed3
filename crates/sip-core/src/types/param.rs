//! # SIP Parameters
//!
//! Parameters hang off URIs (`;transport=tcp`), off header values
//! (`;tag=1928301774`) and make up the query component of a URI
//! (`?subject=project`). They are an insertion-ordered list of
//! case-insensitive names, each with an optional value; a parameter without a
//! value is a flag (`;lr`).
//!
//! ```
//! use sipua_sip_core::types::param::Params;
//!
//! let mut params = Params::parse("transport=tcp;lr", ';');
//! assert_eq!(params.value("Transport"), Some("tcp"));
//! assert!(params.contains("lr"));
//! params.set("maddr", Some("10.0.0.1"));
//! assert_eq!(params.to_string(), ";transport=tcp;lr;maddr=10.0.0.1");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered, case-insensitive parameter list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    entries: Vec<(String, Option<String>)>,
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    /// Parses `a=b<sep>c<sep>d=e`; empty segments are skipped.
    ///
    /// A leading separator is tolerated so both `;a=b` and `a=b` parse.
    pub fn parse(text: &str, separator: char) -> Self {
        let mut params = Params::new();
        for segment in split_outside_quotes(text, separator) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once('=') {
                Some((name, value)) => params.push(name.trim(), Some(value.trim())),
                None => params.push(segment, None::<&str>),
            }
        }
        params
    }

    /// Returns `Some(None)` for a flag, `Some(Some(v))` for a valued
    /// parameter and `None` when absent.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    /// Value of a valued parameter
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces an existing parameter in place or appends a new one
    pub fn set<V: Into<String>>(&mut self, name: &str, value: Option<V>) {
        let value = value.map(Into::into);
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Sets a value-less parameter such as `lr`
    pub fn set_flag(&mut self, name: &str) {
        self.set(name, None::<String>);
    }

    fn push<V: Into<String>>(&mut self, name: &str, value: Option<V>) {
        self.entries.push((name.to_string(), value.map(Into::into)));
    }

    /// Removes every occurrence of `name`, returning whether one existed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// Lower-cased names, sorted and de-duplicated
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .map(|(n, _)| n.to_ascii_lowercase())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Writes the list with `lead` before the first entry and `separator`
    /// between entries (`?a=b&c=d` for queries).
    pub fn write_with(&self, f: &mut impl fmt::Write, lead: char, separator: char) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            f.write_char(if i == 0 { lead } else { separator })?;
            f.write_str(name)?;
            if let Some(value) = value {
                write!(f, "={}", value)?;
            }
        }
        Ok(())
    }
}

/// `;name=value` form used for URI and header-field parameters
impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_with(f, ';', ';')
    }
}

/// Splits on `separator` but not inside a quoted string
pub(crate) fn split_outside_quotes(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
