//! Module descriptor parsing
//!
//! Handles parsing the key/value descriptor entry shipped in every module
//! package (`module.properties` by default).

use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;

use crate::module::traits::DescriptorError;

/// Version used when a descriptor does not declare one
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Module descriptor (module.properties structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    /// Module name, spaces replaced by underscores
    name: String,
    /// Entry point identifier (descriptor key `main`)
    entry_point: String,
    /// Module version
    version: String,
    /// Module authors, in declaration order
    authors: Vec<String>,
}

/// Registry key for a module name.
///
/// Every lookup goes through this so `"my module"` and `"my_module"` name the
/// same module.
pub fn sanitize_name(name: &str) -> String {
    name.replace(' ', "_")
}

impl ModuleDescriptor {
    /// Create a descriptor without authors
    pub fn new(
        name: impl AsRef<str>,
        entry_point: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: sanitize_name(name.as_ref()),
            entry_point: entry_point.into(),
            version: version.into(),
            authors: Vec::new(),
        }
    }

    /// Attach authors, replacing any already present
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a descriptor from key/value text
    pub fn parse<R: Read>(mut source: R) -> Result<Self, DescriptorError> {
        let mut raw = Vec::new();
        source.read_to_end(&mut raw)?;
        let text = String::from_utf8(raw)
            .map_err(|e| DescriptorError::Unreadable(format!("not valid UTF-8: {}", e)))?;
        Self::parse_str(&text)
    }

    /// Parse a descriptor from an in-memory string
    pub fn parse_str(text: &str) -> Result<Self, DescriptorError> {
        let properties = parse_properties(text);
        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| properties.get(*key))
                .map(|value| value.trim())
                .find(|value| !value.is_empty())
                .map(str::to_string)
        };

        let name = field(&["name"]).ok_or(DescriptorError::MissingField("name"))?;
        let entry_point =
            field(&["main", "entry-point"]).ok_or(DescriptorError::MissingField("main"))?;
        let version = field(&["version"]).unwrap_or_else(|| DEFAULT_VERSION.to_string());
        let authors: Vec<String> = field(&["author", "authors"])
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|author| !author.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self::new(name, entry_point, version).with_authors(authors))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    /// `"<name> v<version>"`
    pub fn full_name(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }
}

/// Split properties text into key/value pairs.
///
/// Accepts `key=value` and `key: value`, skips `#`/`!` comments, and joins
/// lines ending in a backslash with the next line. Later keys override
/// earlier ones.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    let mut pending = String::new();

    for line in text.lines() {
        let line = if pending.is_empty() {
            line.trim_start()
        } else {
            line.trim()
        };
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }

        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            continue;
        }
        pending.push_str(line);
        insert_property(&mut properties, &std::mem::take(&mut pending));
    }
    // A backslash on the last line continues into nothing
    if !pending.is_empty() {
        insert_property(&mut properties, &pending);
    }

    properties
}

fn insert_property(properties: &mut HashMap<String, String>, logical: &str) {
    let split_at = logical.find(|c: char| c == '=' || c == ':');
    let (key, value) = match split_at {
        Some(pos) => (&logical[..pos], &logical[pos + 1..]),
        None => (logical, ""),
    };
    properties.insert(key.trim().to_string(), value.trim().to_string());
}
