//! Property names and helpers for synthesized nodes.

use crate::types::Properties;

pub const PROP_NAME: &str = "name";
pub const PROP_QUALIFIED_NAME: &str = "qualifiedName";
pub const PROP_FILE_TYPE: &str = "fileType";
pub const PROP_PROTOCOL: &str = "protocol";
pub const PROP_NETWORK_ADDRESS: &str = "networkAddress";

/// Protocol recorded on every endpoint node.
pub const FILE_PROTOCOL: &str = "file";

/// Builder for creating node property maps.
#[derive(Debug, Default)]
pub struct PropertiesBuilder {
    properties: Properties,
}

impl PropertiesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key-value pair
    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a key-value pair if the value is Some
    pub fn add_option(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        if let Some(v) = value {
            self.properties.insert(key.into(), v.into());
        }
        self
    }

    pub fn build(self) -> Properties {
        self.properties
    }
}

/// File type of a base name: the text after the last `.`.
///
/// Returns `None` unless the name is longer than two characters and the
/// last dot is neither its first nor its last character.
pub fn file_type_of(base_name: &str) -> Option<&str> {
    if base_name.chars().count() <= 2 {
        return None;
    }
    let dot = base_name.rfind('.')?;
    if dot == 0 || dot + 1 == base_name.len() {
        return None;
    }
    Some(&base_name[dot + 1..])
}
