//! Render Options
//!
//! Knobs shared by the client renderer and the server stringifier. Options
//! are passed explicitly; the free functions use [`RenderOptions::default`].

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Options for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Attribute storing a keyed element's key in the document.
    #[serde(default = "default_key_attribute")]
    pub key_attribute: String,
    /// Element used for dynamic-leaf wrappers and reactive placeholders.
    #[serde(default = "default_placeholder_tag")]
    pub placeholder_tag: String,
    /// Escape `x-html` markup on the server instead of emitting it verbatim.
    #[serde(default)]
    pub escape_raw_html: bool,
}

fn default_key_attribute() -> String {
    "data-key".to_string()
}

fn default_placeholder_tag() -> String {
    "span".to_string()
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            key_attribute: default_key_attribute(),
            placeholder_tag: default_placeholder_tag(),
            escape_raw_html: false,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn key_attribute(mut self, name: impl Into<String>) -> Self {
        self.key_attribute = name.into();
        self
    }

    pub fn placeholder_tag(mut self, tag: impl Into<String>) -> Self {
        self.placeholder_tag = tag.into();
        self
    }

    pub fn escape_raw_html(mut self, escape: bool) -> Self {
        self.escape_raw_html = escape;
        self
    }

    fn validate(&self) -> Result<(), RenderError> {
        if self.key_attribute.is_empty() {
            return Err(RenderError::Config("key_attribute must not be empty".into()));
        }
        if self.placeholder_tag.is_empty() {
            return Err(RenderError::Config("placeholder_tag must not be empty".into()));
        }
        Ok(())
    }
}
