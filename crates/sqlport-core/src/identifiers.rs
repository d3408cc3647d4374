//! SQL identifiers.
//!
//! Names coming from the mapping layer are plain text unless wrapped in backticks
//! (`` `Order` ``), which marks them as explicitly quoted. Explicitly quoted names are
//! rendered with the dialect's own quote characters; plain names are emitted as-is.

use crate::dialect::DialectCapabilities;
use std::fmt;

/// A possibly-quoted SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    text: String,
    quoted: bool,
}

impl Identifier {
    /// Parse a name, treating a surrounding pair of backticks as explicit quoting.
    pub fn parse(name: &str) -> Self {
        let quoted = name.len() >= 2 && name.starts_with('`') && name.ends_with('`');
        let text = if quoted { &name[1..name.len() - 1] } else { name };
        Self {
            text: text.to_string(),
            quoted,
        }
    }

    /// The raw name without any quoting.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Render for the given dialect.
    pub fn render(&self, caps: &DialectCapabilities) -> String {
        if self.quoted {
            caps.quote(&self.text)
        } else {
            self.text.clone()
        }
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::parse(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::parse(&name)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "`{}`", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

/// A catalog/schema qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub catalog: Option<Identifier>,
    pub schema: Option<Identifier>,
    pub name: Identifier,
}

impl QualifiedName {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<Identifier>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Into<Identifier>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Render as `catalog.schema.name`, omitting absent parts.
    pub fn render(&self, caps: &DialectCapabilities) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(catalog) = &self.catalog {
            parts.push(catalog.render(caps));
        }
        if let Some(schema) = &self.schema {
            parts.push(schema.render(caps));
        }
        parts.push(self.name.render(caps));
        parts.join(".")
    }
}

impl From<&str> for QualifiedName {
    fn from(name: &str) -> Self {
        QualifiedName::new(name)
    }
}
