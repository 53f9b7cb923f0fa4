//! Compiled command types

use crate::secret::{Secret, REDACTED};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::coerce::{coerce, is_quote};

/// A typed parameter value produced by [`coerce`](super::coerce)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CoercedValue {
    Null,
    Bool(bool),
    Int64(i64),
    String(String),
    StringArray(Vec<String>),
}

/// One parameter of a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParameterBinding {
    /// `-Key value`
    Named { key: String, value: CoercedValue },
    /// An unlabeled value list, e.g. the columns of a projection stage
    PositionalList { values: Vec<String> },
}

impl ParameterBinding {
    pub fn named(key: impl Into<String>, value: CoercedValue) -> Self {
        Self::Named {
            key: key.into(),
            value,
        }
    }

    pub fn positional<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::PositionalList {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// One stage of a pipeline: a command name plus its ordered parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterBinding>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterBinding>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Look up a named parameter (case-insensitive, like the remote shell)
    pub fn parameter(&self, key: &str) -> Option<&CoercedValue> {
        self.parameters.iter().find_map(|binding| match binding {
            ParameterBinding::Named { key: k, value } if k.eq_ignore_ascii_case(key) => Some(value),
            _ => None,
        })
    }

    /// The positional value list, if this stage has one
    pub fn positional(&self) -> Option<&[String]> {
        self.parameters.iter().find_map(|binding| match binding {
            ParameterBinding::PositionalList { values } => Some(values.as_slice()),
            _ => None,
        })
    }
}

/// Ordered list of stages, each feeding the next
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Pipeline {
    commands: Vec<CommandDescriptor>,
}

impl Pipeline {
    pub fn new(commands: Vec<CommandDescriptor>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Render the pipeline together with out-of-band parameter names
    ///
    /// Out-of-band values are never rendered, only their names.
    pub fn describe(&self, extra: &ExtraParameters) -> String {
        let mut text = self.to_string();
        for name in extra.names() {
            text.push_str(&format!(" -{} {}", name, REDACTED));
        }
        text
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for binding in &self.parameters {
            match binding {
                ParameterBinding::Named {
                    key,
                    value: CoercedValue::Bool(true),
                } => write!(f, " -{}", key)?,
                ParameterBinding::Named { key, value } => write!(f, " -{} {}", key, value)?,
                ParameterBinding::PositionalList { values } => {
                    let rendered: Vec<String> = values.iter().map(|v| render_literal(v)).collect();
                    write!(f, " {}", rendered.join(", "))?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for CoercedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("$null"),
            Self::Bool(true) => f.write_str("$true"),
            Self::Bool(false) => f.write_str("$false"),
            Self::Int64(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(&render_string(s)),
            Self::StringArray(items) => {
                let rendered: Vec<String> = items.iter().map(|v| render_literal(v)).collect();
                f.write_str(&rendered.join(","))
            }
        }
    }
}

/// Quote a string value unless it would coerce back to the same string
fn render_string(value: &str) -> String {
    if needs_quotes(value) || coerce(value) != CoercedValue::String(value.to_string()) {
        quote(value)
    } else {
        value.to_string()
    }
}

/// Quote a list element unless it is a plain word
fn render_literal(value: &str) -> String {
    if needs_quotes(value) {
        quote(value)
    } else {
        value.to_string()
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.starts_with('-')
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == ',' || c == '|' || is_quote(c))
}

/// Wrap in the quote kind the value does not contain
///
/// The command grammar has no escapes, so a value holding both `'` and `"`
/// is wrapped in double quotes as is and does not compile back to itself.
/// Rendered pipelines are for logs and audit only.
fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

/// A parameter value supplied out of band, bypassing the textual compiler
#[derive(Clone, PartialEq)]
pub enum OutOfBandValue {
    /// Raw bytes, e.g. a certificate file
    Binary(Vec<u8>),
    /// A secret string, e.g. a certificate password
    Secret(Secret),
    /// An already-typed value
    Value(CoercedValue),
}

impl fmt::Debug for OutOfBandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
            Self::Secret(_) => write!(f, "Secret({})", REDACTED),
            Self::Value(_) => write!(f, "Value({})", REDACTED),
        }
    }
}

/// Named out-of-band parameters, bound to the final pipeline stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraParameters {
    values: BTreeMap<String, OutOfBandValue>,
}

impl ExtraParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous value under the same name
    pub fn with(mut self, name: impl Into<String>, value: OutOfBandValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: OutOfBandValue) {
        self.values.insert(name.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutOfBandValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
