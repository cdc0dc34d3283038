//! Link descriptors: small files naming an arbitrary executable to be
//! treated as a pluggable service.
//!
//! A link file is a single YAML mapping:
//!
//! ```yaml
//! executable: $HOME/bin/terraform-bridge
//! arguments: ["--plugin", "${PLUGIN_MODE}"]
//! ```
//!
//! `arguments` may also be a single string. Every value is expanded against
//! the environment; unset variables expand to the empty string.

use super::{LinkDescriptorError, ServiceCommand, ServiceRegistryDomainError};
use serde_yaml::Value;

/// Executable and arguments read from a link file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    executable: String,
    arguments: Vec<String>,
}

impl LinkDescriptor {
    /// Parses a link document, expanding variables from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDescriptorError`] when the document is not a YAML
    /// mapping or lacks a usable `executable`.
    pub fn parse(source: &str) -> Result<Self, LinkDescriptorError> {
        Self::parse_with(source, |name| std::env::var(name).ok())
    }

    /// Parses a link document, expanding variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDescriptorError`] when the document is not a YAML
    /// mapping or lacks a usable `executable`.
    pub fn parse_with<F>(source: &str, lookup: F) -> Result<Self, LinkDescriptorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let document: Value = serde_yaml::from_str(source)
            .map_err(|err| LinkDescriptorError::Syntax(err.to_string()))?;
        let Some(mapping) = document.as_mapping() else {
            return Err(LinkDescriptorError::NotAMapping);
        };

        let executable = match mapping.get("executable") {
            Some(Value::String(raw)) => expand_env(raw, &lookup),
            _ => String::new(),
        };
        if executable.trim().is_empty() {
            return Err(LinkDescriptorError::MissingExecutable);
        }

        let arguments = match mapping.get("arguments") {
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| expand_env(&scalar_text(item), &lookup))
                .collect(),
            Some(Value::String(raw)) => vec![expand_env(raw, &lookup)],
            _ => Vec::new(),
        };

        Ok(Self {
            executable,
            arguments,
        })
    }

    /// Returns the expanded executable.
    #[must_use]
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Returns the expanded arguments.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Converts the descriptor into a service command.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceRegistryDomainError::EmptyCommand`] when the
    /// executable is blank.
    pub fn to_command(&self) -> Result<ServiceCommand, ServiceRegistryDomainError> {
        Ok(ServiceCommand::new(self.executable.as_str())?.with_args(self.arguments.iter().cloned()))
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|rendered| rendered.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

/// Expands `$NAME` and `${NAME}` references in `input` through `lookup`.
///
/// Unknown variables expand to the empty string. A `$` that does not start a
/// reference is kept literally, as is an unterminated `${`.
pub fn expand_env<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            expanded.push(ch);
            continue;
        }

        match chars.peek().copied() {
            Some('{') => {
                chars.next();
                let mut braced = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    braced.push(inner);
                }
                if closed {
                    expanded.push_str(&lookup(&braced).unwrap_or_default());
                } else {
                    expanded.push_str("${");
                    expanded.push_str(&braced);
                }
            }
            Some(first) if is_name_char(first) => {
                let mut bare = String::new();
                while let Some(part) = chars.next_if(|candidate| is_name_char(*candidate)) {
                    bare.push(part);
                }
                expanded.push_str(&lookup(&bare).unwrap_or_default());
            }
            _ => expanded.push('$'),
        }
    }

    expanded
}

const fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
