use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing [`ServiceEntry`] values from the command line.
#[derive(Debug, Error)]
pub enum ServiceEntryParseError {
    /// The `=` separating name and command was missing.
    #[error("service '{0}' is missing the assignment '=' between name and command")]
    MissingAssignment(String),
    /// The name before `=` was blank.
    #[error("service '{0}' has an empty name")]
    EmptyName(String),
    /// The command after `=` was blank.
    #[error("service '{0}' has an empty command")]
    EmptyCommand(String),
}

/// Named service declared in configuration.
///
/// File-declared services are sleeping unless `active` is set or their name is
/// listed under `activate`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Identifier used by `activate` and the service listing.
    pub name: String,
    /// Command template with `${...}` placeholders.
    pub command: String,
    /// Whether the service runs for incoming calls.
    #[serde(default)]
    pub active: bool,
    /// Caller-directory lookup id used to resolve display names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_id: Option<i32>,
}

impl ServiceEntry {
    /// Creates a sleeping service entry without a lookup id.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            active: false,
            lookup_id: None,
        }
    }

    /// Marks the entry as active.
    #[must_use]
    pub const fn activated(mut self) -> Self {
        self.active = true;
        self
    }

    /// Binds the entry to a caller-directory lookup id.
    #[must_use]
    pub const fn with_lookup_id(mut self, lookup_id: i32) -> Self {
        self.lookup_id = Some(lookup_id);
        self
    }
}

impl fmt::Display for ServiceEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}={}", self.name, self.command)
    }
}

impl FromStr for ServiceEntry {
    type Err = ServiceEntryParseError;

    /// Parses `name=command`; everything after the first `=` is the command.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (raw_name, raw_command) = input
            .split_once('=')
            .ok_or_else(|| ServiceEntryParseError::MissingAssignment(input.to_owned()))?;
        let name = raw_name.trim();
        if name.is_empty() {
            return Err(ServiceEntryParseError::EmptyName(input.to_owned()));
        }
        let command = raw_command.trim();
        if command.is_empty() {
            return Err(ServiceEntryParseError::EmptyCommand(input.to_owned()));
        }
        Ok(Self::new(name, command))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_name_and_command() {
        let entry: ServiceEntry = "popup=notify-send ${name}=${number}"
            .parse()
            .expect("entry should parse");
        assert_eq!(entry.name, "popup");
        assert_eq!(entry.command, "notify-send ${name}=${number}");
        assert!(!entry.active);
        assert_eq!(entry.lookup_id, None);
    }

    #[rstest]
    #[case::no_assignment("popup")]
    #[case::blank_name(" =notify-send")]
    #[case::blank_command("popup=  ")]
    fn rejects_malformed_entries(#[case] input: &str) {
        assert!(input.parse::<ServiceEntry>().is_err());
    }

    #[test]
    fn builder_methods_set_flags() {
        let entry = ServiceEntry::new("log", "logger ${number}")
            .activated()
            .with_lookup_id(7);
        assert!(entry.active);
        assert_eq!(entry.lookup_id, Some(7));
        assert_eq!(entry.to_string(), "log=logger ${number}");
    }
}
