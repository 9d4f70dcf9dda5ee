//! Ordered, in-memory collection of configured services.
//!
//! A service pairs a command template with an activation flag and an optional
//! caller-directory lookup id. Templates are validated when registered; the
//! registry never removes entries.

mod command;
mod errors;

use std::fmt;

use tracing::debug;

pub use command::{resolve_program, validate_command};
pub use errors::{InvalidCommandReason, ServiceError};

const SERVICES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::services");

/// One configured command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    identifier: Option<String>,
    command: String,
    active: bool,
    lookup_id: Option<i32>,
}

impl Service {
    /// Name of the service; anonymous services have none.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Command template with `${...}` placeholders.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the service runs for incoming calls.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Activates or puts the service to sleep.
    pub const fn set_active(&mut self, active: bool) -> &mut Self {
        self.active = active;
        self
    }

    /// Caller-directory lookup id, if any.
    #[must_use]
    pub const fn lookup_id(&self) -> Option<i32> {
        self.lookup_id
    }

    /// Binds the service to a caller-directory lookup id.
    pub const fn with_lookup_id(&mut self, lookup_id: i32) -> &mut Self {
        self.lookup_id = Some(lookup_id);
        self
    }

    /// Identifier, or the command line in angle brackets for anonymous
    /// services.
    #[must_use]
    pub fn label(&self) -> String {
        self.identifier
            .clone()
            .unwrap_or_else(|| format!("<{}>", self.command))
    }
}

impl fmt::Display for Service {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.active { "active" } else { "sleeping" };
        write!(formatter, "{}: {status}", self.label())
    }
}

/// Services in registration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
}

impl ServiceRegistry {
    /// Creates an empty registry; programs are resolved through `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `command` and appends a service.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCommand`] when the template is empty,
    /// cannot be split into words, or names a program that is not an
    /// executable.
    pub fn add(
        &mut self,
        identifier: Option<&str>,
        command: &str,
        active: bool,
    ) -> Result<&mut Service, ServiceError> {
        let program = validate_command(command, None)?;
        debug!(
            target: SERVICES_TARGET,
            service = identifier.unwrap_or("<anonymous>"),
            program = %program.display(),
            active,
            "service registered"
        );
        self.services.push(Service {
            identifier: identifier.map(ToOwned::to_owned),
            command: command.to_owned(),
            active,
            lookup_id: None,
        });
        let Some(service) = self.services.last_mut() else {
            return Err(ServiceError::InvalidCommand {
                command: command.to_owned(),
                reason: InvalidCommandReason::Empty,
            });
        };
        Ok(service)
    }

    /// First service named `identifier`.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|service| service.identifier() == Some(identifier))
    }

    /// First service named `identifier`, mutably.
    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut Service> {
        self.services
            .iter_mut()
            .find(|service| service.identifier() == Some(identifier))
    }

    /// All services in registration order.
    #[must_use]
    pub fn list(&self) -> &[Service] {
        &self.services
    }

    /// Active services in registration order.
    pub fn active(&self) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(|service| service.is_active())
    }

    /// Number of registered services.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
