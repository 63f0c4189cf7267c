//! Connection specification.
//!
//! A `ConnectionSpec` carries everything needed to reach one database: the
//! dialect, the server address, credentials and the database name. It is
//! built once and read afterwards; there are no setters.

use crate::{Result, error::DbConduitError, models::Dialect, security::Credentials};

/// Immutable description of a database connection.
///
/// # Security
/// `Display` never includes credentials and `Debug` redacts the password.
///
/// # Example
/// ```rust
/// use dbconduit::connection::ConnectionSpec;
/// use dbconduit::models::Dialect;
/// use dbconduit::security::Credentials;
///
/// let spec = ConnectionSpec::new(
///     Dialect::PostgreSql,
///     "db.internal",
///     "analytics",
///     Credentials::new("reporter", "s3cret"),
/// )
/// .with_port(6432);
///
/// assert_eq!(spec.effective_port(), 6432);
/// assert_eq!(spec.to_string(), "postgresql://db.internal:6432/analytics");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    dialect: Dialect,
    host: String,
    database: String,
    credentials: Credentials,
    port: Option<u16>,
    trusted: bool,
}

impl ConnectionSpec {
    /// Creates a spec with no explicit port and trusted authentication on.
    ///
    /// The trusted flag only affects SQL Server; use
    /// [`ConnectionSpec::with_trusted`] to authenticate with the credentials.
    pub fn new(
        dialect: Dialect,
        host: impl Into<String>,
        database: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            dialect,
            host: host.into(),
            database: database.into(),
            credentials,
            port: None,
            trusted: true,
        }
    }

    /// Creates a spec from a dialect name, as accepted by [`Dialect::parse`].
    ///
    /// # Errors
    /// Returns `UnsupportedDialect` for unknown dialect names.
    pub fn from_dialect_name(
        dialect: &str,
        host: impl Into<String>,
        database: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self> {
        Ok(Self::new(Dialect::parse(dialect)?, host, database, credentials))
    }

    /// Builder method to set an explicit port. `0` means "use the default".
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set an optional port.
    pub fn with_optional_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Builder method to toggle trusted (integrated) authentication.
    pub fn with_trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn trusted(&self) -> bool {
        self.trusted
    }

    /// The port the caller asked for, if any.
    pub fn explicit_port(&self) -> Option<u16> {
        self.port.filter(|&p| p != 0)
    }

    /// The port actually used: explicit port or the dialect default.
    pub fn effective_port(&self) -> u16 {
        self.explicit_port()
            .unwrap_or_else(|| self.dialect.default_port())
    }

    /// Whether SQL Server integrated authentication applies to this spec.
    pub fn uses_integrated_auth(&self) -> bool {
        self.dialect == Dialect::MsSql && self.trusted
    }

    /// Renders the connection descriptor for this spec.
    ///
    /// The result embeds credentials; log it only through
    /// [`crate::error::redact_database_url`].
    pub fn connection_string(&self) -> String {
        super::builder::format_descriptor(
            self.dialect,
            &self.host,
            self.credentials.username(),
            self.credentials.password(),
            &self.database,
            self.port,
            self.trusted,
        )
    }

    /// Validates the spec before a connection attempt.
    ///
    /// # Errors
    /// Returns a configuration error if host or database is empty, or if
    /// credentials are required and the username is empty.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DbConduitError::configuration("host cannot be empty"));
        }

        if self.database.trim().is_empty() {
            return Err(DbConduitError::configuration("database cannot be empty"));
        }

        if !self.uses_integrated_auth() && self.credentials.username().is_empty() {
            return Err(DbConduitError::configuration(format!(
                "username is required for {} connections",
                self.dialect
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}{}/{}",
            self.dialect.scheme(),
            self.host,
            self.explicit_port()
                .map_or_else(String::new, |p| format!(":{}", p)),
            self.database
        )
        // Intentionally omit username and never include credentials
    }
}
