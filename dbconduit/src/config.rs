//! TOML configuration loading.
//!
//! [`load_config`] never fails: a missing file yields an empty
//! configuration silently, and unreadable or malformed files yield an
//! empty configuration after a single `tracing::error!` diagnostic.
//! [`try_load_config`] exposes the classified failure instead.
//!
//! # Example
//! ```rust,no_run
//! use dbconduit::config::load_config;
//!
//! let config = load_config(None);
//! if let Some(database) = config.section("database") {
//!     println!("configured keys: {}", database.len());
//! }
//! ```

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Why a configuration file could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The file does not exist.
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but is not valid TOML.
    #[error("failed to parse configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The file exists but could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parsed configuration: string keys mapped to nested TOML values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    values: toml::Table,
}

impl Configuration {
    /// An empty configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses configuration text.
    ///
    /// # Errors
    /// Returns the TOML parse error if `text` is not a valid document.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        text.parse::<toml::Table>().map(Self::from)
    }

    /// Top-level value for `key`.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.values.get(key)
    }

    /// Top-level table for `key`, if the value is a table.
    pub fn section(&self, key: &str) -> Option<&toml::Table> {
        self.values.get(key).and_then(toml::Value::as_table)
    }

    /// Deserializes the table under `key` into `T`.
    ///
    /// # Errors
    /// Returns a configuration error if the section is missing or does not
    /// match `T`.
    pub fn section_as<T: DeserializeOwned>(&self, key: &str) -> crate::Result<T> {
        let section = self.section(key).ok_or_else(|| {
            crate::error::DbConduitError::configuration(format!("missing [{}] section", key))
        })?;

        toml::Value::Table(section.clone())
            .try_into()
            .map_err(|e| {
                crate::error::DbConduitError::configuration(format!(
                    "invalid [{}] section: {}",
                    key, e
                ))
            })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Underlying TOML table.
    pub fn as_table(&self) -> &toml::Table {
        &self.values
    }
}

impl From<toml::Table> for Configuration {
    fn from(values: toml::Table) -> Self {
        Self { values }
    }
}

/// Root of the installation: the workspace directory holding this crate.
pub fn installation_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map_or_else(|| manifest_dir.to_path_buf(), Path::to_path_buf)
}

/// `<root>/config/config.toml`.
pub fn default_config_path() -> PathBuf {
    installation_root().join("config").join("config.toml")
}

/// Loads and parses the configuration file at `path`.
///
/// # Errors
/// Returns `NotFound`, `Parse` or `Io` depending on what went wrong.
pub fn try_load_config(path: &Path) -> Result<Configuration, ConfigLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigLoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    Configuration::parse(&text).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the configuration at `path`, or at [`default_config_path`] when
/// `path` is `None`. Always returns a configuration.
pub fn load_config(path: Option<&Path>) -> Configuration {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);

    match try_load_config(&path) {
        Ok(config) => {
            tracing::debug!(
                "Loaded {} configuration keys from {}",
                config.len(),
                path.display()
            );
            config
        }
        Err(ConfigLoadError::NotFound { .. }) => Configuration::empty(),
        Err(e) => {
            tracing::error!("{}", e);
            Configuration::empty()
        }
    }
}

/// Process-wide configuration loaded from [`default_config_path`].
static DEFAULT_CONFIG: OnceLock<Configuration> = OnceLock::new();

/// Returns the default configuration, loading it on first use.
///
/// The file is read at most once per process with the same fallback rules
/// as [`load_config`]; later edits to the file are not picked up. Call
/// [`load_config`] for a fresh read.
pub fn default_config() -> &'static Configuration {
    DEFAULT_CONFIG.get_or_init(|| load_config(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tracing_subscriber::{Layer, layer::SubscriberExt};

    /// Counts events at ERROR level.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn load_counting(path: &Path) -> (Configuration, usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&count)));
        let config = tracing::subscriber::with_default(subscriber, || load_config(Some(path)));
        (config, count.load(Ordering::SeqCst))
    }

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_file(
            r#"
            title = "reports"

            [database]
            type = "postgresql"
            host = "db.internal"
            port = 5433
            "#,
        );

        let (config, errors) = load_counting(file.path());
        assert_eq!(errors, 0);
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("title").and_then(|v| v.as_str()), Some("reports"));

        let database = config.section("database").unwrap();
        assert_eq!(database.get("port").and_then(|v| v.as_integer()), Some(5433));
    }

    #[test]
    fn test_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (config, errors) = load_counting(&dir.path().join("absent.toml"));

        assert!(config.is_empty());
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_invalid_toml_emits_one_diagnostic() {
        let file = write_file("[database\nhost = ");
        let (config, errors) = load_counting(file.path());

        assert!(config.is_empty());
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_directory_path_emits_one_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let (config, errors) = load_counting(dir.path());

        assert!(config.is_empty());
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_try_load_config_classifies_failures() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            try_load_config(&dir.path().join("absent.toml")),
            Err(ConfigLoadError::NotFound { .. })
        ));

        let file = write_file("not = [valid");
        assert!(matches!(
            try_load_config(file.path()),
            Err(ConfigLoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        let file = write_file("");
        let (config, errors) = load_counting(file.path());

        assert!(config.is_empty());
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_section_as() {
        #[derive(serde::Deserialize)]
        struct Limits {
            rows: u32,
        }

        let config = Configuration::parse("[limits]\nrows = 10\n").unwrap();
        let limits: Limits = config.section_as("limits").unwrap();
        assert_eq!(limits.rows, 10);

        assert!(config.section_as::<Limits>("missing").is_err());
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("config/config.toml"));
        assert!(path.starts_with(installation_root()));
    }

    #[test]
    fn test_default_config_is_loaded_once() {
        let first = default_config();
        let second = default_config();

        assert!(std::ptr::eq(first, second));
        assert!(DEFAULT_CONFIG.get().is_some());
    }
}
