//! Command-line arguments
//!
//! Every service binary accepts `-c <name>` (config name, resolved to
//! `<name>.env`) and `-cPath <p1,p2>` (comma-separated search paths). The
//! directory binary additionally accepts `-migrate`.

use super::app_config::ConfigError;
use std::path::PathBuf;

/// Parsed command-line arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Config name from `-c`; resolved to `<name>.env` in the search paths
    pub config_name: Option<String>,
    /// Search paths from `-cPath`, in order
    pub config_paths: Vec<String>,
    /// Whether `-migrate` was passed
    pub migrate: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config_name: None,
            config_paths: vec![".".to_string()],
            migrate: false,
        }
    }
}

impl CliArgs {
    /// Parse from the process arguments
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Parse from an argument iterator (binary name already stripped)
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        let mut iter = args.into_iter().map(Into::into);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-c" => parsed.config_name = iter.next(),
                "-cPath" => {
                    if let Some(paths) = iter.next() {
                        parsed.config_paths = paths
                            .split(',')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(String::from)
                            .collect();
                    }
                }
                "-migrate" => parsed.migrate = true,
                other => {
                    tracing::warn!(arg = %other, "ignoring unknown argument");
                }
            }
        }

        parsed
    }

    /// Load the selected dotenv file into the process environment
    ///
    /// Without `-c` this falls back to a best-effort `.env` in the current
    /// directory. With `-c`, the named file must exist in one of the search
    /// paths.
    ///
    /// # Errors
    /// Returns an error if a named config file is not found anywhere.
    pub fn load_dotenv(&self) -> Result<(), ConfigError> {
        let Some(name) = &self.config_name else {
            let _ = dotenvy::dotenv();
            return Ok(());
        };

        let file_name = format!("{name}.env");
        for dir in &self.config_paths {
            let candidate = PathBuf::from(dir).join(&file_name);
            if candidate.is_file() {
                dotenvy::from_path(&candidate)
                    .map_err(|_| ConfigError::FileNotFound(candidate.display().to_string()))?;
                tracing::info!(path = %candidate.display(), "loaded config file");
                return Ok(());
            }
        }

        Err(ConfigError::FileNotFound(file_name))
    }
}
