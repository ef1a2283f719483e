//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `FILEDROP_CONFIG`
//! environment variable. A missing file is not an error: every key has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `FILEDROP_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `FILEDROP_FILES__UPLOAD_DIR=/srv/uploads` sets the `files.upload_dir` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Serve on another port with the actix-web binding
//! FILEDROP_PORT=9002
//! FILEDROP_FRAMEWORK=actix
//!
//! # Cap uploads at 100 MiB
//! FILEDROP_FILES__MAX_UPLOAD_SIZE=104857600
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FILEDROP_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Web framework used to serve the HTTP surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Axum,
    Actix,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Axum => write!(f, "axum"),
            Framework::Actix => write!(f, "actix"),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Which framework binding serves requests
    pub framework: Framework,
    /// Upload storage configuration
    pub files: FilesConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Flat directory holding every uploaded file, created on startup
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes
    pub max_upload_size: u64,
    /// Read buffer size in bytes used when streaming downloads
    pub download_buffer_size: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_upload_size: 2 * 1024 * 1024 * 1024, // 2 GiB
            download_buffer_size: 64 * 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9001,
            framework: Framework::default(),
            files: FilesConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.files.upload_dir.as_os_str().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: files.upload_dir cannot be empty".to_string(),
            });
        }

        if self.files.max_upload_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: files.max_upload_size cannot be 0".to_string(),
            });
        }

        if self.files.download_buffer_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: files.download_buffer_size cannot be 0".to_string(),
            });
        }

        if self.framework == Framework::Actix && !cfg!(feature = "actix") {
            return Err(Error::Internal {
                operation: "Config validation: framework 'actix' requires the 'actix' cargo feature".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values; the config path itself is a CLI arg
            .merge(Env::prefixed("FILEDROP_").split("__").ignore(&["config"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.host, "0.0.0.0");
            assert_eq!(config.port, 9001);
            assert_eq!(config.framework, Framework::Axum);
            assert_eq!(config.files.upload_dir, PathBuf::from("uploads"));
            assert_eq!(config.files.max_upload_size, 2 * 1024 * 1024 * 1024);
            assert_eq!(config.files.download_buffer_size, 65536);
            assert!(!config.enable_otel_export);

            Ok(())
        });
    }

    #[test]
    fn test_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
host: 127.0.0.1
port: 9002
framework: actix
files:
  upload_dir: /tmp/filedrop-uploads
  max_upload_size: 1048576
"#,
            )?;

            let config = Config::figment(&args("test.yaml")).extract::<Config>()?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 9002);
            assert_eq!(config.framework, Framework::Actix);
            assert_eq!(config.files.upload_dir, PathBuf::from("/tmp/filedrop-uploads"));
            assert_eq!(config.files.max_upload_size, 1048576);
            assert_eq!(config.files.download_buffer_size, 65536); // still default

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9002
files:
  upload_dir: from-yaml
"#,
            )?;

            jail.set_env("FILEDROP_HOST", "127.0.0.1");
            jail.set_env("FILEDROP_PORT", "8080");
            jail.set_env("FILEDROP_FILES__MAX_UPLOAD_SIZE", "4096");
            jail.set_env("FILEDROP_CONFIG", "test.yaml");

            let config = Config::load(&args("test.yaml"))?;

            // Env vars should override
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.files.max_upload_size, 4096);

            // YAML values should be preserved
            assert_eq!(config.files.upload_dir, PathBuf::from("from-yaml"));

            Ok(())
        });
    }

    #[test]
    fn test_unknown_keys_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "upload_directory: nope\n")?;

            assert!(Config::load(&args("test.yaml")).is_err());

            Ok(())
        });
    }

    #[test]
    fn test_invalid_framework_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "framework: flask\n")?;

            assert!(Config::load(&args("test.yaml")).is_err());

            Ok(())
        });
    }

    #[test]
    fn test_max_upload_size_zero_validation() {
        let mut config = Config::default();
        config.files.max_upload_size = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_upload_size cannot be 0"));
    }

    #[test]
    fn test_download_buffer_size_zero_validation() {
        let mut config = Config::default();
        config.files.download_buffer_size = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("download_buffer_size cannot be 0"));
    }

    #[test]
    fn test_empty_upload_dir_validation() {
        let mut config = Config::default();
        config.files.upload_dir = PathBuf::new();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("upload_dir cannot be empty"));
    }

    #[test]
    fn test_validation_error_surfaces_from_load() {
        Jail::expect_with(|jail| {
            jail.set_env("FILEDROP_FILES__DOWNLOAD_BUFFER_SIZE", "0");

            let err = Config::load(&args("missing.yaml")).unwrap_err();
            assert!(err.to_string().contains("download_buffer_size cannot be 0"));

            Ok(())
        });
    }

    #[test]
    fn test_config_validation_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:9001");
    }
}
