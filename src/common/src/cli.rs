use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across the upload-admin binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands available for all services
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the service (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        // SAFETY: Setting RUST_LOG environment variable is safe for logging configuration
        unsafe {
            std::env::set_var("RUST_LOG", level);
        }
        tracing_subscriber::fmt::init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Upload-Admin Configuration:");
            println!("===========================");
            println!("Storage DSN: {}", config.storage.dsn);
            println!(
                "Public URL: {}",
                config.storage.public_url.as_deref().unwrap_or("(none)")
            );
            println!("Database DSN: {}", config.database.dsn);
            println!(
                "Reference check limit: {}",
                config.admin.reference_check_limit
            );
            println!("Delete concurrency: {}", config.admin.delete_concurrency);
            println!("Request timeout: {:?}", config.admin.request_timeout);
            println!("Reference sources:");
            for source in &config.references {
                println!("  - {}.{}", source.collection, source.field);
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.storage.dsn.is_empty() {
            anyhow::bail!("Storage DSN cannot be empty");
        }
        url::Url::parse(&config.storage.dsn).context("Storage DSN is not a valid URL")?;

        if config.database.dsn.is_empty() {
            anyhow::bail!("Database DSN cannot be empty");
        }
        if !config.database.dsn.starts_with("sqlite:") && !config.database.dsn.starts_with("postgres") {
            anyhow::bail!(
                "Unsupported database DSN '{}'. Supported: sqlite, postgres",
                config.database.dsn
            );
        }

        if config.admin.reference_check_limit == 0 {
            anyhow::bail!("Reference check limit must be greater than zero");
        }
        if config.admin.delete_concurrency == 0 {
            anyhow::bail!("Delete concurrency must be greater than zero");
        }

        for source in &config.references {
            if !source.is_valid() {
                anyhow::bail!(
                    "Invalid reference source '{}.{}': collection and field must be plain identifiers",
                    source.collection,
                    source.field
                );
            }
        }

        log::info!("Configuration is valid");
        Ok(())
    }

    /// Handle common commands that do not start the service.
    /// Returns true when the command was handled and the caller should exit.
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Start => Ok(false),
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                println!("Configuration is valid");
                Ok(true)
            }
            CommonCommands::Version => {
                println!("upload-admin {}", env!("CARGO_PKG_VERSION"));
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, ReferenceSource};

    #[test]
    fn test_default_configuration_validates() {
        let config = Configuration::default();
        assert!(utils::validate_config(&config).is_ok());
    }

    #[test]
    fn test_bad_storage_scheme_fails_validation() {
        let mut config = Configuration::default();
        config.storage.dsn = String::from("not a url");
        assert!(utils::validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_limits_fail_validation() {
        let mut config = Configuration::default();
        config.admin.reference_check_limit = 0;
        assert!(utils::validate_config(&config).is_err());

        let mut config = Configuration::default();
        config.admin.delete_concurrency = 0;
        assert!(utils::validate_config(&config).is_err());
    }

    #[test]
    fn test_malformed_reference_source_fails_validation() {
        let mut config = Configuration::default();
        config
            .references
            .push(ReferenceSource::new("pets; DROP TABLE pets", "photo_key"));
        assert!(utils::validate_config(&config).is_err());
    }
}
