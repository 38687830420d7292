use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object store DSN: file:///path, memory://, or s3://host/bucket
    pub dsn: String,
    /// Optional public base URL prepended to keys when deriving object URLs
    pub public_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("memory://"),
            public_url: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite::memory:"),
        }
    }
}

/// Tuning knobs for the reconciliation and deletion paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Maximum number of visible keys for which per-key reference detail is
    /// fetched; above this the view degrades to membership-only classification
    pub reference_check_limit: usize,
    /// Bounded fan-out for bulk deletions
    pub delete_concurrency: usize,
    /// Deadline applied to every storage and database call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            reference_check_limit: 100,
            delete_concurrency: 8,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One place in the system of record that can hold object keys.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceSource {
    pub collection: String,
    pub field: String,
}

impl ReferenceSource {
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
        }
    }

    /// Both parts must be plain SQL identifiers; they are interpolated into
    /// queries and cannot be bound as parameters.
    pub fn is_valid(&self) -> bool {
        is_identifier(&self.collection) && is_identifier(&self.field)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    /// Object storage holding the uploaded files
    pub storage: StorageConfig,
    /// System of record queried for key references
    pub database: DatabaseConfig,
    /// Reconciliation/deletion tuning
    pub admin: AdminConfig,
    /// Collections and fields that may reference object keys
    pub references: Vec<ReferenceSource>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            admin: AdminConfig::default(),
            references: vec![
                ReferenceSource::new("pets", "photo_key"),
                ReferenceSource::new("banners", "image_key"),
                ReferenceSource::new("breeds", "icon_key"),
                ReferenceSource::new("users", "avatar_key"),
            ],
        }
    }
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("upload-admin.toml"))
            .merge(Env::prefixed("UPLOAD_ADMIN__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("UPLOAD_ADMIN__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_configless() {
        let config = Configuration::default();

        assert_eq!(config.storage.dsn, "memory://");
        assert_eq!(config.database.dsn, "sqlite::memory:");
        assert_eq!(config.admin.reference_check_limit, 100);
        assert_eq!(config.admin.delete_concurrency, 8);
        assert_eq!(config.admin.request_timeout, Duration::from_secs(30));
        assert!(!config.references.is_empty());
        assert!(config.references.iter().all(ReferenceSource::is_valid));
    }

    #[test]
    fn test_defaults_extract_without_config_file() {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .extract::<Configuration>()
            .unwrap();

        assert_eq!(config.storage.dsn, "memory://");
        assert!(config.storage.public_url.is_none());
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "upload-admin.toml",
                r#"
                [storage]
                dsn = "file:///var/uploads"
                public_url = "https://cdn.example.com"

                [admin]
                reference_check_limit = 50
                request_timeout = "5s"

                [[references]]
                collection = "reports"
                field = "attachment_key"
                "#,
            )?;

            let config = Figment::from(Serialized::defaults(Configuration::default()))
                .merge(Toml::file("upload-admin.toml"))
                .extract::<Configuration>()
                .unwrap();

            assert_eq!(config.storage.dsn, "file:///var/uploads");
            assert_eq!(
                config.storage.public_url.as_deref(),
                Some("https://cdn.example.com")
            );
            assert_eq!(config.admin.reference_check_limit, 50);
            assert_eq!(config.admin.request_timeout, Duration::from_secs(5));
            // A [[references]] list in the file replaces the default sources
            assert_eq!(
                config.references,
                vec![ReferenceSource::new("reports", "attachment_key")]
            );
            Ok(())
        });
    }

    #[test]
    fn test_identifier_validation() {
        assert!(ReferenceSource::new("pets", "photo_key").is_valid());
        assert!(ReferenceSource::new("_audit", "key2").is_valid());
        assert!(!ReferenceSource::new("pets;drop", "photo_key").is_valid());
        assert!(!ReferenceSource::new("", "photo_key").is_valid());
        assert!(!ReferenceSource::new("pets", "photo key").is_valid());
        assert!(!ReferenceSource::new("1pets", "photo_key").is_valid());
    }
}
