use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::config::ClientConfig;
use crate::domain::entities::{ProviderIdentity, TaxId};
use crate::ports::outbound::ConfigProvider;

// ============================================================================
// StaticConfigProvider - Fixed config for testing and embedding
// ============================================================================

/// Configuration provider wrapping an already built `ClientConfig`.
///
/// Useful for tests and for callers that assemble the configuration
/// themselves. For file-based setups, use `TomlConfigProvider`.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    config: ClientConfig,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn client_config(&self) -> ClientConfig {
        self.config.clone()
    }
}

// ============================================================================
// TomlConfigProvider - File-based config loading
// ============================================================================

/// Configuration file structure.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    provider: ProviderSection,
    #[serde(default)]
    service: ServiceSection,
}

#[derive(Debug, Deserialize)]
struct ProviderSection {
    cnpj: Option<String>,
    cpf: Option<String>,
    /// Municipal registration
    im: String,
    /// IBGE municipality code
    cmun: String,
}

#[derive(Debug, Deserialize, Default)]
struct ServiceSection {
    message_namespace: Option<String>,
    schema_namespace: Option<String>,
    schema_version: Option<String>,
    schemes_dir: Option<PathBuf>,
    layout_version: Option<String>,
    async_lot_limit: Option<usize>,
}

/// TOML-based configuration provider.
///
/// # Config File Format
///
/// ```toml
/// [provider]
/// cnpj = "11222333000181"   # or: cpf = "12345678909"
/// im = "98765"
/// cmun = "4205407"
///
/// [service]
/// message_namespace = "http://www.publica.inf.br"
/// schema_namespace = "http://www.publica.inf.br"
/// schema_version = "v03"
/// schemes_dir = "storage/schemes"
/// layout_version = "3"
/// async_lot_limit = 50
/// ```
///
/// Every `[service]` key is optional.
#[derive(Debug, Clone)]
pub struct TomlConfigProvider {
    config: ClientConfig,
}

impl TomlConfigProvider {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if the provider
    /// identity is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        debug!(path = %path.as_ref().display(), "Loaded client configuration file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// * `ConfigError::Parse` - not valid TOML or missing required keys
    /// * `ConfigError::InvalidProvider` - both or neither of CNPJ and CPF set
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let provider = Self::provider_identity(file.provider)?;

        let mut config = ClientConfig::new(provider);
        let service = file.service;
        if let Some(ns) = service.message_namespace {
            config.message_namespace = ns;
        }
        if let Some(ns) = service.schema_namespace {
            config.schema_namespace = ns;
        }
        if let Some(version) = service.schema_version {
            config.schema_version = version;
        }
        if let Some(dir) = service.schemes_dir {
            config.schemes_dir = dir;
        }
        if let Some(version) = service.layout_version {
            config.layout_version = version;
        }
        if let Some(limit) = service.async_lot_limit {
            config.async_lot_limit = limit;
        }

        Ok(Self { config })
    }

    fn provider_identity(section: ProviderSection) -> Result<ProviderIdentity, ConfigError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let tax_id = match (present(section.cnpj), present(section.cpf)) {
            (Some(cnpj), None) => TaxId::Cnpj(cnpj),
            (None, Some(cpf)) => TaxId::Cpf(cpf),
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidProvider(
                    "cnpj and cpf are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(ConfigError::InvalidProvider(
                    "one of cnpj or cpf is required".to_string(),
                ))
            }
        };

        Ok(ProviderIdentity {
            tax_id,
            municipal_registration: section.im,
            municipality_code: section.cmun,
        })
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn client_config(&self) -> ClientConfig {
        self.config.clone()
    }
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// TOML parsing error.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The provider identity breaks the CNPJ/CPF rule.
    #[error("Invalid provider identity: {0}")]
    InvalidProvider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [provider]
        cnpj = "11222333000181"
        im = "98765"
        cmun = "4205407"
    "#;

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let config = TomlConfigProvider::parse(MINIMAL).unwrap().client_config();

        assert_eq!(
            config.provider.tax_id,
            TaxId::Cnpj("11222333000181".to_string())
        );
        assert_eq!(config.provider.municipal_registration, "98765");
        assert_eq!(config.provider.municipality_code, "4205407");
        assert_eq!(config.schema_version, "v03");
        assert_eq!(config.async_lot_limit, 50);
    }

    #[test]
    fn test_parse_service_overrides() {
        let content = r#"
            [provider]
            cpf = "12345678909"
            im = "1"
            cmun = "2"

            [service]
            schema_version = "v04"
            schemes_dir = "/etc/nfse"
            async_lot_limit = 10
        "#;
        let config = TomlConfigProvider::parse(content).unwrap().client_config();

        assert_eq!(config.provider.tax_id, TaxId::Cpf("12345678909".to_string()));
        assert_eq!(
            config.schema_path(),
            PathBuf::from("/etc/nfse/schema_nfse_v04.xsd")
        );
        assert_eq!(config.async_lot_limit, 10);
        assert_eq!(config.layout_version, "3");
    }

    #[test]
    fn test_rejects_both_tax_ids() {
        let content = r#"
            [provider]
            cnpj = "11222333000181"
            cpf = "12345678909"
            im = "1"
            cmun = "2"
        "#;
        assert!(matches!(
            TomlConfigProvider::parse(content),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_rejects_missing_tax_id() {
        let content = r#"
            [provider]
            cnpj = ""
            im = "1"
            cmun = "2"
        "#;
        assert!(matches!(
            TomlConfigProvider::parse(content),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            TomlConfigProvider::parse("[provider"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = TomlConfigProvider::load("/nonexistent/nfse.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_static_provider() {
        let config = TomlConfigProvider::parse(MINIMAL).unwrap().client_config();
        let provider = StaticConfigProvider::new(config.clone());
        assert_eq!(provider.client_config(), config);
    }
}
