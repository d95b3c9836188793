//! # Client Configuration
//!
//! Process-wide, read-only settings shared by every operation.

use std::path::{Path, PathBuf};

use super::entities::ProviderIdentity;

/// Settings resolved once at start-up and shared behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Provider on whose behalf every request is issued
    pub provider: ProviderIdentity,

    /// Default message namespace placed on every request root
    pub message_namespace: String,

    /// Namespace paired with the schema file in `xsi:schemaLocation`
    pub schema_namespace: String,

    /// Schema version identifier, e.g. `v03`
    pub schema_version: String,

    /// Directory holding the `schema_nfse_<version>.xsd` files
    pub schemes_dir: PathBuf,

    /// Layout version written to `LoteRps/@versao`
    pub layout_version: String,

    /// Ceiling of RPS per asynchronous lot
    pub async_lot_limit: usize,
}

impl ClientConfig {
    pub const DEFAULT_SCHEMA_VERSION: &'static str = "v03";
    pub const DEFAULT_MESSAGE_NAMESPACE: &'static str = "http://www.publica.inf.br";
    pub const DEFAULT_SCHEMA_NAMESPACE: &'static str = "http://www.publica.inf.br";
    pub const DEFAULT_LAYOUT_VERSION: &'static str = "3";
    pub const DEFAULT_ASYNC_LOT_LIMIT: usize = 50;

    /// Fixed ceiling of RPS per synchronous lot.
    pub const SYNC_LOT_LIMIT: usize = 2;

    /// Configuration with defaults for everything but the provider.
    pub fn new(provider: ProviderIdentity) -> Self {
        Self {
            provider,
            message_namespace: Self::DEFAULT_MESSAGE_NAMESPACE.to_string(),
            schema_namespace: Self::DEFAULT_SCHEMA_NAMESPACE.to_string(),
            schema_version: Self::DEFAULT_SCHEMA_VERSION.to_string(),
            schemes_dir: PathBuf::from("storage/schemes"),
            layout_version: Self::DEFAULT_LAYOUT_VERSION.to_string(),
            async_lot_limit: Self::DEFAULT_ASYNC_LOT_LIMIT,
        }
    }

    pub fn with_schemes_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.schemes_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_async_lot_limit(mut self, limit: usize) -> Self {
        self.async_lot_limit = limit;
        self
    }

    /// File name of the schema for the configured version.
    pub fn schema_file_name(&self) -> String {
        format!("schema_nfse_{}.xsd", self.schema_version)
    }

    /// Full path of the schema every finalized request is validated against.
    pub fn schema_path(&self) -> PathBuf {
        self.schemes_dir.join(self.schema_file_name())
    }

    /// Value of `xsi:schemaLocation` on asynchronous lot envelopes.
    pub fn schema_location(&self) -> String {
        format!("{} {}", self.schema_namespace, self.schema_file_name())
    }
}
