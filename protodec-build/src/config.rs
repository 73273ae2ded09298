//! Configuration for decoder synthesis.

use std::collections::{HashMap, HashSet};

/// Configuration for decoder synthesis.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the runtime crate emitted code refers to.
    pub(crate) runtime_crate: String,

    /// Maps fully-qualified message names to Rust paths of types defined
    /// elsewhere. Such types must implement `DecodeMessage`.
    pub(crate) extern_paths: HashMap<String, String>,

    /// Message types whose nested instances are obtained from a pool.
    pub(crate) pooled: HashSet<String>,

    /// Keep the raw bytes of unrecognized fields on each message.
    pub(crate) preserve_unknown_fields: bool,

    /// Disable formatting with prettyplease.
    pub(crate) skip_format: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_crate: "::protodec".to_string(),
            extern_paths: HashMap::new(),
            pooled: HashSet::new(),
            preserve_unknown_fields: true,
            skip_format: false,
        }
    }
}

impl Config {
    /// Create a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path emitted code uses to reach the runtime crate, e.g.
    /// `"::my_crate::protodec"` when it is re-exported.
    pub fn runtime_crate(&mut self, path: impl Into<String>) -> &mut Self {
        self.runtime_crate = path.into();
        self
    }

    /// Declare an externally provided message type. Names under
    /// `google.protobuf.` are ignored; they always use the shared decoder.
    ///
    /// # Example
    /// ```ignore
    /// config.extern_path("shared.Header", "crate::shared::Header");
    /// ```
    pub fn extern_path(
        &mut self,
        proto_path: impl Into<String>,
        rust_path: impl Into<String>,
    ) -> &mut Self {
        let proto_path = proto_path.into();
        self.extern_paths
            .insert(proto_path.trim_start_matches('.').to_string(), rust_path.into());
        self
    }

    /// Obtain nested instances of `message` through `Pooled::acquire`.
    pub fn pool(&mut self, message: impl Into<String>) -> &mut Self {
        let message = message.into();
        self.pooled
            .insert(message.trim_start_matches('.').to_string());
        self
    }

    /// Whether messages keep unrecognized fields. Enabled by default.
    pub fn preserve_unknown_fields(&mut self, preserve: bool) -> &mut Self {
        self.preserve_unknown_fields = preserve;
        self
    }

    /// Skip formatting with prettyplease.
    pub fn skip_format(&mut self) -> &mut Self {
        self.skip_format = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_names() {
        let mut config = Config::new();
        config
            .extern_path(".shared.Header", "crate::Header")
            .pool(".demo.Node")
            .preserve_unknown_fields(false);

        assert_eq!(config.extern_paths["shared.Header"], "crate::Header");
        assert!(config.pooled.contains("demo.Node"));
        assert!(!config.preserve_unknown_fields);
        assert_eq!(config.runtime_crate, "::protodec");
    }
}
