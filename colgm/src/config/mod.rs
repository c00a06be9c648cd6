//! Code generation configuration
//!
//! Settings come from the `[codegen]` table of a `colgm.toml` file; CLI
//! flags override whatever the file says.
//!
//! ```toml
//! [codegen]
//! target_triple = "x86_64-pc-linux-gnu"
//! debug_info = true
//! verify = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Default config file name looked up next to the input
pub const CONFIG_FILE_NAME: &str = "colgm.toml";

/// Lowering and printing options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Target triple, host triple when unset
    pub target_triple: Option<String>,
    /// Serialize debug records and `!dbg` references
    pub debug_info: bool,
    /// Producer string of the compile unit
    pub producer: String,
    /// Run the SIR verifier after lowering
    pub verify: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            target_triple: None,
            debug_info: true,
            producer: format!("colgm compiler version {}", env!("CARGO_PKG_VERSION")),
            verify: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    codegen: CodegenConfig,
}

impl CodegenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `[codegen]` table of a config file body
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.codegen)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CompileError::config_error(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Triple written into the module header
    pub fn resolved_target_triple(&self) -> String {
        self.target_triple
            .clone()
            .unwrap_or_else(default_target_triple)
    }
}

/// Triple of the host platform
pub fn default_target_triple() -> String {
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    {
        "x86_64-pc-linux-gnu".to_string()
    }
    #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
    {
        "aarch64-unknown-linux-gnu".to_string()
    }
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    {
        "arm64-apple-macosx12.0.0".to_string()
    }
    #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
    {
        "x86_64-apple-darwin".to_string()
    }
    #[cfg(target_os = "windows")]
    {
        "x86_64-pc-windows-msvc".to_string()
    }
    #[cfg(not(any(
        all(target_os = "linux", any(target_arch = "x86_64", target_arch = "aarch64")),
        target_os = "macos",
        target_os = "windows"
    )))]
    {
        "x86_64-pc-linux-gnu".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CodegenConfig::default();
        assert!(config.debug_info);
        assert!(!config.verify);
        assert!(config.producer.starts_with("colgm compiler version "));
        assert!(!config.resolved_target_triple().is_empty());
    }

    #[test]
    fn test_parse_codegen_table() {
        let config = CodegenConfig::from_toml_str(
            r#"
            [codegen]
            target_triple = "arm64-apple-macosx12.0.0"
            debug_info = false
            "#,
        )
        .unwrap();
        assert_eq!(config.resolved_target_triple(), "arm64-apple-macosx12.0.0");
        assert!(!config.debug_info);
        assert!(config.producer.starts_with("colgm"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = CodegenConfig::from_toml_str("").unwrap();
        assert_eq!(config, CodegenConfig::default());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = CodegenConfig::from_toml_str("[codegen\n").unwrap_err();
        assert!(matches!(err, CompileError::Config { .. }));
    }
}
