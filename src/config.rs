//! Configuration for backend option defaults
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (rpcgen.toml)
//! - Environment variables (RPCGEN_*)
//!
//! Backend options are explicit, backend-scoped values handed to each
//! orchestrator at construction. Nothing here is global mutable state.
//!
//! ## Example config file (rpcgen.toml):
//! ```toml
//! [typescript]
//! runtime_module = "@rpcgen/runtime"
//!
//! [python]
//! runtime_module = "rpcgen"
//!
//! [go]
//! package = "services"
//! runtime_import = "github.com/rpcgen/sdk-go/rpc"
//! primitive_pointers = false
//! ```

use std::path::Path;

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Option defaults for every backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenConfig {
    #[serde(default)]
    pub typescript: TypeScriptConfig,

    #[serde(default)]
    pub python: PythonConfig,

    #[serde(default)]
    pub go: GoConfig,
}

/// TypeScript backend options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeScriptConfig {
    /// Module the service/operation binding helpers are imported from
    #[serde(default = "default_ts_runtime")]
    pub runtime_module: String,
}

/// Python backend options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Module providing the `service` decorator and `Operation` type
    #[serde(default = "default_py_runtime")]
    pub runtime_module: String,
}

/// Go backend options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoConfig {
    /// Package name for generated files
    #[serde(default = "default_go_package")]
    pub package: String,

    /// Import path of the runtime SDK
    #[serde(default = "default_go_runtime")]
    pub runtime_import: String,

    /// Use pointers for nullable primitives
    #[serde(default)]
    pub primitive_pointers: bool,
}

impl Default for TypeScriptConfig {
    fn default() -> Self {
        Self {
            runtime_module: default_ts_runtime(),
        }
    }
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            runtime_module: default_py_runtime(),
        }
    }
}

impl Default for GoConfig {
    fn default() -> Self {
        Self {
            package: default_go_package(),
            runtime_import: default_go_runtime(),
            primitive_pointers: false,
        }
    }
}

fn default_ts_runtime() -> String {
    "@rpcgen/runtime".to_string()
}

fn default_py_runtime() -> String {
    "rpcgen".to_string()
}

fn default_go_package() -> String {
    "services".to_string()
}

fn default_go_runtime() -> String {
    "github.com/rpcgen/sdk-go/rpc".to_string()
}

impl GenConfig {
    /// Load configuration from an optional file plus RPCGEN_* environment
    /// variables, falling back to defaults for anything unset.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        match file {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None => {
                builder = builder.add_source(File::with_name("rpcgen").required(false));
            }
        }
        let config = builder
            .add_source(Environment::with_prefix("RPCGEN").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GenConfig::default();
        assert_eq!(config.go.package, "services");
        assert!(!config.go.primitive_pointers);
        assert_eq!(config.python.runtime_module, "rpcgen");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[go]\npackage = \"myservices\"").unwrap();
        let config = GenConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.go.package, "myservices");
        // Unset sections keep their defaults.
        assert_eq!(config.typescript.runtime_module, "@rpcgen/runtime");
    }
}
