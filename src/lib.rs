//! rpcgen — multi-language binding generator for RPC service definitions
//!
//! Reads a declarative YAML definition of services, operations, and shared
//! types, resolves every referenced type to a collision-free name, and emits
//! per-language service bindings plus the data types they reference.
//!
//! ## Pipeline
//!
//! ```text
//! definition.yaml
//!     │  loader (YAML + document schema validation)
//!     ▼
//! Definition
//!     │  prepare (reference resolution, name synthesis)
//!     ▼
//! PreparedSchema (immutable)
//!     │  backend orchestrator (one per target language)
//!     ▼
//! { relative path → generated source }
//! ```
//!
//! Generation is a pure function of the input documents: nothing is written
//! until a backend run fully succeeds, and runs for different target
//! languages share no mutable state.

pub mod backend;
pub mod config;
pub mod definition;
pub mod error;
pub mod generator;
pub mod loader;
pub mod names;
pub mod prepare;
pub mod render;
pub mod writer;

pub use config::GenConfig;
pub use definition::Definition;
pub use error::{Error, Result};
pub use generator::{Generator, GeneratorOptions};
pub use prepare::{PreparedSchema, TypeReference};
