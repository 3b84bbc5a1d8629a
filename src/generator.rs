//! Generation entry point
//!
//! Ties the pipeline together: prepare the definition for a target language,
//! construct that language's backend orchestrator, and collect the generated
//! files. Output is a pure value — a map of relative file path → source —
//! so callers decide what (if anything) touches disk.

use std::collections::BTreeMap;

use tracing::info;

use crate::backend::go::GoBackend;
use crate::backend::python::PythonBackend;
use crate::backend::typescript::TypeScriptBackend;
use crate::backend::{Backend, Orchestrator};
use crate::config::GenConfig;
use crate::definition::Definition;
use crate::error::{Error, Result};
use crate::prepare::prepare;

/// Options shared by every backend run of a generator.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// First input document's base name, used by file naming policies when
    /// the definition holds more than one service
    pub first_file_stem: String,
    /// Backend option defaults
    pub config: GenConfig,
}

/// Generates code from one (merged) definition.
#[derive(Debug)]
pub struct Generator {
    definition: Definition,
    options: GeneratorOptions,
}

impl Generator {
    pub fn new(definition: Definition, options: GeneratorOptions) -> Self {
        Self {
            definition,
            options,
        }
    }

    /// Generate output files for one target language.
    pub fn generate(&self, lang: &str) -> Result<BTreeMap<String, String>> {
        let backend = backend_for(lang, &self.options.config)?;
        let schema = prepare(&self.definition, backend.language_names())?;
        let mut orchestrator = Orchestrator::new(&schema, backend.as_ref())?;
        let files = orchestrator.generate(&self.options.first_file_stem)?;
        info!(
            lang = backend.display_name(),
            files = files.len(),
            types = schema.type_count(),
            "generation complete"
        );
        Ok(files)
    }

    /// Generate for several target languages, isolating failures per
    /// backend: one language failing never affects the others.
    pub fn generate_all(&self, langs: &[&str]) -> Vec<(String, Result<BTreeMap<String, String>>)> {
        langs
            .iter()
            .map(|lang| (lang.to_string(), self.generate(lang)))
            .collect()
    }
}

/// Construct the backend registered under a language name.
pub fn backend_for(lang: &str, config: &GenConfig) -> Result<Box<dyn Backend>> {
    match lang.to_lowercase().as_str() {
        "typescript" | "ts" => Ok(Box::new(TypeScriptBackend::new(config.typescript.clone()))),
        "python" | "py" => Ok(Box::new(PythonBackend::new(config.python.clone()))),
        "go" | "golang" => Ok(Box::new(GoBackend::new(config.go.clone()))),
        other => Err(Error::UnknownLanguage(other.to_string())),
    }
}

/// Language names accepted by `backend_for`, shortest alias first.
pub fn supported_language_names() -> &'static [&'static str] {
    &["ts", "py", "go"]
}
