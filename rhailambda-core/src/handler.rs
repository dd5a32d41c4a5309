//! Handler specifier parsing

use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Source extension appended to the module name
pub const MODULE_EXTENSION: &str = "rhai";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerSpecError {
    #[error("Handler '{0}' has no '.' separating module and function")]
    MissingSeparator(String),

    #[error("Handler '{0}' has an empty module name")]
    EmptyModule(String),

    #[error("Handler '{0}' has an empty function name")]
    EmptyFunction(String),
}

/// Module file and entry point derived from a `module.function` specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    /// Module file name, extension included
    pub module_file: String,
    /// Entry point called for every invocation
    pub function: String,
}

impl HandlerSpec {
    /// Split at the first `.`; everything after it names the function
    pub fn parse(spec: &str) -> Result<Self, HandlerSpecError> {
        let (module, function) = spec
            .split_once('.')
            .ok_or_else(|| HandlerSpecError::MissingSeparator(spec.to_string()))?;

        if module.is_empty() {
            return Err(HandlerSpecError::EmptyModule(spec.to_string()));
        }
        if function.is_empty() {
            return Err(HandlerSpecError::EmptyFunction(spec.to_string()));
        }

        Ok(Self {
            module_file: format!("{}.{}", module, MODULE_EXTENSION),
            function: function.to_string(),
        })
    }

    /// Module path relative to a task root
    pub fn module_path(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(&self.module_file)
    }
}

impl FromStr for HandlerSpec {
    type Err = HandlerSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
