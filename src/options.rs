//! Compiler options.
//!
//! Every field has a default, so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("option '{0}' must not be empty")]
    Empty(&'static str),

    #[error("event prefix '{0}' must be lowercase ASCII letters")]
    EventPrefix(String),
}

fn default_root_namespace() -> String {
    "App".to_string()
}

fn default_base_type() -> String {
    "ComponentBase".to_string()
}

fn default_usings() -> Vec<String> {
    vec![
        "System".to_string(),
        "System.Collections.Generic".to_string(),
        "Microsoft.AspNetCore.Components".to_string(),
        "Microsoft.AspNetCore.Components.Rendering".to_string(),
    ]
}

fn default_builder_name() -> String {
    "__builder".to_string()
}

fn default_builder_type() -> String {
    "RenderTreeBuilder".to_string()
}

fn default_output_extension() -> String {
    "g.cs".to_string()
}

fn default_event_prefixes() -> Vec<String> {
    vec!["on".to_string()]
}

fn default_stylesheet_attach_method() -> String {
    "AttachStyleSheet".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Namespace prefix; the source directory path is appended to it.
    #[serde(default = "default_root_namespace")]
    pub root_namespace: String,
    /// Base type when a file has no `@inherits`.
    #[serde(default = "default_base_type")]
    pub default_base_type: String,
    #[serde(default = "default_usings")]
    pub default_usings: Vec<String>,
    #[serde(default = "default_builder_name")]
    pub builder_name: String,
    #[serde(default = "default_builder_type")]
    pub builder_type: String,
    /// Extension of generated files, without the leading dot.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
    #[serde(default = "default_event_prefixes")]
    pub event_prefixes: Vec<String>,
    #[serde(default = "default_true")]
    pub emit_line_directives: bool,
    /// Report every semantic error of a file instead of only the first.
    #[serde(default)]
    pub strict: bool,
    /// Attach `Name.css` next to `Name.razor` automatically.
    #[serde(default)]
    pub sibling_stylesheets: bool,
    #[serde(default = "default_stylesheet_attach_method")]
    pub stylesheet_attach_method: String,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            root_namespace: default_root_namespace(),
            default_base_type: default_base_type(),
            default_usings: default_usings(),
            builder_name: default_builder_name(),
            builder_type: default_builder_type(),
            output_extension: default_output_extension(),
            event_prefixes: default_event_prefixes(),
            emit_line_directives: true,
            strict: false,
            sibling_stylesheets: false,
            stylesheet_attach_method: default_stylesheet_attach_method(),
            parallel: true,
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: CompileOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        let required = [
            ("builderName", &self.builder_name),
            ("builderType", &self.builder_type),
            ("defaultBaseType", &self.default_base_type),
            ("outputExtension", &self.output_extension),
            ("stylesheetAttachMethod", &self.stylesheet_attach_method),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(OptionsError::Empty(name));
            }
        }
        for prefix in &self.event_prefixes {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_lowercase()) {
                return Err(OptionsError::EventPrefix(prefix.clone()));
            }
        }
        Ok(())
    }
}
