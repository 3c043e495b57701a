//! # Template Compiler
//!
//! Translates templates that mix markup, `@` expressions, control directives
//! and an `@code` block into host-language source modules. Each module defines
//! one partial class whose `BuildRenderTree` routine replays the template as
//! render-tree calls.
//!
//! ## Pipeline
//!
//! 1. **Lexer** (`lexer`, `expression`): one token stream, never fails.
//! 2. **Parser** (`parse`): document tree, metadata directives, `@code`.
//! 3. **Analysis** (`analyze`, `component`): sequence numbers, tag resolution,
//!    attribute classification, stylesheet paths.
//! 4. **Codegen** (`codegen`, `finalize`): source text, `#line` directives,
//!    source map, fingerprinted output name.
//! 5. **Driver** (`driver`): per-file isolation, parallel batches, output sinks.
//!
//! ## Invariants
//!
//! 1. Sequence numbers are assigned depth-first in pre-order from 0 and are
//!    stable across compiles of the same source.
//! 2. Every `OpenElement`/`OpenComponent` is matched by one `CloseElement`.
//! 3. A failing file produces no output and never aborts its siblings.
//! 4. The component registry is frozen before any file is compiled.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod analyze;
pub mod cache;
pub mod codegen;
pub mod component;
pub mod driver;
pub mod expression;
pub mod finalize;
pub mod lexer;
pub mod options;
pub mod parse;
pub mod validate;
pub mod visitor;

#[cfg(test)]
mod analyze_tests;
#[cfg(test)]
mod component_tests;
#[cfg(test)]
mod driver_tests;
#[cfg(test)]
mod parse_tests;

pub use analyze::{analyze, classify_attribute, Analysis};
pub use cache::{fingerprint, output_file_name, WriteOutcome};
pub use codegen::SourceMapping;
pub use component::{
    ComponentBinding, ComponentRegistration, ComponentRegistry, RegistryError, TargetType,
};
pub use driver::{
    compile_all, compile_file, compile_registered, compile_source, compile_to_dir, BatchOutput,
    DriverError, FileFailure, FsOutput, MemoryOutput, OutputSink, SinkError, SourceFile,
};
pub use finalize::CompiledUnit;
pub use lexer::{tokenize, Token, TokenKind};
pub use options::{CompileOptions, OptionsError};
pub use parse::parse_template;
pub use validate::*;

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile one template from Node. Returns `{ unit }` on success or
/// `{ failure }` with diagnostics; malformed options or registry JSON is a
/// thrown error.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_template_native(
    source: String,
    file_path: String,
    options_json: Option<String>,
    registry_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = match options_json {
        Some(json) => CompileOptions::from_json(&json)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompileOptions::default(),
    };

    let registrations: Vec<ComponentRegistration> = match registry_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid registry: {}", e)))?,
        None => Vec::new(),
    };
    let registry = ComponentRegistry::from_registrations(&registrations)
        .map_err(|e| napi::Error::from_reason(DriverError::from(e).to_string()))?;

    let result = match compile_source(&file_path, &source, &registry, &options) {
        Ok(unit) => serde_json::json!({ "unit": unit }),
        Err(failure) => serde_json::json!({ "failure": failure }),
    };
    Ok(result)
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_bridge() -> String {
    "Template Compiler Native Bridge Connected".to_string()
}
