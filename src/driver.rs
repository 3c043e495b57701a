//! Driver Module for the template compiler
//!
//! Runs lexer, parser, analyzer and generator for each file and hands the
//! results to an output sink. Per-file failures never stop sibling files; only
//! batch-fatal errors (ambiguous or unfrozen registry, bad options, lost output
//! directory) stop new files from being launched.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::analyze::analyze;
use crate::cache::{compute_hash, fingerprint, OutputCache, WriteOutcome};
use crate::codegen::{generate, CodegenInput};
use crate::component::{ComponentRegistration, ComponentRegistry, RegistryError};
use crate::finalize::{derive_namespace, derive_type_name, finalize_unit, CompiledUnit};
use crate::options::{CompileOptions, OptionsError};
use crate::parse::parse_template;
use crate::validate::{CompileError, Diagnostic};

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS AND RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("component registry must be frozen before compilation")]
    RegistryNotFrozen,

    #[error("{code}: {0}", code = .0.kind().code())]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error("output directory {path} is not usable: {source}")]
    OutputDirectory {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("output directory {path} disappeared during the batch")]
    OutputLost { path: String },
}

/// A file that failed to compile. Holds its first diagnostic, or all of them
/// in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileFailure {
    fn from_errors(path: &str, errors: &[CompileError]) -> Self {
        Self {
            path: path.to_string(),
            diagnostics: errors
                .iter()
                .map(|e| Diagnostic::from_error(path, e))
                .collect(),
        }
    }

    fn io(path: &str, error: &io::Error) -> Self {
        Self {
            path: path.to_string(),
            diagnostics: vec![Diagnostic::io(path, error)],
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchOutput {
    /// Compiled units in input order.
    pub units: Vec<CompiledUnit>,
    pub failures: Vec<FileFailure>,
    /// Files not compiled or not written because of a fatal error.
    pub skipped: Vec<String>,
    /// Units whose output file was already identical.
    pub unchanged: usize,
    pub fatal: Option<DriverError>,
}

impl BatchOutput {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.fatal.is_none()
    }

    fn fatal(error: DriverError) -> Self {
        Self {
            fatal: Some(error),
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT SINKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum SinkError {
    /// Only this file is affected.
    #[error("cannot write {name}: {source}")]
    File {
        name: String,
        #[source]
        source: io::Error,
    },

    /// No further output can be written.
    #[error("output is no longer writable: {0}")]
    Fatal(String),
}

pub trait OutputSink: Send + Sync {
    fn write(&self, unit: &CompiledUnit) -> Result<WriteOutcome, SinkError>;
}

/// Writes units into a directory, skipping files whose bytes are unchanged.
pub struct FsOutput {
    cache: OutputCache,
}

impl FsOutput {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, DriverError> {
        let dir = dir.as_ref();
        let invalid = |source: io::Error| DriverError::OutputDirectory {
            path: dir.display().to_string(),
            source,
        };
        fs::create_dir_all(dir).map_err(invalid)?;
        if !dir.is_dir() {
            return Err(invalid(io::Error::new(
                io::ErrorKind::Other,
                "path exists and is not a directory",
            )));
        }
        Ok(Self {
            cache: OutputCache::new(dir),
        })
    }

    pub fn dir(&self) -> &Path {
        self.cache.dir()
    }
}

impl OutputSink for FsOutput {
    fn write(&self, unit: &CompiledUnit) -> Result<WriteOutcome, SinkError> {
        if !self.cache.dir().is_dir() {
            return Err(SinkError::Fatal(self.cache.dir().display().to_string()));
        }
        self.cache
            .store(&unit.output_file_name, unit.generated_source.as_bytes())
            .map_err(|source| SinkError::File {
                name: unit.output_file_name.clone(),
                source,
            })
    }
}

/// Keeps output in memory, keyed by output file name.
#[derive(Default)]
pub struct MemoryOutput {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> BTreeMap<String, String> {
        self.files
            .lock()
            .map(|files| files.clone())
            .unwrap_or_default()
    }
}

impl OutputSink for MemoryOutput {
    fn write(&self, unit: &CompiledUnit) -> Result<WriteOutcome, SinkError> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| SinkError::Fatal("output store poisoned".to_string()))?;
        if files.get(&unit.output_file_name) == Some(&unit.generated_source) {
            return Ok(WriteOutcome::Unchanged);
        }
        files.insert(
            unit.output_file_name.clone(),
            unit.generated_source.clone(),
        );
        Ok(WriteOutcome::Written)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE FILE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceFile {
    /// Project-relative path with `/` separators.
    pub path: String,
    pub source: String,
    /// Stylesheets attached in addition to `@attribute [StyleSheet]`.
    pub extra_stylesheets: Vec<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            extra_stylesheets: Vec::new(),
        }
    }
}

/// Compile one file in memory. Touches no shared state besides the registry.
pub fn compile_file(
    file: &SourceFile,
    registry: &ComponentRegistry,
    options: &CompileOptions,
) -> Result<CompiledUnit, FileFailure> {
    let path = file.path.as_str();
    let fail = |errors: Vec<CompileError>| FileFailure::from_errors(path, &errors);

    let mut document = parse_template(&file.source, path).map_err(|e| fail(vec![e]))?;
    debug!(
        "{}: parsed {} nodes, {} metadata directives",
        path,
        document.nodes.len(),
        document.metadata.len()
    );

    let mut analysis = analyze(&mut document, registry, options).map_err(fail)?;
    for extra in &file.extra_stylesheets {
        if !analysis.stylesheets.contains(extra) {
            analysis.stylesheets.push(extra.clone());
        }
    }

    let source_file_hash = compute_hash(file.source.as_bytes());
    let type_name = derive_type_name(path);
    let namespace = derive_namespace(&options.root_namespace, path);
    let generated = generate(&CodegenInput {
        file_path: path,
        type_name: &type_name,
        namespace: &namespace,
        fingerprint: &fingerprint(file.source.as_bytes()),
        document: &document,
        analysis: &analysis,
        options,
    })
    .map_err(|e| fail(vec![e]))?;
    debug!("{}: generated {} lines", path, generated.source.lines().count());

    Ok(finalize_unit(
        path,
        type_name,
        source_file_hash,
        generated,
        &options.output_extension,
    ))
}

pub fn compile_source(
    path: &str,
    source: &str,
    registry: &ComponentRegistry,
    options: &CompileOptions,
) -> Result<CompiledUnit, FileFailure> {
    compile_file(&SourceFile::new(path, source), registry, options)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH
// ═══════════════════════════════════════════════════════════════════════════════

enum FileResult {
    Compiled(CompiledUnit, WriteOutcome),
    Failed(FileFailure),
    Skipped(String),
    OutputLost(String, String),
}

fn relative_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// `Name.css` next to the template, relative to `root`.
fn sibling_stylesheet(root: &Path, relative: &Path) -> Option<String> {
    let css = relative.with_extension("css");
    if root.join(&css).is_file() {
        Some(relative_path(&css))
    } else {
        None
    }
}

fn compile_one(
    root: &Path,
    relative: &Path,
    registry: &ComponentRegistry,
    options: &CompileOptions,
    sink: &dyn OutputSink,
    halt: &AtomicBool,
) -> FileResult {
    let path = relative_path(relative);
    if halt.load(Ordering::SeqCst) {
        return FileResult::Skipped(path);
    }

    let source = match fs::read_to_string(root.join(relative)) {
        Ok(source) => source,
        Err(e) => return FileResult::Failed(FileFailure::io(&path, &e)),
    };

    let mut file = SourceFile::new(path.clone(), source);
    if options.sibling_stylesheets {
        file.extra_stylesheets.extend(sibling_stylesheet(root, relative));
    }

    let unit = match compile_file(&file, registry, options) {
        Ok(unit) => unit,
        Err(failure) => return FileResult::Failed(failure),
    };

    if halt.load(Ordering::SeqCst) {
        return FileResult::Skipped(path);
    }
    match sink.write(&unit) {
        Ok(outcome) => FileResult::Compiled(unit, outcome),
        Err(SinkError::File { source, .. }) => FileResult::Failed(FileFailure::io(&path, &source)),
        Err(SinkError::Fatal(dir)) => {
            halt.store(true, Ordering::SeqCst);
            FileResult::OutputLost(path, dir)
        }
    }
}

/// Compile `files` (relative to `root`) and write each unit to `sink`.
///
/// Files run on the rayon pool unless `options.parallel` is off; results are
/// reported in input order either way.
pub fn compile_all(
    root: &Path,
    files: &[PathBuf],
    registry: &ComponentRegistry,
    options: &CompileOptions,
    sink: &dyn OutputSink,
) -> BatchOutput {
    if !registry.is_frozen() {
        return BatchOutput::fatal(DriverError::RegistryNotFrozen);
    }
    if let Err(e) = options.validate() {
        return BatchOutput::fatal(e.into());
    }

    let halt = AtomicBool::new(false);
    let run = |relative: &PathBuf| compile_one(root, relative, registry, options, sink, &halt);
    let results: Vec<FileResult> = if options.parallel {
        files.par_iter().map(run).collect()
    } else {
        files.iter().map(run).collect()
    };

    let mut batch = BatchOutput::default();
    for result in results {
        match result {
            FileResult::Compiled(unit, outcome) => {
                if outcome == WriteOutcome::Unchanged {
                    batch.unchanged += 1;
                }
                batch.units.push(unit);
            }
            FileResult::Failed(failure) => {
                if let Some(first) = failure.diagnostics.first() {
                    warn!("{}", first);
                }
                batch.failures.push(failure);
            }
            FileResult::Skipped(path) => batch.skipped.push(path),
            FileResult::OutputLost(path, dir) => {
                warn!("{}: not written, output directory {} is gone", path, dir);
                batch.skipped.push(path);
                if batch.fatal.is_none() {
                    batch.fatal = Some(DriverError::OutputLost { path: dir });
                }
            }
        }
    }

    info!(
        "compiled {} file(s): {} failed, {} unchanged, {} skipped",
        files.len(),
        batch.failures.len(),
        batch.unchanged,
        batch.skipped.len()
    );
    batch
}

/// Like [`compile_all`], building the registry from `registrations` first.
/// A conflicting registration is batch-fatal and nothing is compiled.
pub fn compile_registered(
    root: &Path,
    files: &[PathBuf],
    registrations: &[ComponentRegistration],
    options: &CompileOptions,
    sink: &dyn OutputSink,
) -> BatchOutput {
    match ComponentRegistry::from_registrations(registrations) {
        Ok(registry) => compile_all(root, files, &registry, options, sink),
        Err(e) => {
            warn!("component registry rejected: {}", e);
            BatchOutput::fatal(e.into())
        }
    }
}

/// Like [`compile_all`], writing into `out_dir`. An unusable output directory
/// is batch-fatal and nothing is compiled.
pub fn compile_to_dir(
    root: &Path,
    files: &[PathBuf],
    registry: &ComponentRegistry,
    options: &CompileOptions,
    out_dir: &Path,
) -> BatchOutput {
    match FsOutput::new(out_dir) {
        Ok(sink) => compile_all(root, files, registry, options, &sink),
        Err(e) => BatchOutput::fatal(e),
    }
}
