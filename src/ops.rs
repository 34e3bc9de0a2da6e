//! Compiler operations and the `CompileResult` returned to callers.
//!
//! Provides the logic behind `optgen compile`, `optgen check` and
//! `optgen settings`. Each operation takes already-resolved inputs; the
//! builder decides where those come from.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::OptgenError;
use crate::persist::write_atomic;
use crate::render::{Unit, render};
use crate::resolve::CompiledSpec;
use crate::settings::Settings;
use crate::types::{OutputPath, Provenance, Target};

/// Result of a compiler operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileResult {
    /// A generated file was written.
    Written {
        path: PathBuf,
        target: Target,
        summary: Summary,
    },
    /// The specification resolved and validated cleanly.
    Checked { source: PathBuf, summary: Summary },
    /// The validated tree as pretty-printed JSON.
    Dump(String),
    /// A commented settings template.
    Template(String),
}

/// Counts describing one compiled specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Options at every nesting level.
    pub options: usize,
    pub names: usize,
    pub values: usize,
    pub files: usize,
    pub copies: usize,
}

impl Summary {
    pub fn of(spec: &CompiledSpec) -> Self {
        Self {
            options: spec.option_count(),
            names: spec.identifiers.names.len(),
            values: spec.identifiers.values.len(),
            files: spec.files.len(),
            copies: spec.copies,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} option(s), {} name constant(s), {} value constant(s) from {} file(s)",
            self.options, self.names, self.values, self.files
        )
    }
}

impl fmt::Display for CompileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileResult::Written {
                path,
                target,
                summary,
            } => writeln!(f, "Wrote {} ({target}): {summary}", path.display()),
            CompileResult::Checked { source, summary } => {
                writeln!(f, "{} is valid: {summary}", source.display())
            }
            CompileResult::Dump(json) => writeln!(f, "{json}"),
            CompileResult::Template(t) => write!(f, "{t}"),
        }
    }
}

/// Render `spec` and write it atomically to `output`.
pub fn emit(
    spec: &CompiledSpec,
    output: &OutputPath,
    provenance: &Provenance,
    overwrite: bool,
) -> Result<CompileResult, OptgenError> {
    // Root attributes are checked before anything touches the filesystem.
    let unit = Unit::new(spec, &output.path, provenance)?;
    write_atomic(&output.path, overwrite, |out| render(output.target, &unit, out))?;
    Ok(CompileResult::Written {
        path: output.path.clone(),
        target: output.target,
        summary: Summary::of(spec),
    })
}

/// Report on a compiled spec without writing anything.
pub fn check(spec: &CompiledSpec, json: bool) -> Result<CompileResult, OptgenError> {
    if json {
        return Ok(CompileResult::Dump(serde_json::to_string_pretty(spec)?));
    }
    Ok(CompileResult::Checked {
        source: spec.source.clone(),
        summary: Summary::of(spec),
    })
}

/// Generate a commented TOML template from the settings' doc comments.
pub fn settings_template() -> CompileResult {
    CompileResult::Template(Settings::template())
}
