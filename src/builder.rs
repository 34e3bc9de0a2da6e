use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;

use crate::error::OptgenError;
use crate::identity::{SystemIdentity, resolve_identity};
use crate::ops::{self, CompileResult};
use crate::persist::resolve_output;
use crate::resolve::compile_spec;
use crate::settings::Settings;
use crate::types::{CompileAction, Provenance, Target};

/// Entry point for configuring a compilation.
pub struct Compiler;

impl Compiler {
    pub fn builder() -> CompilerBuilder {
        CompilerBuilder::default()
    }
}

/// Builder for one compiler invocation.
///
/// Everything a run needs is set here; [`handle`](Self::handle) performs
/// the requested [`CompileAction`].
#[derive(Debug, Clone, Default)]
pub struct CompilerBuilder {
    source: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
    destination: Option<PathBuf>,
    overwrite: bool,
    author: Option<String>,
    email: Option<String>,
    target: Option<Target>,
    created_at: Option<String>,
}

impl CompilerBuilder {
    /// Apply a loaded settings record. Call before the individual setters
    /// so explicit values win.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.search_dirs.extend(settings.search_dirs.iter().cloned());
        self.overwrite = settings.overwrite;
        self.author = settings.author.clone().or(self.author);
        self.email = settings.email.clone().or(self.email);
        self.target = settings.target.or(self.target);
        self
    }

    /// The root specification file.
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Replace the include search directories.
    ///
    /// The directory of the source file is always searched first; these
    /// follow in order.
    pub fn search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Append one include search directory.
    pub fn add_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Output file, or a directory to receive `<source stem>.<ext>`.
    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    /// Replace an existing destination (default: `false`).
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Output dialect. Inferred from the destination extension when unset.
    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Fix the header timestamp instead of reading the clock.
    pub fn created_at(mut self, stamp: &str) -> Self {
        self.created_at = Some(stamp.to_string());
        self
    }

    fn effective_source(&self) -> Result<&Path, OptgenError> {
        self.source.as_deref().ok_or(OptgenError::SourceRequired)
    }

    fn effective_destination(&self) -> Result<&Path, OptgenError> {
        self.destination
            .as_deref()
            .ok_or(OptgenError::DestinationRequired)
    }

    fn provenance(&self) -> Provenance {
        let (author, email) = resolve_identity(
            &SystemIdentity,
            self.author.as_deref(),
            self.email.as_deref(),
        );
        Provenance {
            author,
            email,
            created: self.created_at.clone().unwrap_or_else(timestamp),
        }
    }

    /// Handle a `CompileAction` and print the result to stdout.
    pub fn handle_and_print(self, action: &CompileAction) -> Result<(), OptgenError> {
        let result = self.handle(action)?;
        print!("{result}");
        Ok(())
    }

    /// Handle a `CompileAction` (compile / check / settings template).
    pub fn handle(self, action: &CompileAction) -> Result<CompileResult, OptgenError> {
        match action {
            CompileAction::Compile => {
                let source = self.effective_source()?;
                let output = resolve_output(self.effective_destination()?, source, self.target)?;
                debug!("Compiling {} into {}", source.display(), output.path.display());
                let spec = compile_spec(source, &self.search_dirs)?;
                ops::emit(&spec, &output, &self.provenance(), self.overwrite)
            }
            CompileAction::Check { json } => {
                let spec = compile_spec(self.effective_source()?, &self.search_dirs)?;
                ops::check(&spec, *json)
            }
            CompileAction::SettingsTemplate => Ok(ops::settings_template()),
        }
    }
}

/// Local wall-clock time, or UTC when the local offset is unknown.
fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_default()
}
