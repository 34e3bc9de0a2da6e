use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Output dialect of a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Header for a C++ `config::validator` runtime.
    #[default]
    Cpp,
    /// Self-contained Rust module.
    Rust,
}

impl Target {
    /// Extension of files written for this target.
    pub fn extension(self) -> &'static str {
        match self {
            Target::Cpp => "hpp",
            Target::Rust => "rs",
        }
    }

    /// Guess the target from a destination file name: `.rs` means Rust,
    /// anything else C++.
    pub fn infer(destination: &Path) -> Self {
        match destination.extension().and_then(|e| e.to_str()) {
            Some("rs") => Target::Rust,
            _ => Target::Cpp,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Target::Cpp => "cpp",
            Target::Rust => "rust",
        })
    }
}

/// A compiler operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileAction {
    /// Resolve, validate and write the generated source.
    Compile,
    /// Resolve and validate only. With `json`, dump the validated tree.
    Check { json: bool },
    /// Print the commented settings template.
    SettingsTemplate,
}

/// Author metadata recorded in generated headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provenance {
    pub author: String,
    pub email: Option<String>,
    /// Already formatted `YYYY-MM-DD HH:MM:SS`.
    pub created: String,
}

impl Provenance {
    /// `Name <email>` or just `Name`.
    pub fn signature(&self) -> String {
        match &self.email {
            Some(email) if !email.is_empty() => format!("{} <{email}>", self.author),
            _ => self.author.clone(),
        }
    }
}

/// Where the generated file goes once the destination is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    pub path: PathBuf,
    pub target: Target,
}
