//! File discovery and loading.
//!
//! # Specification files
//!
//! A compilation starts from one source file and pulls in more through
//! `<include file="..."/>`. Every file name, including the source itself, is
//! looked up the same way by [`SearchDirs::locate`]:
//!
//! 1. the directory holding the source file,
//! 2. each configured search directory in order (`-d/--dirs`, `search_dirs`),
//! 3. the name as given, relative to the working directory.
//!
//! The first existing regular file wins. When none exists the lookup fails
//! with [`OptgenError::FileNotFound`] listing every directory that was tried.
//!
//! # Settings files
//!
//! [`settings_files`] discovers `optgen.toml` in the platform config
//! directory and in the working directory. Both are optional; missing files
//! are silently skipped and only real I/O errors propagate.

use std::path::{Path, PathBuf};

use crate::error::OptgenError;
use crate::tree::{Arena, NodeId};

/// Name of the settings file looked up by [`settings_files`].
pub const SETTINGS_FILE: &str = "optgen.toml";

/// Application name used for the platform config directory.
pub const APP_NAME: &str = "optgen";

/// Ordered list of directories searched for specification files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchDirs {
    dirs: Vec<PathBuf>,
}

impl SearchDirs {
    /// Build the search list for `source`: its own directory first, then
    /// `extra` in the order given. Duplicates are dropped.
    pub fn for_source(source: &Path, extra: &[PathBuf]) -> Self {
        let mut dirs = Vec::new();
        if let Some(parent) = source.parent()
            && !parent.as_os_str().is_empty()
        {
            dirs.push(parent.to_path_buf());
        }
        for dir in extra {
            if !dir.as_os_str().is_empty() && !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Candidate paths for `name`, in lookup order.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = self.dirs.iter().map(|d| d.join(name)).collect();
        out.push(PathBuf::from(name));
        out
    }

    /// Find the file `name` refers to. `included_from` names the file whose
    /// `<include>` asked for it and only feeds the error message.
    pub fn locate(&self, name: &str, included_from: Option<&Path>) -> Result<PathBuf, OptgenError> {
        self.candidates(name)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| OptgenError::FileNotFound {
                name: name.to_string(),
                included_from: included_from.map(Path::to_path_buf),
                searched: self.dirs.clone(),
            })
    }
}

/// Read and parse one specification file into `arena`, returning its root
/// element.
pub fn read_document(arena: &mut Arena, path: &Path) -> Result<NodeId, OptgenError> {
    let text = std::fs::read_to_string(path).map_err(|source| OptgenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    arena.parse_document(&text, path)
}

/// Directories searched for the settings file, lowest priority first.
pub fn settings_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(proj) = directories::ProjectDirs::from("", "", APP_NAME) {
        dirs.push(proj.config_dir().to_path_buf());
    }
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    dirs
}

/// Load every settings file found in `dirs`, in priority order.
pub fn settings_files(dirs: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, OptgenError> {
    let mut results = Vec::new();
    for dir in dirs {
        let file_path = dir.join(SETTINGS_FILE);
        match std::fs::read_to_string(&file_path) {
            Ok(content) => results.push((file_path, content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(OptgenError::Io {
                    path: file_path,
                    source: e,
                });
            }
        }
    }
    Ok(results)
}
