//! Clap adapter for the `optgen` binary.
//!
//! Compiled only when the `clap` Cargo feature is enabled (on by default).
//! Parsed arguments are turned into an [`Invocation`]: a
//! [`CompileAction`](crate::CompileAction), the paths the builder needs, and
//! settings overrides for every flag the user actually passed. From there all
//! logic flows through the clap-free
//! [`CompilerBuilder::handle()`](crate::CompilerBuilder::handle) API.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use toml::Value;

use crate::types::CompileAction;

/// Compile XML configuration option specifications into validator sources.
#[derive(Debug, Parser)]
#[command(name = "optgen", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve, validate and write the generated source.
    Compile(CompileArgs),
    /// Resolve and validate only.
    Check(CheckArgs),
    /// Print a commented settings file template.
    Settings,
}

/// Flags shared by every command that reads a specification.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Root specification file.
    #[arg(short = 'f', long = "filename")]
    pub filename: PathBuf,

    /// Extra include directories, colon-delimited.
    #[arg(short = 'd', long = "dirs")]
    pub dirs: Option<String>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output file, or a directory to receive `<source stem>.<ext>`.
    #[arg(short = 'o', long = "outdir")]
    pub output: PathBuf,

    /// Replace an existing output file.
    #[arg(long)]
    pub overwrite: bool,

    /// Author recorded in the header.
    #[arg(long)]
    pub user: Option<String>,

    /// Author e-mail recorded in the header.
    #[arg(long)]
    pub email: Option<String>,

    /// Output dialect.
    #[arg(long, value_parser = ["cpp", "rust"])]
    pub target: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the validated option tree as JSON.
    #[arg(long)]
    pub json: bool,
}

/// A parsed command line, independent of clap.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub action: CompileAction,
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    /// Settings keys set on the command line, highest priority.
    pub overrides: Vec<(String, Value)>,
}

impl SourceArgs {
    fn overrides(&self, out: &mut Vec<(String, Value)>) {
        if let Some(dirs) = &self.dirs {
            out.push(("search_dirs".into(), Value::String(dirs.clone())));
        }
        if self.verbose > 0 {
            out.push(("verbosity".into(), Value::Integer(i64::from(self.verbose))));
        }
    }
}

impl Cli {
    /// Convert clap-parsed args into an [`Invocation`]. Flags left unset
    /// produce no override, so settings files and environment still apply.
    pub fn into_invocation(self) -> Invocation {
        let mut overrides = Vec::new();
        match self.command {
            Command::Compile(args) => {
                args.source.overrides(&mut overrides);
                if args.overwrite {
                    overrides.push(("overwrite".into(), Value::Boolean(true)));
                }
                let optional = [
                    ("author", args.user),
                    ("email", args.email),
                    ("target", args.target),
                ];
                for (key, value) in optional {
                    if let Some(v) = value {
                        overrides.push((key.into(), Value::String(v)));
                    }
                }
                Invocation {
                    action: CompileAction::Compile,
                    source: Some(args.source.filename),
                    destination: Some(args.output),
                    overrides,
                }
            }
            Command::Check(args) => {
                args.source.overrides(&mut overrides);
                Invocation {
                    action: CompileAction::Check { json: args.json },
                    source: Some(args.source.filename),
                    destination: None,
                    overrides,
                }
            }
            Command::Settings => Invocation {
                action: CompileAction::SettingsTemplate,
                source: None,
                destination: None,
                overrides,
            },
        }
    }
}
