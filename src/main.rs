use std::process::ExitCode;

use clap::Parser;
use optgen::cli::Cli;
use optgen::{Compiler, OptgenError, Settings};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            report(err);
            ExitCode::from(code)
        }
    }
}

fn run() -> Result<(), OptgenError> {
    let invocation = Cli::parse().into_invocation();
    let settings = Settings::load(invocation.overrides)?;
    init_logging(settings.verbosity);

    let mut builder = Compiler::builder().settings(&settings);
    if let Some(source) = invocation.source {
        builder = builder.source(source);
    }
    if let Some(destination) = invocation.destination {
        builder = builder.destination(destination);
    }
    builder.handle_and_print(&invocation.action)
}

/// `RUST_LOG` wins; otherwise the verbosity setting picks the level.
fn init_logging(verbosity: u8) {
    let fallback = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(feature = "rich-errors")]
fn report(err: OptgenError) {
    eprintln!("{:?}", miette::Report::new(err));
}

#[cfg(not(feature = "rich-errors"))]
fn report(err: OptgenError) {
    eprintln!("Error: {err}");
}
