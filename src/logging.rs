//! Tracing subscriber setup shared by both binaries.
//!
//! Filter priority: `FARECAST_LOG`, then `RUST_LOG`, then the level implied
//! by the `-v` / `-q` flags. The batch tool logs to stderr; the terminal
//! front-end owns the screen, so it logs to a file or nowhere.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FARECAST_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are given.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Where formatted events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Appended to, created if missing.
    File(PathBuf),
    Discard,
}

/// Builds the writer for `target` and whether it should carry ANSI colours.
fn make_writer(target: &LogTarget) -> io::Result<(BoxMakeWriter, bool)> {
    Ok(match target {
        LogTarget::Stderr => (BoxMakeWriter::new(io::stderr), io::stderr().is_terminal()),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        LogTarget::Discard => (BoxMakeWriter::new(io::sink), false),
    })
}

/// Installs the global subscriber. Call once, first thing in `main`.
pub fn init_subscriber(verbosity: Verbosity, target: &LogTarget) -> io::Result<()> {
    let (writer, ansi) = make_writer(target)?;
    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(verbosity == Verbosity::Verbose)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(build_env_filter(verbosity))
        .with(fmt_layer)
        .init();
    Ok(())
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    // Unparseable directives fall through to the next source.
    if let Some(filter) = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(verbosity.default_level().as_str().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::Quiet.default_level(), Level::ERROR);
    }

    #[test]
    fn test_file_target_receives_output() {
        use std::io::Write;
        use tracing_subscriber::fmt::MakeWriter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farecast.log");
        let (writer, ansi) = make_writer(&LogTarget::File(path.clone())).unwrap();
        assert!(!ansi);
        writer.make_writer().write_all(b"swapped in reloaded model\n").unwrap();
        writer.make_writer().write_all(b"quoted fare\n").unwrap();

        let logged = std::fs::read_to_string(&path).unwrap();
        assert_eq!(logged, "swapped in reloaded model\nquoted fare\n");
    }

    #[test]
    fn test_file_target_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = LogTarget::File(dir.path().join("absent").join("farecast.log"));
        assert!(make_writer(&target).is_err());
    }
}
