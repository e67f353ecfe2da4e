use std::io;

use thiserror::Error;

/// Shell-level error categories, matching the behavioral kinds a caller must
/// branch on: some are recoverable (discard the line, keep the REPL going),
/// one is fatal (no way back once a first stage has forked).
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Invalid command syntax")]
    Parse,

    #[error("{0}")]
    RedirectOpen(String),

    #[error("spawn failed: {0}")]
    Spawn(#[source] io::Error),
}
