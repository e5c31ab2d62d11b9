use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("midi output '{identifier}' not found (available: {})", available.join(", "))]
    NotFound {
        identifier: String,
        available: Vec<String>,
    },
    #[error("failed to open midi output {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to send {kind} to '{port}': {source}")]
    Send {
        port: String,
        kind: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("midi output '{0}' is closed")]
    Closed(String),
}
