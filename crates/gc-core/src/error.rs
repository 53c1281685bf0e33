use std::path::PathBuf;

use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Fichier de configuration illisible.
    #[error("Impossible de lire {path} : {source}")]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Invalid grid dimensions.
    #[error("Grille invalide : {cols}×{rows}")]
    InvalidDimensions {
        /// Column count.
        cols: u16,
        /// Row count.
        rows: u16,
    },
}
