use ffmpeg_the_third as ffmpeg;
use thiserror::Error;

/// Errors originating from the decode glue.
#[derive(Error, Debug)]
pub enum MediaError {
    /// Source impossible à ouvrir ou à parser. Fatal.
    #[error("Impossible d'ouvrir l'entrée : {0}")]
    Open(ffmpeg::Error),

    /// Aucun flux vidéo dans la source. Fatal.
    #[error("Aucun flux vidéo")]
    NoVideoStream,

    /// Échec d'initialisation d'un codec.
    #[error("Initialisation du codec impossible : {0}")]
    Codec(ffmpeg::Error),

    /// Échec d'initialisation du scaler RGB24.
    #[error("Initialisation du scaler impossible : {0}")]
    Scaler(ffmpeg::Error),
}
