use thiserror::Error;

/// Errors originating from the audio module.
#[derive(Error, Debug)]
pub enum AudioError {
    /// The container holds no decodable audio track.
    #[error("Aucune piste audio dans {0}")]
    NoTrack(String),

    /// Audio decode error.
    #[error("Erreur de décodage : {0}")]
    DecodeError(String),

    /// The recording does not have the configured channel count.
    #[error("{path} : {found} canal(aux), {expected} attendu(s)")]
    ChannelMismatch {
        /// File that was decoded.
        path: String,
        /// Channels required by the configuration.
        expected: usize,
        /// Channels found in the file.
        found: usize,
    },
}
