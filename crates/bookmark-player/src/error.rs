use std::path::PathBuf;

/// Why an asset could not be turned into a playable source.
///
/// Any of these is fatal to the controller built from the load result.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("audio asset not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to open audio asset {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode audio asset {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("audio asset {} has no decodable audio track", .0.display())]
    NoAudioTrack(PathBuf),

    #[error("audio asset {} reports no playable duration", .0.display())]
    NoDuration(PathBuf),

    #[error("invalid duration: {0} seconds")]
    InvalidDuration(f64),
}
