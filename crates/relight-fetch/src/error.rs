//! Fetch and decode errors.

/// Errors raised while fetching or decoding a resource.
///
/// Tile-level errors only affect the tile they belong to.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("GET {url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request could not be completed (DNS, connection, timeout...).
    #[error("GET {url} failed: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Transport error description.
        reason: String,
    },

    /// Reading a local file failed.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Local path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The fetched bytes are not a decodable image.
    #[error("cannot decode {what}: {source}")]
    Decode {
        /// Resource description.
        what: String,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A tile was requested while a request for it is still in flight.
    #[error("tile {index} requested twice")]
    DuplicateRequest {
        /// Flat tile index.
        index: usize,
    },

    /// Every fetch buffer is in use.
    #[error("no free fetch slot ({capacity} in use)")]
    ArenaExhausted {
        /// Arena capacity.
        capacity: usize,
    },

    /// The fetcher refused the request because its workers are gone.
    #[error("fetch queue rejected {url}")]
    Rejected {
        /// Requested URL.
        url: String,
    },

    /// A worker thread could not be started.
    #[error("cannot spawn fetch worker: {0}")]
    Spawn(#[source] std::io::Error),
}
