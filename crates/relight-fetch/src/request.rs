//! Request and completion messages exchanged with a [`Fetcher`](crate::Fetcher).

use crate::error::FetchError;

/// What a request is for, so its completion can be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTag {
    /// The dataset's `info.json`.
    Info {
        /// Load the request belongs to.
        load: u64,
    },
    /// The layout metadata document.
    LayoutMetadata {
        /// Load the request belongs to.
        load: u64,
    },
    /// The `materials.bin` basis tensor.
    BasisBlob {
        /// Load the request belongs to.
        load: u64,
    },
    /// One component image of one tile.
    TilePlane {
        /// Flat tile index.
        index: usize,
        /// Component number.
        plane: usize,
        /// Arena slot holding the buffer.
        slot: usize,
        /// Store generation the request belongs to.
        generation: u64,
    },
}

/// A resource to fetch.
#[derive(Debug)]
pub struct FetchRequest {
    /// Routing tag, echoed in the completion.
    pub tag: RequestTag,
    /// URL or local path.
    pub url: String,
    /// Buffer to fill; its capacity is reused.
    pub buffer: Vec<u8>,
}

impl FetchRequest {
    /// Request with a fresh buffer.
    #[must_use]
    pub fn new(tag: RequestTag, url: impl Into<String>) -> Self {
        Self {
            tag,
            url: url.into(),
            buffer: Vec::new(),
        }
    }
}

/// Outcome of a [`FetchRequest`].
#[derive(Debug)]
pub struct FetchCompletion {
    /// Tag of the request.
    pub tag: RequestTag,
    /// URL of the request, for diagnostics.
    pub url: String,
    /// The request buffer, holding the body on success.
    pub buffer: Vec<u8>,
    /// Whether the fetch succeeded.
    pub result: Result<(), FetchError>,
}

impl FetchCompletion {
    /// Successful completion carrying `body`.
    #[must_use]
    pub fn success(request: FetchRequest, body: &[u8]) -> Self {
        let mut buffer = request.buffer;
        buffer.clear();
        buffer.extend_from_slice(body);
        Self {
            tag: request.tag,
            url: request.url,
            buffer,
            result: Ok(()),
        }
    }

    /// Failed completion.
    #[must_use]
    pub fn failure(request: FetchRequest, error: FetchError) -> Self {
        let mut buffer = request.buffer;
        buffer.clear();
        Self {
            tag: request.tag,
            url: request.url,
            buffer,
            result: Err(error),
        }
    }
}
