//! Tile streaming: fetch transports, the bounded fetch scheduler and the
//! tile store.
//!
//! All bookkeeping lives on the engine thread. Transports may run on worker
//! threads, but they only move bytes; completions come back through a
//! channel and are applied when the owner drains them.

mod arena;
mod decode;
mod error;
mod fetcher;
mod request;
mod scheduler;
mod store;
mod streamer;
mod transport;

pub use arena::{Slot, SlotArena};
pub use decode::decode_plane;
pub use error::FetchError;
pub use fetcher::{ExternalFetcher, Fetcher, ThreadedFetcher};
pub use request::{FetchCompletion, FetchRequest, RequestTag};
pub use scheduler::{FetchScheduler, QueuedTile};
pub use store::{Installed, TileNode, TileStore};
pub use streamer::{PlaneOutcome, TileStreamer};
pub use transport::{AutoTransport, FileTransport, HttpTransport, Transport};
