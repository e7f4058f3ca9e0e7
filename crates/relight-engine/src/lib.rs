//! Relighting engine for tiled multi-resolution RTI datasets.
//!
//! [`RelightEngine`] ties together the dataset description, the tile
//! pyramid, the fetch scheduler and a GPU surface. The host drives it:
//! [`pump`](RelightEngine::pump) applies finished fetches and
//! [`draw`](RelightEngine::draw) renders a frame whenever
//! [`needs_redraw`](RelightEngine::needs_redraw) says so.

mod clock;
mod engine;
mod error;
mod events;
mod options;
mod planner;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{LoadState, RelightEngine};
pub use error::{EngineError, ErrorClass};
pub use options::{EngineOptions, SourceKind};
pub use planner::{PlannedTile, plan_draw};
