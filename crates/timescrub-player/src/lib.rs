//! Playback over time-tagged data.
//!
//! A [`Player`] walks a [`Loader`]'s cursor forward one interval per frame,
//! consulting caller-supplied [`PlayerHooks`] before every move.
//! [`PlaybackDataLoader`] adapts any [`DataProvider`](timescrub_cache::DataProvider)
//! into a loader, and [`FrameTicker`] paces frames on a tokio interval.
//!
//! ```text
//!   Player ──hooks──▶ PlayerHooks (on_play / on_pause / on_seek)
//!     │
//!     └──▶ Loader (PlaybackDataLoader) ──▶ DataProvider (block cache / live)
//! ```

pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod player;
pub mod ticker;

pub use config::PlayerConfig;
pub use cursor::PlaybackCursor;
pub use error::{PlayerError, Result};
pub use hooks::{NoopHooks, PlayerHooks};
pub use loader::{Loader, PlaybackDataLoader};
pub use player::{PlayState, Player, SeekOutcome};
pub use ticker::FrameTicker;
