//! Time-partitioned caching and request coalescing for timescrub.
//!
//! Two providers sit behind one [`DataProvider`] contract:
//!
//! | Provider                | Behaviour                                         |
//! |-------------------------|---------------------------------------------------|
//! | [`BlockCacheProvider`]  | Historical data, fetched per fixed-width block, deduplicated, retained, with read-ahead |
//! | [`LiveProvider`]        | One request per call, next reply wins, no memory  |
//!
//! Both talk to the outside world through a [`Transport`] for outbound
//! requests and take inbound batches through [`BatchSink`]; [`pump`] drives a
//! sink from an `mpsc` queue of raw JSON messages.
//!
//! The providers are `!Send` and expect a single-threaded runtime (a tokio
//! current-thread runtime or a `LocalSet`).

pub mod block_cache;
pub mod blocks;
pub mod config;
pub mod constants;
pub mod error;
pub mod live;
pub mod observers;
pub mod provider;
pub mod store;
pub mod transport;
pub mod waiters;

pub use block_cache::BlockCacheProvider;
pub use blocks::{BlockIndex, BlockLayout, LoadedBlocks};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use live::LiveProvider;
pub use observers::{Listener, ListenerId, ObserverRegistry};
pub use provider::DataProvider;
pub use store::TimeBucketStore;
pub use transport::{pump, BatchSink, Transport};
pub use waiters::{PendingFetch, WaiterRegistry};
