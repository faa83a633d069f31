//! Caller-supplied playback hooks.

use async_trait::async_trait;

use timescrub_types::Timestamp;

use crate::loader::Loader;

/// Callbacks the player awaits at each transition.
///
/// Every hook gets the active loader so it can fetch data for the frame.
/// `on_seek` decides whether a frame commits: returning `false` leaves the
/// cursor where it was. Errors propagate to whichever player call triggered
/// the hook.
#[async_trait(?Send)]
pub trait PlayerHooks {
    async fn on_play(&self, _loader: &dyn Loader, _ts: Timestamp) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_pause(&self, _loader: &dyn Loader, _ts: Timestamp) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_seek(&self, _loader: &dyn Loader, _ts: Timestamp) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Hooks that accept every seek and do nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

#[async_trait(?Send)]
impl PlayerHooks for NoopHooks {}
