//! Frame-paced playback scheduler.
//!
//! The player moves a loader's cursor along the time axis at a fixed step,
//! asking the `on_seek` hook before each move. Every state change (play,
//! pause, seek, stop) bumps a generation counter; a frame or seek only commits
//! if the generation it captured is still current when its hook returns, so a
//! slow hook can never move the cursor after the user has moved on.
//!
//! ```text
//!            play()                 pause() / seek() / stop()
//!   Stopped ───────▶ Playing ──────────────────────────────▶ Paused / Stopped
//!                      │  ▲
//!            tick ─────┘  └──── frame(): elapsed >= interval?
//!                               next = frame_count == 0 ? current : current + interval
//!                               on_seek(next) && generation unchanged ⇒ commit
//! ```
//!
//! The player is `!Send`; run it on a current-thread runtime inside a
//! `tokio::task::LocalSet`.

use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, trace};

use timescrub_types::Timestamp;

use crate::config::PlayerConfig;
use crate::cursor::PlaybackCursor;
use crate::error::{PlayerError, Result};
use crate::hooks::PlayerHooks;
use crate::loader::Loader;
use crate::ticker::FrameTicker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Paused,
    Playing,
}

/// What a seek attempt did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The hook accepted and the cursor moved to this timestamp.
    Committed(Timestamp),
    /// The hook returned false; the cursor didn't move.
    Rejected,
    /// The hook accepted, but the state changed while it ran.
    Stale,
    /// Not attempted (stepping while playing).
    Ignored,
}

/// Clears the in-progress marker even if the frame future is dropped
/// mid-await, unless a newer generation's frame has taken it over.
struct FrameGuard<'a> {
    slot: &'a Cell<Option<u64>>,
    generation: u64,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if self.slot.get() == Some(self.generation) {
            self.slot.set(None);
        }
    }
}

struct PlayerInner<H> {
    hooks: H,
    config: PlayerConfig,
    interval: Duration,
    loader: RefCell<Rc<dyn Loader>>,
    state: Cell<PlayState>,
    state_id: Cell<u64>,
    frame_count: Cell<u64>,
    last_step: Cell<Instant>,
    /// Generation the current frame loop belongs to.
    loop_generation: Cell<Option<u64>>,
    /// Generation of the frame whose hook is running, if any.
    frame_in_progress: Cell<Option<u64>>,
    ticker: RefCell<Option<FrameTicker>>,
    loop_error: RefCell<Option<PlayerError>>,
}

/// Playback scheduler. Cheap to clone; clones drive the same player.
pub struct Player<H> {
    inner: Rc<PlayerInner<H>>,
}

impl<H> Clone for Player<H> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<H: PlayerHooks + 'static> Player<H> {
    pub fn new(loader: Rc<dyn Loader>, hooks: H) -> Self {
        Self::build(loader, hooks, PlayerConfig::default())
    }

    pub fn with_config(loader: Rc<dyn Loader>, hooks: H, config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(loader, hooks, config))
    }

    fn build(loader: Rc<dyn Loader>, hooks: H, config: PlayerConfig) -> Self {
        Self {
            inner: Rc::new(PlayerInner {
                hooks,
                interval: config.interval(),
                config,
                loader: RefCell::new(loader),
                state: Cell::new(PlayState::Stopped),
                state_id: Cell::new(0),
                frame_count: Cell::new(0),
                last_step: Cell::new(Instant::now()),
                loop_generation: Cell::new(None),
                frame_in_progress: Cell::new(None),
                ticker: RefCell::new(None),
                loop_error: RefCell::new(None),
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn is_playing(&self) -> bool {
        self.inner.state.get() == PlayState::Playing
    }

    pub fn state(&self) -> PlayState {
        self.inner.state.get()
    }

    /// Current generation. Changes on every play, pause, seek and stop.
    pub fn state_id(&self) -> u64 {
        self.inner.state_id.get()
    }

    /// Frames committed since the last play or pause.
    pub fn frame_count(&self) -> u64 {
        self.inner.frame_count.get()
    }

    pub fn current_time(&self) -> Timestamp {
        self.loader().current_time()
    }

    pub fn interval(&self) -> Timestamp {
        self.inner.config.interval_ms
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    pub fn hooks(&self) -> &H {
        &self.inner.hooks
    }

    pub fn loader(&self) -> Rc<dyn Loader> {
        Rc::clone(&self.inner.loader.borrow())
    }

    /// The error that halted the frame ticker, if any. Cleared on read.
    pub fn take_loop_error(&self) -> Option<PlayerError> {
        self.inner.loop_error.borrow_mut().take()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Start playing from the current position.
    pub async fn play(&self) -> Result<()> {
        self.pause().await?;

        let generation = self.bump();
        self.inner.state.set(PlayState::Playing);
        self.inner.frame_count.set(0);

        let loader = self.loader();
        let current = loader.current_time();
        debug!(generation, current, "play");
        if let Err(e) = self.inner.hooks.on_play(&*loader, current).await {
            self.halt(generation);
            return Err(PlayerError::Hook(e));
        }

        if self.inner.state_id.get() != generation {
            debug!(generation, "play superseded during on_play");
            return Ok(());
        }

        self.inner.last_step.set(Instant::now());
        self.inner.loop_generation.set(Some(generation));
        if let Some(period) = self.inner.config.frame_period() {
            self.start_ticker(period, generation);
        }
        Ok(())
    }

    /// Stop the frame loop, keeping the position.
    pub async fn pause(&self) -> Result<()> {
        let generation = self.bump();
        self.stop_loop();
        if self.inner.state.get() == PlayState::Playing {
            self.inner.state.set(PlayState::Paused);
        }
        self.inner.frame_count.set(0);

        let loader = self.loader();
        let current = loader.current_time();
        trace!(generation, current, "pause");
        self.inner
            .hooks
            .on_pause(&*loader, current)
            .await
            .map_err(PlayerError::Hook)
    }

    /// Pause, move to `t` (clamped to zero), then run `on_seek` once.
    pub async fn seek(&self, t: Timestamp) -> Result<SeekOutcome> {
        self.pause().await?;
        let t = PlaybackCursor::at(t).current_time();
        let loader = self.loader();
        loader.seek(t);
        let generation = self.inner.state_id.get();
        self.seek_hook(&loader, t, generation).await
    }

    /// Step forward one interval. Ignored while playing.
    pub async fn next(&self) -> Result<SeekOutcome> {
        if self.is_playing() {
            return Ok(SeekOutcome::Ignored);
        }
        let target = PlaybackCursor::at(self.current_time()).advance(self.interval());
        self.seek(target).await
    }

    /// Step back one interval, stopping at zero. Ignored while playing.
    pub async fn back(&self) -> Result<SeekOutcome> {
        if self.is_playing() {
            return Ok(SeekOutcome::Ignored);
        }
        let target = PlaybackCursor::at(self.current_time()).retreat(self.interval());
        self.seek(target).await
    }

    /// Pause and rewind to the loader's start time.
    ///
    /// The rewind happens even when `on_pause` fails; its error is returned
    /// afterwards.
    pub async fn stop(&self) -> Result<()> {
        let paused = self.pause().await;
        let loader = self.loader();
        loader.seek(loader.start_time());
        self.inner.state.set(PlayState::Stopped);
        debug!(start = loader.start_time(), "stopped");
        paused
    }

    /// Stop, then switch to a different loader.
    pub async fn set_loader(&self, loader: Rc<dyn Loader>) -> Result<()> {
        let stopped = self.stop().await;
        *self.inner.loader.borrow_mut() = loader;
        stopped
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Run one frame if one is due.
    ///
    /// Returns `None` when nothing was attempted: not playing, a stale loop,
    /// another frame of this generation still running, or less than one
    /// interval since the last committed frame. A frame left over from an
    /// earlier generation doesn't block; its result is discarded as stale. Called by the ticker, or by the host when
    /// `frame_period_ms` is `None`.
    pub async fn frame(&self) -> Result<Option<SeekOutcome>> {
        let inner = &self.inner;
        let Some(generation) = inner.loop_generation.get() else {
            return Ok(None);
        };
        if inner.state.get() != PlayState::Playing
            || inner.state_id.get() != generation
            || inner.frame_in_progress.get() == Some(generation)
        {
            return Ok(None);
        }
        if inner.last_step.get().elapsed() < inner.interval {
            return Ok(None);
        }

        inner.frame_in_progress.set(Some(generation));
        let _guard = FrameGuard { slot: &inner.frame_in_progress, generation };

        let loader = self.loader();
        let current = loader.current_time();
        let next = if inner.frame_count.get() == 0 {
            current
        } else {
            current + inner.config.interval_ms
        };

        match self.seek_hook(&loader, next, generation).await {
            Ok(outcome) => {
                if matches!(outcome, SeekOutcome::Committed(_)) {
                    inner.last_step.set(Instant::now());
                }
                Ok(Some(outcome))
            }
            Err(e) => {
                self.halt(generation);
                Err(e)
            }
        }
    }

    /// Ask `on_seek` about `t`; move the cursor only if it agrees and
    /// `generation` is still current.
    async fn seek_hook(&self, loader: &Rc<dyn Loader>, t: Timestamp, generation: u64) -> Result<SeekOutcome> {
        let t = t.max(0);
        let accepted = self
            .inner
            .hooks
            .on_seek(&**loader, t)
            .await
            .map_err(PlayerError::Hook)?;

        if !accepted {
            trace!(t, "seek rejected by hook");
            return Ok(SeekOutcome::Rejected);
        }
        if self.inner.state_id.get() != generation {
            debug!(t, generation, current = self.inner.state_id.get(), "stale seek discarded");
            return Ok(SeekOutcome::Stale);
        }

        loader.seek(t);
        self.inner.frame_count.set(self.inner.frame_count.get() + 1);
        trace!(t, frame = self.inner.frame_count.get(), "seek committed");
        Ok(SeekOutcome::Committed(t))
    }

    // ========================================================================
    // Loop plumbing
    // ========================================================================

    fn bump(&self) -> u64 {
        let generation = self.inner.state_id.get() + 1;
        self.inner.state_id.set(generation);
        generation
    }

    fn stop_loop(&self) {
        self.inner.loop_generation.set(None);
        if let Some(ticker) = self.inner.ticker.borrow_mut().take() {
            ticker.cancel();
        }
    }

    /// Halt playback after a hook failure, unless something newer already
    /// took over.
    fn halt(&self, generation: u64) {
        if self.inner.state_id.get() != generation {
            return;
        }
        self.bump();
        self.stop_loop();
        self.inner.state.set(PlayState::Paused);
    }

    fn start_ticker(&self, period: Duration, generation: u64) {
        let weak: Weak<PlayerInner<H>> = Rc::downgrade(&self.inner);
        let ticker = FrameTicker::spawn(period, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                if inner.loop_generation.get() != Some(generation) {
                    return ControlFlow::Break(());
                }
                let player = Player { inner };
                match player.frame().await {
                    Ok(_) => ControlFlow::Continue(()),
                    Err(e) => {
                        error!(error = %e, generation, "frame loop halted");
                        *player.inner.loop_error.borrow_mut() = Some(e);
                        ControlFlow::Break(())
                    }
                }
            }
        });
        if let Some(previous) = self.inner.ticker.borrow_mut().replace(ticker) {
            previous.cancel();
        }
    }
}

impl<H> std::fmt::Debug for Player<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.inner.state.get())
            .field("state_id", &self.inner.state_id.get())
            .field("frame_count", &self.inner.frame_count.get())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
