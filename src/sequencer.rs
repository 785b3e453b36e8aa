//! Playback state machine.
//!
//! Cycles intro, every gallery page (reveal then conceal), outro, forever.
//! Every wait goes through the instance's cancellation token so a stopped or
//! superseded slideshow leaves no timers behind.

use crate::config::SlideshowConfig;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::stage::{ItemMarker, Section, SectionMarker, Stage};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Extra wait after an exit animation so transitions can finish.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Direction of a gallery page step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePhase {
    Revealing,
    Concealing,
}

/// What the sequencer is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Not started yet, or stopped.
    Idle,
    Intro,
    GalleryPage { index: usize, phase: PagePhase },
    Outro,
}

/// Durations driving one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTiming {
    pub sequence_interval: Duration,
    pub page_persistence: Duration,
    pub intro_length: Duration,
    pub outro_length: Duration,
}

impl From<&SlideshowConfig> for PlaybackTiming {
    fn from(cfg: &SlideshowConfig) -> Self {
        Self {
            sequence_interval: cfg.sequence_interval(),
            page_persistence: cfg.page_persistence(),
            intro_length: cfg.intro_length(),
            outro_length: cfg.outro_length(),
        }
    }
}

impl PlaybackTiming {
    /// Length of one full cycle over pages with the given item counts.
    pub fn cycle_length(&self, item_counts: &[usize]) -> Duration {
        let pages: Duration = item_counts
            .iter()
            .map(|&items| {
                let stagger = self.sequence_interval * items.saturating_sub(1) as u32;
                stagger * 2 + self.page_persistence + SETTLE_DELAY
            })
            .sum();
        self.intro_length + self.outro_length + SETTLE_DELAY * 2 + pages
    }
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        out = fut => Ok(out),
    }
}

async fn wait(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    until_cancelled(cancel, sleep(duration)).await
}

/// Fire one timer per `(item, offset)` pair, calling `on_fire` as each one
/// elapses. Resolves once all of them have fired, whatever their order.
async fn run_staggered<F>(
    offsets: Vec<(usize, Duration)>,
    cancel: &CancellationToken,
    mut on_fire: F,
) -> Result<()>
where
    F: FnMut(usize),
{
    let start = Instant::now();
    let mut remaining = offsets.len();
    let mut timers: FuturesUnordered<_> = offsets
        .into_iter()
        .map(|(item, offset)| async move {
            sleep_until(start + offset).await;
            item
        })
        .collect();

    while remaining > 0 {
        match until_cancelled(cancel, timers.next()).await? {
            Some(item) => {
                on_fire(item);
                remaining -= 1;
            }
            None => break,
        }
    }
    Ok(())
}

/// Drives intro, gallery pages and outro on a [`Stage`].
pub struct PlaybackSequencer<S> {
    stage: S,
    pages: Vec<Page>,
    timing: PlaybackTiming,
    cancel: CancellationToken,
    state: watch::Sender<PlaybackState>,
    cycles: u64,
}

impl<S: Stage> PlaybackSequencer<S> {
    pub fn new(stage: S, pages: Vec<Page>, timing: PlaybackTiming, cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            stage,
            pages,
            timing,
            cancel,
            state,
            cycles: 0,
        }
    }

    /// Publish state changes on an existing channel instead of a private one.
    pub fn with_state_channel(mut self, state: watch::Sender<PlaybackState>) -> Self {
        self.state = state;
        self
    }

    /// Watch the current playback state.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    /// Completed cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn enter(&self, state: PlaybackState) {
        tracing::debug!("Playback state: {:?}", state);
        self.state.send_replace(state);
    }

    /// Play cycles until cancelled.
    pub async fn play(&mut self) {
        let item_counts: Vec<usize> = self.pages.iter().map(|p| p.handle().item_count()).collect();
        tracing::info!(
            "Starting playback over {} pages, {:?} per cycle",
            self.page_count(),
            self.timing.cycle_length(&item_counts)
        );
        loop {
            if let Err(e) = self.play_cycle().await {
                tracing::info!("Playback stopped after {} cycles: {}", self.cycles, e);
                self.enter(PlaybackState::Idle);
                return;
            }
        }
    }

    /// Intro, every page, outro.
    pub async fn play_cycle(&mut self) -> Result<()> {
        self.show_intro().await?;
        self.show_gallery_pages().await?;
        self.show_outro().await?;
        self.cycles += 1;
        tracing::debug!("Completed playback cycle {}", self.cycles);
        Ok(())
    }

    pub async fn show_intro(&mut self) -> Result<()> {
        self.enter(PlaybackState::Intro);
        self.show_section(Section::Intro, self.timing.intro_length).await
    }

    pub async fn show_outro(&mut self) -> Result<()> {
        self.enter(PlaybackState::Outro);
        self.show_section(Section::Outro, self.timing.outro_length).await
    }

    async fn show_section(&mut self, section: Section, duration: Duration) -> Result<()> {
        self.stage.set_section_visible(section, true);
        self.stage.set_section_marker(section, Some(SectionMarker::Entering));
        wait(&self.cancel, duration).await?;

        self.stage.set_section_marker(section, Some(SectionMarker::Exiting));
        wait(&self.cancel, SETTLE_DELAY).await?;

        self.stage.set_section_visible(section, false);
        self.stage.set_section_marker(section, None);
        Ok(())
    }

    /// Reveal and conceal each loaded page in turn.
    pub async fn show_gallery_pages(&mut self) -> Result<()> {
        for index in 0..self.pages.len() {
            self.show_gallery_page(true, index).await?;
            self.show_gallery_page(false, index).await?;
        }
        Ok(())
    }

    /// Animate the items of one page in, or out.
    ///
    /// Item `i` toggles `i * sequence_interval` after the call. Once every
    /// item has toggled the page is held for `page_persistence` (reveal) or
    /// [`SETTLE_DELAY`] (conceal); a concealed page is then hidden.
    pub async fn show_gallery_page(&mut self, reveal: bool, index: usize) -> Result<()> {
        let Some(handle) = self.pages.get(index).map(|p| p.handle().clone()) else {
            tracing::warn!("No gallery page {} to show", index);
            return Ok(());
        };

        let phase = if reveal {
            PagePhase::Revealing
        } else {
            PagePhase::Concealing
        };
        self.enter(PlaybackState::GalleryPage { index, phase });

        if reveal {
            self.stage.set_page_visible(&handle, true);
        }

        let marker = if reveal { ItemMarker::In } else { ItemMarker::Out };
        let interval = self.timing.sequence_interval;
        let offsets = (0..handle.item_count())
            .map(|item| (item, interval * item as u32))
            .collect();
        let stage = &mut self.stage;
        run_staggered(offsets, &self.cancel, |item| {
            stage.set_item_marker(&handle, item, Some(marker));
        })
        .await?;

        let hold = if reveal {
            self.timing.page_persistence
        } else {
            SETTLE_DELAY
        };
        wait(&self.cancel, hold).await?;

        if !reveal {
            self.stage.set_page_visible(&handle, false);
            for item in 0..handle.item_count() {
                self.stage.set_item_marker(&handle, item, None);
            }
        }
        Ok(())
    }
}
