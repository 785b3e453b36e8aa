//! Slideshow instances.
//!
//! Only one slideshow plays per process: starting a new one cancels the
//! previous instance, which stops all of its pending timers and requests.

use crate::config::SlideshowConfig;
use crate::error::{Error, Result};
use crate::loader::PageLoader;
use crate::photorank::{HttpTransport, PhotorankClient};
use crate::sequencer::{PlaybackSequencer, PlaybackState, PlaybackTiming};
use crate::stage::Stage;
use crate::templates::Templates;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static ACTIVE: Mutex<Option<(u64, CancellationToken)>> = Mutex::new(None);

/// Register `id` as the active instance and cancel whichever was before it.
fn supersede(id: u64, cancel: CancellationToken) {
    let previous = ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace((id, cancel));

    if let Some((previous_id, token)) = previous {
        tracing::info!("Slideshow {} supersedes slideshow {}", id, previous_id);
        token.cancel();
    }
}

fn release(id: u64) {
    let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
    if active.as_ref().is_some_and(|(active_id, _)| *active_id == id) {
        *active = None;
    }
}

fn active_id() -> Option<u64> {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|(id, _)| *id)
}

/// A configured slideshow that has not started yet.
pub struct Slideshow<T, S> {
    config: SlideshowConfig,
    client: PhotorankClient<T>,
    templates: Templates,
    stage: S,
}

impl<T: HttpTransport, S: Stage> Slideshow<T, S> {
    /// Validate the configuration and compile templates.
    pub fn new(config: SlideshowConfig, transport: T, stage: S) -> Result<Self> {
        config.validate()?;

        let client = PhotorankClient::new(transport, config.api_url.clone(), config.auth_token.clone())?;
        let templates = match config.template_dir {
            Some(ref dir) => Templates::from_dir(dir)?,
            None => Templates::builtin()?,
        };

        Ok(Self {
            config,
            client,
            templates,
            stage,
        })
    }

    /// Render the shell, load every page, then play until `cancel` fires.
    ///
    /// Returns [`Error::Cancelled`] when stopped, or the loading error when no
    /// page could be materialized.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        state: watch::Sender<PlaybackState>,
    ) -> Result<()> {
        let intro = self.templates.render_intro(&self.config.intro)?;
        let gallery = self.templates.render_gallery()?;
        let outro = self.templates.render_outro(&self.config.outro)?;
        self.stage.mount(&intro, &gallery, &outro)?;

        let loader = PageLoader::new(&self.client, &self.config, &self.templates);
        let pages = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            pages = loader.load(&mut self.stage) => pages?,
        };

        let timing = PlaybackTiming::from(&self.config);
        let mut sequencer =
            PlaybackSequencer::new(self.stage, pages, timing, cancel).with_state_channel(state);
        sequencer.play().await;
        Err(Error::Cancelled)
    }
}

impl<T, S> Slideshow<T, S>
where
    T: HttpTransport + 'static,
    S: Stage + 'static,
{
    /// Spawn the slideshow, cancelling any instance started before it.
    pub fn start(self) -> SlideshowHandle {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PlaybackState::Idle);

        supersede(id, cancel.clone());
        tracing::info!("Starting slideshow {}", id);

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let result = self.run(task_cancel, state_tx).await;
            release(id);
            match result {
                Err(Error::Cancelled) => tracing::info!("Slideshow {} stopped", id),
                Err(ref e) => tracing::error!("Slideshow {} failed: {}", id, e),
                Ok(()) => {}
            }
            result
        });

        SlideshowHandle {
            id,
            cancel,
            state: state_rx,
            task: Some(task),
        }
    }
}

/// Control handle for a running slideshow.
pub struct SlideshowHandle {
    id: u64,
    cancel: CancellationToken,
    state: watch::Receiver<PlaybackState>,
    task: Option<JoinHandle<Result<()>>>,
}

impl SlideshowHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this is still the process-wide active slideshow.
    pub fn is_active(&self) -> bool {
        active_id() == Some(self.id) && !self.cancel.is_cancelled()
    }

    /// Watch the playback state.
    pub fn state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Cancel playback; pending timers stop at their next wake-up.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the slideshow task to finish.
    ///
    /// Only the first call sees the task's result; later calls return
    /// [`Error::AlreadyJoined`].
    pub async fn wait(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Err(Error::AlreadyJoined);
        };
        let result = task.await;
        self.task = None;
        result?
    }
}
