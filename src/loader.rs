//! Page acquisition.
//!
//! Walks the recent-media collection page by page, enriches each batch and
//! materializes it on the stage until the configured number of pages exists
//! or the remote runs out.

use crate::config::SlideshowConfig;
use crate::enrich::UploaderEnricher;
use crate::error::{Error, FetchError, Result};
use crate::page::Page;
use crate::photorank::{Cursor, HttpTransport, MediaPage, PhotorankClient};
use crate::stage::Stage;
use crate::templates::Templates;
use futures_util::stream::{self, Stream, StreamExt};

enum CursorState {
    Start,
    Next(Cursor),
}

/// Lazy, finite stream of raw media pages.
///
/// The first item authenticates if needed; each following item consumes the
/// `next` cursor of the previous page. The stream ends after the last page or
/// after the first error.
pub fn media_pages<T: HttpTransport>(
    client: &PhotorankClient<T>,
    count: usize,
) -> impl Stream<Item = Result<MediaPage>> + '_ {
    stream::unfold(Some(CursorState::Start), move |state| async move {
        let page = match state? {
            CursorState::Start => client.fetch_recent_media(count).await,
            CursorState::Next(cursor) => client.follow(cursor).await,
        };

        match page {
            Ok(mut page) => {
                let next = page.links.next.take().map(CursorState::Next);
                Some((Ok(page), next))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Loads and materializes gallery pages.
pub struct PageLoader<'a, T> {
    client: &'a PhotorankClient<T>,
    config: &'a SlideshowConfig,
    templates: &'a Templates,
}

impl<'a, T: HttpTransport> PageLoader<'a, T> {
    pub fn new(
        client: &'a PhotorankClient<T>,
        config: &'a SlideshowConfig,
        templates: &'a Templates,
    ) -> Self {
        Self {
            client,
            config,
            templates,
        }
    }

    /// Fetch, enrich and append pages one after another.
    ///
    /// Returns the pages actually materialized, which may be fewer than
    /// configured when the remote runs out or a later page fails. A failure
    /// before the first page is returned as an error.
    pub async fn load<S: Stage>(&self, stage: &mut S) -> Result<Vec<Page>> {
        let target = self.config.number_of_pages;
        let timeout = self.config.fetch_timeout();
        let enricher = UploaderEnricher::new(self.client, self.config.enrich_policy);
        let mut remote = std::pin::pin!(media_pages(self.client, self.config.items_per_page).take(target));
        let mut pages = Vec::with_capacity(target);

        while pages.len() < target {
            let index = pages.len();

            let step = async {
                let Some(media) = remote.next().await else {
                    return Ok::<_, Error>(None);
                };
                let mut entries = media?.entries;
                if entries.len() > self.config.items_per_page {
                    tracing::debug!(
                        "Page {} returned {} items, keeping {}",
                        index,
                        entries.len(),
                        self.config.items_per_page
                    );
                    entries.truncate(self.config.items_per_page);
                }
                if entries.is_empty() {
                    return Ok(None);
                }
                enricher.enrich(entries).await.map(Some)
            };

            let records = match tokio::time::timeout(timeout, step).await {
                Ok(Ok(Some(records))) => records,
                Ok(Ok(None)) => {
                    tracing::warn!("Remote ran out of media after {} of {} pages", index, target);
                    break;
                }
                Ok(Err(e)) => {
                    if pages.is_empty() {
                        return Err(e);
                    }
                    tracing::warn!("Stopping after {} pages, next page failed: {}", index, e);
                    break;
                }
                Err(_) => {
                    let e = Error::Fetch(FetchError::Timeout {
                        what: format!("gallery page {}", index),
                        after: timeout,
                    });
                    if pages.is_empty() {
                        return Err(e);
                    }
                    tracing::warn!("Stopping after {} pages: {}", index, e);
                    break;
                }
            };

            let markup = self.templates.render_page(index, &records)?;
            let handle = stage.append_page(index, &markup, records.len())?;
            tracing::info!("Loaded page {}/{} ({} items)", index + 1, target, records.len());
            pages.push(Page::new(index, records, handle));
        }

        if pages.is_empty() {
            return Err(Error::NoPages);
        }
        Ok(pages)
    }
}
