//! Joins media entries with their uploaders.
//!
//! Lookups for one page run concurrently; results are written back by input
//! position, so completion order never affects the output order.

use crate::config::EnrichPolicy;
use crate::error::Result;
use crate::page::MediaRecord;
use crate::photorank::{HttpTransport, MediaEntry, OneOrMany, PhotorankClient, Uploader};
use futures_util::future::{join_all, try_join_all};

pub struct UploaderEnricher<'a, T> {
    client: &'a PhotorankClient<T>,
    policy: EnrichPolicy,
}

impl<'a, T: HttpTransport> UploaderEnricher<'a, T> {
    pub fn new(client: &'a PhotorankClient<T>, policy: EnrichPolicy) -> Self {
        Self { client, policy }
    }

    /// Fetch the uploader of every entry and pair them up in input order.
    ///
    /// Resolves once every lookup has finished. With [`EnrichPolicy::FailFast`]
    /// the first failed lookup fails the whole join; otherwise the failed
    /// entry gets [`Uploader::placeholder`].
    pub async fn enrich(&self, entries: impl Into<OneOrMany<MediaEntry>>) -> Result<Vec<MediaRecord>> {
        let entries: OneOrMany<MediaEntry> = entries.into();
        let entries: Vec<MediaEntry> = entries.into();
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("Fetching uploaders for {} media items", entries.len());
        let lookups = entries.iter().map(|entry| self.client.fetch_uploader(entry));

        let uploaders = match self.policy {
            EnrichPolicy::FailFast => try_join_all(lookups).await?,
            EnrichPolicy::BestEffort => join_all(lookups)
                .await
                .into_iter()
                .zip(&entries)
                .map(|(result, entry)| {
                    result.unwrap_or_else(|e| {
                        tracing::warn!("Uploader lookup failed for {}: {}", entry.id(), e);
                        Uploader::placeholder()
                    })
                })
                .collect(),
        };

        Ok(entries
            .into_iter()
            .zip(uploaders)
            .map(|(media, uploader)| MediaRecord::new(media, uploader))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, FetchError};
    use crate::testing::{self, StubRemote, API_URL};
    use rand::Rng;
    use std::sync::Arc;
    use std::time::Duration;

    fn entries(ids: &[String]) -> Vec<MediaEntry> {
        ids.iter()
            .map(|id| serde_json::from_value(testing::media_payload(id)).unwrap())
            .collect()
    }

    fn remote_with_uploaders(ids: &[String]) -> Arc<StubRemote> {
        let remote = StubRemote::new();
        for id in ids {
            remote.insert(&testing::uploader_url(id), testing::uploader_payload(id));
        }
        Arc::new(remote)
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{}", i)).collect()
    }

    fn screen_names(records: &[MediaRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.uploader.screen_name.clone().unwrap_or_default())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_input_order_under_random_latency() {
        let ids = ids(12);
        let mut rng = rand::thread_rng();

        for _ in 0..20 {
            let remote = remote_with_uploaders(&ids);
            for id in &ids {
                let latency = Duration::from_millis(rng.gen_range(0..500));
                remote.delay(&testing::uploader_url(id), latency);
            }
            let client = PhotorankClient::new(remote, API_URL, "token").unwrap();

            let records = UploaderEnricher::new(&client, EnrichPolicy::FailFast)
                .enrich(entries(&ids))
                .await
                .unwrap();

            assert_eq!(screen_names(&records), ids);
            let media: Vec<String> = records.iter().map(|r| r.media.id()).collect();
            assert_eq!(media, ids);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_after_the_slowest_lookup_when_completions_arrive_reversed() {
        let ids = ids(4);
        let remote = remote_with_uploaders(&ids);
        for (i, id) in ids.iter().enumerate() {
            // First entry finishes last.
            remote.delay(&testing::uploader_url(id), Duration::from_millis(400 - 100 * i as u64));
        }
        let client = PhotorankClient::new(remote, API_URL, "token").unwrap();

        let started = tokio::time::Instant::now();
        let records = UploaderEnricher::new(&client, EnrichPolicy::BestEffort)
            .enrich(entries(&ids))
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400) && elapsed < Duration::from_millis(401));
        assert_eq!(screen_names(&records), ids);
    }

    #[tokio::test]
    async fn accepts_a_single_entry() {
        let ids = ids(1);
        let client = PhotorankClient::new(remote_with_uploaders(&ids), API_URL, "token").unwrap();
        let single = entries(&ids).remove(0);

        let records = UploaderEnricher::new(&client, EnrichPolicy::FailFast)
            .enrich(single)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uploader.name.as_deref(), Some("uploader of m0"));
    }

    #[tokio::test]
    async fn empty_input_resolves_immediately() {
        let client = PhotorankClient::new(Arc::new(StubRemote::new()), API_URL, "token").unwrap();
        let records = UploaderEnricher::new(&client, EnrichPolicy::FailFast)
            .enrich(Vec::<MediaEntry>::new())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn fail_fast_surfaces_the_failed_lookup() {
        let ids = ids(3);
        let remote = remote_with_uploaders(&ids);
        remote.fail(&testing::uploader_url(&ids[1]));
        let client = PhotorankClient::new(remote, API_URL, "token").unwrap();

        let err = UploaderEnricher::new(&client, EnrichPolicy::FailFast)
            .enrich(entries(&ids))
            .await
            .unwrap_err();
        match err {
            Error::Fetch(FetchError::Status { url, status }) => {
                assert_eq!(url, testing::uploader_url(&ids[1]));
                assert_eq!(status, 500);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn best_effort_substitutes_placeholders() {
        let ids = ids(3);
        let remote = remote_with_uploaders(&ids);
        remote.fail(&testing::uploader_url(&ids[1]));
        let client = PhotorankClient::new(remote, API_URL, "token").unwrap();

        let records = UploaderEnricher::new(&client, EnrichPolicy::BestEffort)
            .enrich(entries(&ids))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert!(!records[0].uploader.placeholder);
        assert!(records[1].uploader.placeholder);
        assert_eq!(records[1].media.id(), "m1");
        assert!(!records[2].uploader.placeholder);
    }
}
