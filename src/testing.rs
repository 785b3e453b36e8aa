//! In-memory doubles shared by the unit tests.

use crate::error::FetchError;
use crate::photorank::HttpTransport;
use crate::stage::{ItemMarker, PageHandle, Section, SectionMarker, Stage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const API_URL: &str = "https://api.test/";

pub fn page_url(index: usize) -> String {
    format!("https://api.test/media/recent?page={}", index)
}

pub fn uploader_url(media_id: &str) -> String {
    format!("https://api.test/uploaders/{}", media_id)
}

pub fn customer_payload(recent_href: &str) -> Value {
    json!({ "data": { "_embedded": { "customer": {
        "id": 42,
        "name": "Test Customer",
        "_embedded": { "media:recent": { "_links": { "self": { "href": recent_href } } } }
    }}}})
}

pub fn media_payload(id: &str) -> Value {
    json!({
        "id": id,
        "caption": format!("caption {}", id),
        "_embedded": { "uploader": { "_links": { "self": { "href": uploader_url(id) } } } }
    })
}

pub fn uploader_payload(id: &str) -> Value {
    json!({ "data": { "name": format!("uploader of {}", id), "screen_name": id } })
}

pub fn media_id(page: usize, item: usize) -> String {
    format!("p{}-m{}", page, item)
}

/// Remote with auth, linked recent-media pages of the given sizes, and one
/// uploader per media entry.
pub fn paged_remote(page_sizes: &[usize]) -> StubRemote {
    let remote = StubRemote::new();
    remote.insert(API_URL, customer_payload(&page_url(0)));

    for (page, &size) in page_sizes.iter().enumerate() {
        let ids: Vec<String> = (0..size).map(|item| media_id(page, item)).collect();
        let entries: Vec<Value> = ids.iter().map(|id| media_payload(id)).collect();
        let mut links = json!({});
        if page + 1 < page_sizes.len() {
            links["next"] = json!({ "href": page_url(page + 1) });
        }
        if page > 0 {
            links["prev"] = json!({ "href": page_url(page - 1) });
            links["first"] = json!({ "href": page_url(0) });
        }
        remote.insert(
            &page_url(page),
            json!({ "data": { "_embedded": entries, "_links": links } }),
        );
        for id in &ids {
            remote.insert(&uploader_url(id), uploader_payload(id));
        }
    }

    remote
}

enum Reply {
    Json(Value),
    Fail,
}

/// Scripted [`HttpTransport`] keyed by URL; query parameters are recorded.
#[derive(Default)]
pub struct StubRemote {
    replies: Mutex<HashMap<String, Reply>>,
    latencies: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StubRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, body: Value) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Json(body));
    }

    pub fn fail(&self, url: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Fail);
    }

    pub fn delay(&self, url: &str, latency: Duration) {
        self.latencies
            .lock()
            .unwrap()
            .insert(url.to_string(), latency);
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .count()
    }

    /// Every requested URL, in request order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.clone())
            .collect()
    }

    pub fn last_query(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, q)| q.clone())
    }
}

#[async_trait]
impl HttpTransport for StubRemote {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        self.requests.lock().unwrap().push((
            url.to_string(),
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));

        let latency = self.latencies.lock().unwrap().get(url).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.replies.lock().unwrap().get(url) {
            Some(Reply::Json(body)) => Ok(body.clone()),
            Some(Reply::Fail) => Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Visual change observed by [`RecordingStage`].
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Mounted,
    PageAppended { index: usize, items: usize },
    SectionVisible(Section, bool),
    SectionMarker(Section, Option<SectionMarker>),
    PageVisible(usize, bool),
    ItemMarker(usize, usize, Option<ItemMarker>),
}

/// Stage that records every change together with the (virtual) time it happened.
#[derive(Clone, Default)]
pub struct RecordingStage {
    events: Arc<Mutex<Vec<(Instant, StageEvent)>>>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Instant, StageEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<StageEvent> {
        self.events().into_iter().map(|(_, e)| e).collect()
    }

    fn push(&self, event: StageEvent) {
        self.events.lock().unwrap().push((Instant::now(), event));
    }
}

impl Stage for RecordingStage {
    fn mount(&mut self, _intro: &str, _gallery: &str, _outro: &str) -> crate::error::Result<()> {
        self.push(StageEvent::Mounted);
        Ok(())
    }

    fn append_page(&mut self, index: usize, _markup: &str, items: usize) -> crate::error::Result<PageHandle> {
        self.push(StageEvent::PageAppended { index, items });
        Ok(PageHandle::new(index, items))
    }

    fn set_section_visible(&mut self, section: Section, visible: bool) {
        self.push(StageEvent::SectionVisible(section, visible));
    }

    fn set_section_marker(&mut self, section: Section, marker: Option<SectionMarker>) {
        self.push(StageEvent::SectionMarker(section, marker));
    }

    fn set_page_visible(&mut self, page: &PageHandle, visible: bool) {
        self.push(StageEvent::PageVisible(page.index(), visible));
    }

    fn set_item_marker(&mut self, page: &PageHandle, item: usize, marker: Option<ItemMarker>) {
        self.push(StageEvent::ItemMarker(page.index(), item, marker));
    }
}
