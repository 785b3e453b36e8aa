//! Gallery pages and the records they hold.

use crate::photorank::{MediaEntry, Uploader};
use crate::stage::PageHandle;
use serde::Serialize;
use std::sync::Arc;

/// A media entry joined with its uploader.
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub media: MediaEntry,
    pub uploader: Uploader,
}

impl MediaRecord {
    pub fn new(media: MediaEntry, uploader: Uploader) -> Self {
        Self { media, uploader }
    }
}

/// One materialized gallery page.
#[derive(Debug, Clone)]
pub struct Page {
    index: usize,
    records: Arc<[MediaRecord]>,
    handle: PageHandle,
}

impl Page {
    pub fn new(index: usize, records: Vec<MediaRecord>, handle: PageHandle) -> Self {
        Self {
            index,
            records: records.into(),
            handle,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    pub fn handle(&self) -> &PageHandle {
        &self.handle
    }
}
