//! Visual surface the slideshow draws on.
//!
//! The sequencer only flips visibility and animation markers; how those are
//! shown is up to the [`Stage`] implementation. [`DocumentStage`] keeps an
//! in-memory HTML document and can mirror it to a file through a
//! [`SnapshotWriter`].

use crate::error::Result;
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio::sync::watch;

/// Placeholder in the gallery markup where pages are inserted.
pub const PAGES_SLOT: &str = "<!-- pages -->";

/// Full-screen text sections around the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Intro,
    Outro,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Intro => "intro",
            Section::Outro => "outro",
        }
    }
}

/// Animation marker on a section's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionMarker {
    Entering,
    Exiting,
}

impl SectionMarker {
    pub fn class(&self) -> &'static str {
        match self {
            SectionMarker::Entering => "section--in",
            SectionMarker::Exiting => "section--out",
        }
    }
}

/// Animation marker on a single gallery item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemMarker {
    In,
    Out,
}

impl ItemMarker {
    pub fn class(&self) -> &'static str {
        match self {
            ItemMarker::In => "media--in",
            ItemMarker::Out => "media--out",
        }
    }
}

/// Handle to a page appended to the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHandle {
    index: usize,
    items: usize,
}

impl PageHandle {
    pub fn new(index: usize, items: usize) -> Self {
        Self { index, items }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of child items that animate.
    pub fn item_count(&self) -> usize {
        self.items
    }
}

/// Rendering boundary driven by the loader and the sequencer.
pub trait Stage: Send {
    /// Replace the target contents with the three top-level blocks.
    fn mount(&mut self, intro: &str, gallery: &str, outro: &str) -> Result<()>;

    /// Append a rendered page to the gallery.
    fn append_page(&mut self, index: usize, markup: &str, items: usize) -> Result<PageHandle>;

    fn set_section_visible(&mut self, section: Section, visible: bool);

    fn set_section_marker(&mut self, section: Section, marker: Option<SectionMarker>);

    fn set_page_visible(&mut self, page: &PageHandle, visible: bool);

    fn set_item_marker(&mut self, page: &PageHandle, item: usize, marker: Option<ItemMarker>);
}

#[derive(Debug, Default)]
struct SectionState {
    markup: String,
    visible: bool,
    marker: Option<SectionMarker>,
}

#[derive(Debug)]
struct PageState {
    index: usize,
    markup: String,
    visible: bool,
    items: Vec<Option<ItemMarker>>,
}

/// In-memory document, optionally published as a snapshot after every change.
#[derive(Debug, Default)]
pub struct DocumentStage {
    intro: SectionState,
    outro: SectionState,
    gallery: String,
    pages: Vec<PageState>,
    snapshots: Option<watch::Sender<String>>,
}

impl DocumentStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage whose snapshots are written to `path` by the returned writer.
    ///
    /// The writer has to be spawned; it finishes once the stage is dropped.
    pub fn with_output(path: PathBuf) -> (Self, SnapshotWriter) {
        let (tx, rx) = watch::channel(String::new());
        let stage = Self {
            snapshots: Some(tx),
            ..Self::default()
        };
        (stage, SnapshotWriter { path, snapshots: rx })
    }

    fn section_mut(&mut self, section: Section) -> &mut SectionState {
        match section {
            Section::Intro => &mut self.intro,
            Section::Outro => &mut self.outro,
        }
    }

    fn page_mut(&mut self, page: &PageHandle) -> Option<&mut PageState> {
        self.pages.iter_mut().find(|p| p.index == page.index)
    }

    /// Render the current document state.
    pub fn to_html(&self) -> String {
        let mut pages = String::new();
        for page in &self.pages {
            let markers: Vec<&str> = page
                .items
                .iter()
                .map(|m| m.map(|m| m.class()).unwrap_or(""))
                .collect();
            let _ = write!(
                pages,
                "<div class=\"gallery-page\" data-page=\"{}\" style=\"visibility: {}\" data-media=\"{}\">{}</div>",
                page.index,
                visibility(page.visible),
                markers.join(","),
                page.markup
            );
        }

        let gallery = if self.gallery.contains(PAGES_SLOT) {
            self.gallery.replacen(PAGES_SLOT, &pages, 1)
        } else {
            format!("{}{}", self.gallery, pages)
        };

        format!(
            "{}\n{}\n{}\n",
            render_section(Section::Intro, &self.intro),
            gallery,
            render_section(Section::Outro, &self.outro)
        )
    }

    fn flush(&self) {
        if let Some(ref snapshots) = self.snapshots {
            snapshots.send_replace(self.to_html());
        }
    }
}

/// Writes the latest [`DocumentStage`] snapshot to disk.
///
/// Snapshots published while a write is in flight collapse into the newest
/// one, so a slow disk never holds up playback.
#[derive(Debug)]
pub struct SnapshotWriter {
    path: PathBuf,
    snapshots: watch::Receiver<String>,
}

impl SnapshotWriter {
    pub async fn run(mut self) {
        while self.snapshots.changed().await.is_ok() {
            let html = self.snapshots.borrow_and_update().clone();
            if let Err(e) = tokio::fs::write(&self.path, html).await {
                tracing::warn!("Failed to write document to {:?}: {}", self.path, e);
            }
        }
        tracing::debug!("Document writer for {:?} finished", self.path);
    }
}

fn visibility(visible: bool) -> &'static str {
    if visible {
        "visible"
    } else {
        "hidden"
    }
}

fn render_section(section: Section, state: &SectionState) -> String {
    format!(
        "<section class=\"{}\" style=\"visibility: {}\"><div class=\"{}\">{}</div></section>",
        section.as_str(),
        visibility(state.visible),
        state.marker.map(|m| m.class()).unwrap_or(""),
        state.markup
    )
}

impl Stage for DocumentStage {
    fn mount(&mut self, intro: &str, gallery: &str, outro: &str) -> Result<()> {
        self.intro = SectionState {
            markup: intro.to_string(),
            ..SectionState::default()
        };
        self.outro = SectionState {
            markup: outro.to_string(),
            ..SectionState::default()
        };
        self.gallery = gallery.to_string();
        self.pages.clear();
        self.flush();
        Ok(())
    }

    fn append_page(&mut self, index: usize, markup: &str, items: usize) -> Result<PageHandle> {
        self.pages.push(PageState {
            index,
            markup: markup.to_string(),
            visible: false,
            items: vec![None; items],
        });
        self.flush();
        Ok(PageHandle::new(index, items))
    }

    fn set_section_visible(&mut self, section: Section, visible: bool) {
        self.section_mut(section).visible = visible;
        self.flush();
    }

    fn set_section_marker(&mut self, section: Section, marker: Option<SectionMarker>) {
        self.section_mut(section).marker = marker;
        self.flush();
    }

    fn set_page_visible(&mut self, page: &PageHandle, visible: bool) {
        if let Some(state) = self.page_mut(page) {
            state.visible = visible;
            self.flush();
        }
    }

    fn set_item_marker(&mut self, page: &PageHandle, item: usize, marker: Option<ItemMarker>) {
        let Some(state) = self.page_mut(page) else {
            return;
        };
        if let Some(slot) = state.items.get_mut(item) {
            *slot = marker;
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_land_in_gallery_slot() {
        let mut stage = DocumentStage::new();
        stage
            .mount("<h1>Hi</h1>", "<div class=\"gallery\"><!-- pages --></div>", "<h1>Bye</h1>")
            .unwrap();
        let page = stage.append_page(0, "<p>zero</p>", 2).unwrap();
        assert_eq!(page.item_count(), 2);

        let html = stage.to_html();
        assert!(html.contains("<div class=\"gallery\"><div class=\"gallery-page\" data-page=\"0\""));
        assert!(!html.contains(PAGES_SLOT));
    }

    #[test]
    fn tracks_visibility_and_markers() {
        let mut stage = DocumentStage::new();
        stage.mount("intro", "", "outro").unwrap();
        let page = stage.append_page(0, "page", 2).unwrap();

        stage.set_section_visible(Section::Intro, true);
        stage.set_section_marker(Section::Intro, Some(SectionMarker::Entering));
        stage.set_page_visible(&page, true);
        stage.set_item_marker(&page, 1, Some(ItemMarker::In));

        let html = stage.to_html();
        assert!(html.contains(
            "<section class=\"intro\" style=\"visibility: visible\"><div class=\"section--in\">intro</div></section>"
        ));
        assert!(html.contains("<section class=\"outro\" style=\"visibility: hidden\">"));
        assert!(html.contains("style=\"visibility: visible\" data-media=\",media--in\""));
    }

    #[test]
    fn out_of_range_item_is_ignored() {
        let mut stage = DocumentStage::new();
        stage.mount("", "", "").unwrap();
        let page = stage.append_page(0, "page", 1).unwrap();
        stage.set_item_marker(&page, 5, Some(ItemMarker::Out));
        assert!(stage.to_html().contains("data-media=\"\""));
    }

    #[tokio::test]
    async fn writer_mirrors_the_latest_document_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slideshow.html");
        let (mut stage, writer) = DocumentStage::with_output(path.clone());
        let writer = tokio::spawn(writer.run());

        stage.mount("intro", "<!-- pages -->", "outro").unwrap();
        let page = stage.append_page(0, "<p>zero</p>", 1).unwrap();
        stage.set_page_visible(&page, true);
        let expected = stage.to_html();

        drop(stage);
        writer.await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
    }

    #[tokio::test]
    async fn unwritable_output_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("slideshow.html");
        let (mut stage, writer) = DocumentStage::with_output(path.clone());
        let writer = tokio::spawn(writer.run());

        stage.mount("intro", "", "outro").unwrap();
        drop(stage);
        writer.await.unwrap();
        assert!(!path.exists());
    }
}
