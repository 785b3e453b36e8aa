//! Markup templates for the four rendered blocks.

use crate::config::SectionContent;
use crate::error::Result;
use crate::page::MediaRecord;
use chrono::{DateTime, Utc};
use minijinja::{context, Environment};
use std::path::Path;

const GALLERY: &str = "gallery";
const PAGE: &str = "page";
const INTRO: &str = "intro";
const OUTRO: &str = "outro";

const DEFAULT_GALLERY: &str = r#"<div class="gallery"><!-- pages --></div>"#;

const DEFAULT_PAGE: &str = r#"<div class="page">
{%- for item in items %}
<figure class="media">
  {%- if item.media.images %}<img src="{{ item.media.images.normal or item.media.images.original }}" alt="{{ item.media.caption or '' }}">{% endif %}
  <figcaption>
    <span class="uploader">{{ item.uploader.name or item.uploader.screen_name or "Anonymous" }}</span>
    {%- if item.media.date_submitted %} <time>{{ item.media.date_submitted | format_date }}</time>{% endif %}
  </figcaption>
</figure>
{%- endfor %}
</div>"#;

const DEFAULT_SECTION: &str = r#"<div class="section"><h1>{{ title }}</h1>{% if content %}<p>{{ content }}</p>{% endif %}</div>"#;

/// Compiled templates for gallery, page, intro and outro.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Built-in templates.
    pub fn builtin() -> Result<Self> {
        Self::from_sources(
            DEFAULT_GALLERY.to_string(),
            DEFAULT_PAGE.to_string(),
            DEFAULT_SECTION.to_string(),
            DEFAULT_SECTION.to_string(),
        )
    }

    /// Compile the given template sources.
    pub fn from_sources(gallery: String, page: String, intro: String, outro: String) -> Result<Self> {
        let mut env = Environment::new();
        env.add_filter("format_date", format_date);
        env.add_template_owned(GALLERY, gallery)?;
        env.add_template_owned(PAGE, page)?;
        env.add_template_owned(INTRO, intro)?;
        env.add_template_owned(OUTRO, outro)?;
        Ok(Self { env })
    }

    /// Load `gallery.html`, `page.html`, `intro.html` and `outro.html` from a
    /// directory, falling back to the built-in template for any missing file.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let load = |name: &str, fallback: &str| -> Result<String> {
            let path = dir.join(format!("{}.html", name));
            if path.exists() {
                tracing::debug!("Loading template {:?}", path);
                Ok(std::fs::read_to_string(path)?)
            } else {
                Ok(fallback.to_string())
            }
        };

        Self::from_sources(
            load(GALLERY, DEFAULT_GALLERY)?,
            load(PAGE, DEFAULT_PAGE)?,
            load(INTRO, DEFAULT_SECTION)?,
            load(OUTRO, DEFAULT_SECTION)?,
        )
    }

    pub fn render_gallery(&self) -> Result<String> {
        Ok(self.env.get_template(GALLERY)?.render(context! {})?)
    }

    pub fn render_page(&self, index: usize, records: &[MediaRecord]) -> Result<String> {
        Ok(self
            .env
            .get_template(PAGE)?
            .render(context! { index => index, items => records })?)
    }

    pub fn render_intro(&self, content: &SectionContent) -> Result<String> {
        Ok(self.env.get_template(INTRO)?.render(content)?)
    }

    pub fn render_outro(&self, content: &SectionContent) -> Result<String> {
        Ok(self.env.get_template(OUTRO)?.render(content)?)
    }
}

/// Template filter turning a timestamp into "3 hours ago". Unparsable input
/// is passed through.
fn format_date(value: String) -> String {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(date) => from_now(date.with_timezone(&Utc), Utc::now()),
        Err(_) => value,
    }
}

fn from_now(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(date);
    let seconds = delta.num_seconds().abs();
    let minutes = (seconds as f64 / 60.0).round() as i64;
    let hours = (seconds as f64 / 3600.0).round() as i64;
    let days = (seconds as f64 / 86_400.0).round() as i64;

    let phrase = if seconds < 45 {
        "a few seconds".to_string()
    } else if seconds < 90 {
        "a minute".to_string()
    } else if minutes < 45 {
        format!("{} minutes", minutes)
    } else if minutes < 90 {
        "an hour".to_string()
    } else if hours < 22 {
        format!("{} hours", hours)
    } else if hours < 36 {
        "a day".to_string()
    } else if days < 26 {
        format!("{} days", days)
    } else if days < 45 {
        "a month".to_string()
    } else if days < 320 {
        match ((days as f64) / 30.4).round() as i64 {
            months if months <= 1 => "a month".to_string(),
            months => format!("{} months", months),
        }
    } else if days < 548 {
        "a year".to_string()
    } else {
        format!("{} years", ((days as f64) / 365.0).round() as i64)
    };

    if delta.num_seconds() >= 0 {
        format!("{} ago", phrase)
    } else {
        format!("in {}", phrase)
    }
}
