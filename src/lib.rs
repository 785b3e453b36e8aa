//! Looping photo slideshow fed by the Photorank API.
//!
//! [`photorank`] talks to the remote API, [`enrich`] joins media with their
//! uploaders, [`loader`] turns the paginated collection into gallery pages
//! and [`sequencer`] plays intro, pages and outro on a [`stage::Stage`]
//! forever. [`slideshow`] ties them together and keeps one instance alive
//! per process.

pub mod config;
pub mod enrich;
pub mod error;
pub mod loader;
pub mod page;
pub mod photorank;
pub mod sequencer;
pub mod slideshow;
pub mod stage;
pub mod templates;

#[cfg(test)]
mod testing;

pub use config::SlideshowConfig;
pub use error::{Error, FetchError, Result};
pub use slideshow::{Slideshow, SlideshowHandle};
