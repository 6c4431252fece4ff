//! Shared model for the AutoHeal locator workspace.
//!
//! Every other crate speaks in these types: element snapshots and their
//! fingerprints, AI analysis results, cached selectors, selector detection
//! and the Playwright locator grammar.

pub mod analysis;
pub mod cached;
pub mod duration;
pub mod element;
pub mod errors;
pub mod playwright;
pub mod selector;
pub mod strategy;

pub use analysis::*;
pub use cached::*;
pub use element::*;
pub use errors::*;
pub use playwright::*;
pub use selector::*;
pub use strategy::*;
