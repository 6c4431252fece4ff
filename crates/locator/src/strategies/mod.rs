//! AI-backed locator strategies
//!
//! - [`DomElementLocator`] sends the page source to the AI and validates the
//!   selector it recommends.
//! - [`VisualElementLocator`] sends a screenshot and walks the primary
//!   suggestion, then the alternatives.

mod dom;
mod visual;

pub use dom::DomElementLocator;
pub use visual::VisualElementLocator;
