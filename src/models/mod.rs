//! Canonical entity models shared by all providers.
//!
//! Every provider's idiosyncratic JSON is normalized into these types, so
//! callers see one shape regardless of which backend answered. Instances
//! are value objects: created fresh by a normalizer on every upstream
//! success and never mutated afterwards.

mod author;
mod journal;
mod paper;
mod query;

pub use author::Author;
pub use journal::Journal;
pub use paper::Paper;
pub use query::{CitationDirection, CitationRelations, SearchOptions};
