//! Frontmatter
//!
//! Reading the metadata block of an MTM file and deciding what a change to it
//! means for the reload.
//!
//! The classifier itself ([`classify`]) is a pure function and safe to call
//! concurrently for different files. [`FrontmatterCache`] adds the per-file
//! memory needed to have something to diff against.

mod cache;
mod classify;
mod parse;

pub use cache::FrontmatterCache;
pub use classify::{
    classify, ChangeType, ChangeValue, FrontmatterChange, FrontmatterDiff, ReloadStrategy,
};
pub use parse::Frontmatter;
