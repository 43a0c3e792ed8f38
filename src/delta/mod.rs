//! The delta folder: file discovery, file name decoding and active-list filtering.

pub mod filename;
pub mod filter;
pub mod folder;

pub use filename::{decode, encode};
pub use filter::filter;
pub use folder::discover;
