//! mboxdelta: drains a delta folder of archived mailing-list messages into a
//! search indexing service.
//!
//! - [`delta`] finds ready files and decodes their names
//! - [`parser`] turns raw messages into [`model::mail::Mail`] records
//! - [`deliver`] serializes and posts them
//! - [`pipeline`] runs all of it on a bounded worker pool

pub mod config;
pub mod deliver;
pub mod delta;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
