//! Delivery of serialized mails to the indexing service.

pub mod document;
pub mod http;

pub use document::to_json;
pub use http::{HttpSink, ServiceEndpoint};

use crate::error::Result;

/// Destination for serialized mails.
///
/// `post` is a blocking call made from worker threads. No retry happens at
/// this layer: a failed post leaves the delta file on disk for the next run.
pub trait DeliverySink: Send + Sync {
    /// Post one JSON document under `id`, returning the service response body.
    fn post(&self, json: &str, id: &str) -> Result<String>;
}
