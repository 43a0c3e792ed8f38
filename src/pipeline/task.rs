//! Processing of a single delta file.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::delta::filename;
use crate::deliver::{to_json, DeliverySink};
use crate::error::{IndexerError, Result};
use crate::model::delta::DeltaFile;
use crate::parser::body::BodyExtractor;
use crate::parser::message::parse_mail;

/// Everything a task needs, shared by all workers.
pub struct TaskContext {
    pub extractor: BodyExtractor,
    pub sink: Arc<dyn DeliverySink>,
}

/// Result of processing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Posted to the service; the file was deleted (or deletion was attempted).
    Delivered,
    /// Something failed; the file stays on disk for the next run.
    Failed,
}

/// Decode, parse, serialize and post one file, deleting it on success.
///
/// Never fails: every error is logged and turns into [`TaskOutcome::Failed`].
pub fn process(file: &DeltaFile, ctx: &TaskContext) -> TaskOutcome {
    let name = file.name();
    let mail_url = filename::decode_url(&name).unwrap_or_else(|_| name.clone());

    match deliver(file, ctx) {
        Ok(message_id) => {
            trace!(url = %mail_url, message_id = %message_id, "Mail delivered");
            if let Err(e) = std::fs::remove_file(file.path()) {
                error!(
                    file = %name,
                    exists = file.path().exists(),
                    error = %e,
                    "Could not delete file after successful processing"
                );
            }
            TaskOutcome::Delivered
        }
        Err(e) => {
            error!(url = %mail_url, error = %e, "Error processing mail");
            debug!(file = %name, details = ?e, "Error details");
            TaskOutcome::Failed
        }
    }
}

fn deliver(file: &DeltaFile, ctx: &TaskContext) -> Result<String> {
    let info = filename::decode(&file.name())?;
    debug!(url = %info.source_url, "Processing mail");

    let raw = std::fs::read(file.path()).map_err(|e| IndexerError::io(file.path(), e))?;
    let mail = parse_mail(&raw, &ctx.extractor)?.with_source(info);
    let json = to_json(&mail)?;

    let response = ctx.sink.post(&json, &mail.message_id)?;
    trace!(response = %response, "Service response");
    Ok(mail.message_id)
}
