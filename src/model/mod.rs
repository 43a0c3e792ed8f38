//! Core data model types: drop-folder entries, mails, addresses and attachments.

pub mod address;
pub mod attachment;
pub mod delta;
pub mod mail;
