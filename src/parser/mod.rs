//! Mail parsing: header decoding, MIME content tree, body extraction.

pub mod body;
pub mod decode;
pub mod header;
pub mod message;
pub mod text;
pub mod tree;
