//! Raw message handling: header-block parsing and the relay rewrite.

pub mod headers;
pub mod rewrite;

pub use headers::{HeaderField, ParsedHeaders, ParsedMessage, parse_message};
pub use rewrite::{RewriteContext, new_from_address, rewrite_message, write_updated_headers};
