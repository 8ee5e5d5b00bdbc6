//! Header rewrite for relaying an archived message.
//!
//! The relayed copy carries a fixed allow-list of the original headers, a
//! From header naming the relay sender, and a pointer back to the archived
//! original. Emission order comes from the allow-list, never from the
//! order the original happened to use.

use std::io::Write;

use lettre::message::Mailbox;

use super::headers::{ParsedHeaders, parse_message};
use crate::error::{ForwardError, RewriteError};

/// Synthetic header pointing at the archived original.
pub const PROVENANCE_HEADER: &str = "X-SES-Forwarder-Original";

/// URL scheme of the archive the provenance header points into.
pub const STORAGE_SCHEME: &str = "s3";

/// Original headers copied after From and Reply-To, in emission order.
const FORWARDED_HEADERS: [&str; 6] = ["To", "Cc", "Bcc", "Subject", "MIME-Version", "Content-Type"];

const CRLF: &[u8] = b"\r\n";

/// Per-record inputs to the rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    /// Address the relayed message is sent from.
    pub sender_address: String,
    pub bucket_name: String,
    /// Archive key of the original message.
    pub message_key: String,
}

impl RewriteContext {
    pub fn provenance_link(&self) -> String {
        format!(
            "{STORAGE_SCHEME}://{}/{}",
            self.bucket_name, self.message_key
        )
    }
}

/// Produce the relayed message: rewritten header block, blank line, original body.
pub fn rewrite_message(raw: &[u8], ctx: &RewriteContext) -> Result<Vec<u8>, ForwardError> {
    let parsed = parse_message(raw)?;

    let mut out = Vec::with_capacity(raw.len());
    write_updated_headers(&mut out, &parsed.headers, ctx)?;
    out.write_all(parsed.body).map_err(RewriteError::from)?;
    Ok(out)
}

/// Write the rewritten header block, including the terminating blank line.
///
/// The new From value is computed before anything is written, so a bad From
/// header leaves `out` untouched.
pub fn write_updated_headers<W: Write>(
    out: &mut W,
    headers: &ParsedHeaders,
    ctx: &RewriteContext,
) -> Result<(), RewriteError> {
    let orig_from = headers.get("From").unwrap_or_default();
    let new_from = new_from_address(orig_from, &ctx.sender_address)?;

    write_header(out, "From", &[new_from.as_bytes()])?;

    let reply_to: Vec<&[u8]> = headers
        .get_all_raw("Reply-To")
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect();
    if reply_to.is_empty() {
        let raw_from = headers.get_all_raw("From").first().copied().unwrap_or_default();
        write_header(out, "Reply-To", &[raw_from])?;
    } else {
        write_header(out, "Reply-To", &reply_to)?;
    }

    for name in FORWARDED_HEADERS {
        let values = headers.get_all_raw(name);
        if !values.is_empty() {
            write_header(out, name, &values)?;
        }
    }

    write_header(out, PROVENANCE_HEADER, &[ctx.provenance_link().as_bytes()])?;
    out.write_all(CRLF)?;
    Ok(())
}

/// Build the relayed From value: `[Name - ]user at domain <sender>`.
///
/// Some webmail clients take the first address-looking token in From as the
/// authenticated sender, so the original address must not contain an `@`.
pub fn new_from_address(orig_from: &str, sender_address: &str) -> Result<String, RewriteError> {
    let (address, comment) = split_trailing_comment(orig_from);
    let mailbox: Mailbox = address
        .parse()
        .map_err(|e: lettre::address::AddressError| RewriteError::FromAddress {
            value: orig_from.to_string(),
            reason: e.to_string(),
        })?;

    // `user@host (Name)`: the comment stands in for a missing display name.
    let name = mailbox
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or(comment);
    let prefix = match name {
        Some(name) => format!("{name} - "),
        None => String::new(),
    };
    let address = mailbox.email.to_string().replacen('@', " at ", 1);

    Ok(format!("{prefix}{address} <{sender_address}>"))
}

/// Split a trailing `(comment)` off an address, honoring nested parentheses.
///
/// Returns the remaining address and the trimmed comment text, if non-empty.
fn split_trailing_comment(value: &str) -> (&str, Option<&str>) {
    let trimmed = value.trim_end();
    if !trimmed.ends_with(')') {
        return (value, None);
    }

    let mut depth = 0usize;
    for (i, c) in trimmed.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    let comment = trimmed[i + 1..trimmed.len() - 1].trim();
                    let comment = (!comment.is_empty()).then_some(comment);
                    return (trimmed[..i].trim_end(), comment);
                }
            }
            _ => {}
        }
    }
    (value, None)
}

fn write_header<W: Write>(out: &mut W, name: &str, values: &[&[u8]]) -> std::io::Result<()> {
    for value in values {
        out.write_all(name.as_bytes())?;
        out.write_all(b": ")?;
        out.write_all(value)?;
        out.write_all(CRLF)?;
    }
    Ok(())
}
