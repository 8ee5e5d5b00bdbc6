//! RFC 822 header-block parsing.
//!
//! Only the header block is interpreted. Everything after the first empty
//! line is handed back as an untouched byte slice.

use crate::error::MessageParseError;

/// One header as it appeared in the original message, unfolded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field name with its original casing.
    pub name: String,
    /// Unfolded, trimmed value bytes exactly as the sender wrote them.
    pub raw: Vec<u8>,
    /// `raw` decoded for lookups and address parsing. Lossy for 8-bit values.
    pub value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        let raw = raw.into();
        let value = String::from_utf8_lossy(&raw).into_owned();
        Self {
            name: name.into(),
            raw,
            value,
        }
    }
}

/// Ordered multimap of header fields with case-insensitive lookup.
///
/// Some servers write `Mime-Version` rather than `MIME-Version`; lookups
/// never depend on the casing the sender chose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHeaders {
    fields: Vec<HeaderField>,
}

impl ParsedHeaders {
    pub fn new(fields: Vec<HeaderField>) -> Self {
        Self { fields }
    }

    /// First value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Every value for `name`, in original order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
            .collect()
    }

    /// Every raw value for `name`, in original order.
    pub fn get_all_raw(&self, name: &str) -> Vec<&[u8]> {
        self.fields
            .iter()
            .filter(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.raw.as_slice())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A message split into its parsed headers and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage<'a> {
    pub headers: ParsedHeaders,
    pub body: &'a [u8],
}

/// Parse the header block of `raw` and locate the body.
///
/// Accepts CRLF or bare LF line endings. Folded lines are joined with a
/// single space.
pub fn parse_message(raw: &[u8]) -> Result<ParsedMessage<'_>, MessageParseError> {
    let mut fields: Vec<(String, Vec<u8>)> = Vec::new();
    let mut rest = raw;

    loop {
        if rest.is_empty() {
            return Err(MessageParseError::MissingSeparator);
        }

        let (line, next, terminated) = split_line(rest);
        rest = next;

        if line.is_empty() && terminated {
            break;
        }

        if line[0] == b' ' || line[0] == b'\t' {
            let continued = line.trim_ascii();
            let Some((_, value)) = fields.last_mut() else {
                return Err(MessageParseError::InitialContinuation(
                    String::from_utf8_lossy(continued).into_owned(),
                ));
            };
            if !continued.is_empty() {
                value.push(b' ');
                value.extend_from_slice(continued);
            }
            continue;
        }

        let malformed = || MessageParseError::MalformedLine(String::from_utf8_lossy(line).into_owned());
        let colon = line.iter().position(|&b| b == b':').ok_or_else(malformed)?;
        let name = &line[..colon];
        if name.is_empty() || !name.iter().all(|b| (33..=126).contains(b)) {
            return Err(malformed());
        }

        fields.push((
            String::from_utf8_lossy(name).into_owned(),
            line[colon + 1..].to_vec(),
        ));
    }

    let fields = fields
        .into_iter()
        .map(|(name, value)| HeaderField::new(name, value.trim_ascii()))
        .collect();

    Ok(ParsedMessage {
        headers: ParsedHeaders::new(fields),
        body: rest,
    })
}

/// Split off one line. Returns (line without terminator, remainder, had terminator).
fn split_line(input: &[u8]) -> (&[u8], &[u8], bool) {
    match input.iter().position(|&b| b == b'\n') {
        Some(pos) => {
            let line = &input[..pos];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            (line, &input[pos + 1..], true)
        }
        None => (input, &[], false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_body() {
        let raw = b"From: Mike Bland <mbland@acm.org>\r\nSubject: Hi\r\n\r\nBody line\r\n";
        let msg = parse_message(raw).unwrap();

        assert_eq!(msg.headers.len(), 2);
        assert_eq!(msg.headers.get("From"), Some("Mike Bland <mbland@acm.org>"));
        assert_eq!(msg.headers.get("Subject"), Some("Hi"));
        assert_eq!(msg.body, b"Body line\r\n");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let raw = b"Mime-Version: 1.0\nCC: a@b.com\n\n";
        let msg = parse_message(raw).unwrap();

        assert_eq!(msg.headers.get("MIME-Version"), Some("1.0"));
        assert_eq!(msg.headers.get("cc"), Some("a@b.com"));
        assert!(msg.headers.contains("mime-version"));
        assert!(!msg.headers.contains("Reply-To"));
        // Original casing is preserved
        assert_eq!(msg.headers.iter().next().unwrap().name, "Mime-Version");
        assert!(msg.body.is_empty());
    }

    #[test]
    fn keeps_repeated_headers_in_order() {
        let raw = b"To: a@x.com\r\nSubject: s\r\nTo: b@x.com\r\n\r\n";
        let msg = parse_message(raw).unwrap();
        assert_eq!(msg.headers.get_all("to"), vec!["a@x.com", "b@x.com"]);
        assert_eq!(msg.headers.get("To"), Some("a@x.com"));
    }

    #[test]
    fn unfolds_continuation_lines() {
        let raw = b"Received: from mx\r\n by relay\r\n\tfor <x@y.com>\r\nSubject:\r\n  folded\r\n\r\nbody";
        let msg = parse_message(raw).unwrap();
        assert_eq!(
            msg.headers.get("Received"),
            Some("from mx by relay for <x@y.com>")
        );
        assert_eq!(msg.headers.get("Subject"), Some("folded"));
        assert_eq!(msg.body, b"body");
    }

    #[test]
    fn body_bytes_are_untouched() {
        let body: &[u8] = b"\r\n  leading blank line\r\n\xff\xfe binary\n";
        let mut raw = b"From: a@b.com\r\n\r\n".to_vec();
        raw.extend_from_slice(body);
        let msg = parse_message(&raw).unwrap();
        assert_eq!(msg.body, body);
    }

    #[test]
    fn eight_bit_values_keep_their_bytes() {
        let raw = b"Subject: Caf\xe9\r\n au lait\r\nTo: a@b.com\r\n\r\n";
        let msg = parse_message(raw).unwrap();

        assert_eq!(msg.headers.get_all_raw("subject"), vec![&b"Caf\xe9 au lait"[..]]);
        assert_eq!(msg.headers.get("Subject"), Some("Caf\u{FFFD} au lait"));
        assert_eq!(msg.headers.get_all_raw("To"), vec![&b"a@b.com"[..]]);
    }

    #[test]
    fn empty_header_block_is_allowed() {
        let msg = parse_message(b"\r\nonly a body").unwrap();
        assert!(msg.headers.is_empty());
        assert_eq!(msg.body, b"only a body");
    }

    #[test]
    fn rejects_line_without_colon() {
        let err = parse_message(b"not an email").unwrap_err();
        assert_eq!(err, MessageParseError::MalformedLine("not an email".into()));
    }

    #[test]
    fn rejects_invalid_field_name() {
        let err = parse_message(b"Bad Name: value\r\n\r\n").unwrap_err();
        assert!(matches!(err, MessageParseError::MalformedLine(_)));

        let err = parse_message(b": value\r\n\r\n").unwrap_err();
        assert!(matches!(err, MessageParseError::MalformedLine(_)));
    }

    #[test]
    fn rejects_initial_continuation() {
        let err = parse_message(b" folded first\r\nFrom: a@b.com\r\n\r\n").unwrap_err();
        assert_eq!(
            err,
            MessageParseError::InitialContinuation("folded first".into())
        );
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            parse_message(b"From: a@b.com\r\nSubject: x\r\n").unwrap_err(),
            MessageParseError::MissingSeparator
        );
        assert_eq!(
            parse_message(b"From: a@b.com").unwrap_err(),
            MessageParseError::MissingSeparator
        );
        assert_eq!(
            parse_message(b"").unwrap_err(),
            MessageParseError::MissingSeparator
        );
    }
}
