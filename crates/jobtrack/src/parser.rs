//! MIME message parsing
//!
//! Turns raw RFC 822 bytes into a [`ParsedEmail`]: sender, subject and a
//! single-line plain-text body that the classifiers consume.

use log::debug;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::models::{MessageId, ParsedEmail, RawMessage};

/// Subject used when the header is missing or blank
pub const NO_SUBJECT: &str = "No Subject";

/// Sender used when the `From` header is missing or blank
pub const UNKNOWN_SENDER: &str = "Unknown Sender";

/// Line width handed to the HTML renderer; wide enough that it never wraps prose
const HTML_RENDER_WIDTH: usize = 10_000;

/// Error raised when a payload is not parseable as MIME at all
#[derive(Debug, thiserror::Error)]
#[error("Failed to parse message {id}: {reason}")]
pub struct ParseError {
    pub id: MessageId,
    pub reason: String,
}

/// Decodes raw messages into [`ParsedEmail`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageParser;

impl MessageParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw message.
    ///
    /// Text and HTML parts that are not attachments are decoded with their
    /// declared charset, HTML is reduced to its text, and the fragments are
    /// joined in traversal order. Inside `multipart/alternative` only the
    /// plain-text alternative is used when one exists. All CR/LF characters
    /// are then removed and the result trimmed.
    pub fn parse(&self, raw: &RawMessage) -> Result<ParsedEmail, ParseError> {
        let mail = mailparse::parse_mail(&raw.data).map_err(|e| ParseError {
            id: raw.id.clone(),
            reason: e.to_string(),
        })?;

        let headers = mail.get_headers();
        let sender = non_blank(headers.get_first_value("From"))
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
        let subject = non_blank(headers.get_first_value("Subject"))
            .unwrap_or_else(|| NO_SUBJECT.to_string());

        let mut fragments = Vec::new();
        collect_text(&mail, &mut fragments);

        debug!(
            "Parsed message {}: {} text fragment(s), subject={:?}",
            raw.id,
            fragments.len(),
            subject
        );

        Ok(ParsedEmail {
            sender,
            subject,
            body: normalize_body(&fragments.join("\n")),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Walk the MIME tree depth-first, pushing decoded text in document order
fn collect_text(part: &ParsedMail, out: &mut Vec<String>) {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();

    if mimetype.starts_with("multipart/") {
        if mimetype == "multipart/alternative" {
            if let Some(chosen) = preferred_alternative(&part.subparts) {
                collect_text(chosen, out);
            }
            return;
        }
        for sub in &part.subparts {
            collect_text(sub, out);
        }
        return;
    }

    if is_attachment(part) {
        return;
    }

    match mimetype.as_str() {
        "text/plain" => match part.get_body() {
            Ok(text) => out.push(text),
            Err(e) => debug!("Skipping undecodable text/plain part: {}", e),
        },
        "text/html" => match part.get_body() {
            Ok(html) => out.push(html_to_text(&html)),
            Err(e) => debug!("Skipping undecodable text/html part: {}", e),
        },
        _ => {}
    }
}

/// Pick the alternative to read: plain text if offered, else the richest (last) one
fn preferred_alternative<'a, 'b>(alternatives: &'b [ParsedMail<'a>]) -> Option<&'b ParsedMail<'a>> {
    alternatives
        .iter()
        .find(|p| p.ctype.mimetype.eq_ignore_ascii_case("text/plain") && !is_attachment(p))
        .or_else(|| alternatives.last())
}

fn is_attachment(part: &ParsedMail) -> bool {
    part.get_content_disposition().disposition == DispositionType::Attachment
}

/// Reduce an HTML document to its visible text
fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), HTML_RENDER_WIDTH).unwrap_or_else(|e| {
        debug!("HTML renderer failed ({}), stripping tags instead", e);
        strip_tags(html)
    })
}

/// Fallback markup stripper: drops everything between `<` and `>`
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// Remove every CR and LF and trim the ends.
///
/// Classifiers work on a single line; paragraphs merge as a result.
pub fn normalize_body(text: &str) -> String {
    text.replace(['\n', '\r'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(data: &str) -> RawMessage {
        RawMessage::new("m1", data.as_bytes().to_vec())
    }

    fn parse(data: &str) -> ParsedEmail {
        MessageParser::new().parse(&raw(data)).unwrap()
    }

    #[test]
    fn test_single_part_plain() {
        let email = parse(
            "From: Recruiter <jobs@acme.com>\r\n\
             Subject: Application received\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             Thanks for applying\r\nto Acme.\r\n",
        );

        assert_eq!(email.sender, "Recruiter <jobs@acme.com>");
        assert_eq!(email.subject, "Application received");
        assert_eq!(email.body, "Thanks for applyingto Acme.");
    }

    #[test]
    fn test_alternative_prefers_plain_text() {
        let email = parse(
            "From: jobs@acme.com\r\n\
             Subject: Hi\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
             \r\n\
             --b1\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             Hello\nWorld\r\n\
             --b1\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             \r\n\
             <p>Hello</p><p>World</p>\r\n\
             --b1--\r\n",
        );

        assert_eq!(email.body, "HelloWorld");
    }

    #[test]
    fn test_html_only_is_stripped() {
        let email = parse(
            "From: jobs@acme.com\r\n\
             Subject: Interview\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             \r\n\
             <html><body><b>Interview</b> scheduled</body></html>\r\n",
        );

        assert!(email.body.contains("Interview"));
        assert!(email.body.contains("scheduled"));
        assert!(!email.body.contains('<'));
        assert!(!email.body.contains('\n'));
    }

    #[test]
    fn test_mixed_concatenates_and_skips_attachments() {
        let email = parse(
            "From: jobs@acme.com\r\n\
             Subject: Offer\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
             \r\n\
             --outer\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             First part.\r\n\
             --outer\r\n\
             Content-Type: text/plain\r\n\
             Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
             \r\n\
             attached notes\r\n\
             --outer\r\n\
             Content-Type: image/png\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             iVBORw0KGgo=\r\n\
             --outer\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             Second part.\r\n\
             --outer--\r\n",
        );

        assert_eq!(email.body, "First part.Second part.");
    }

    #[test]
    fn test_declared_charset_and_transfer_encoding() {
        let email = parse(
            "From: jobs@acme.com\r\n\
             Subject: =?utf-8?q?Caf=C3=A9_role?=\r\n\
             Content-Type: text/plain; charset=iso-8859-1\r\n\
             Content-Transfer-Encoding: quoted-printable\r\n\
             \r\n\
             Caf=E9 barista\r\n",
        );

        assert_eq!(email.subject, "Café role");
        assert_eq!(email.body, "Café barista");
    }

    #[test]
    fn test_missing_headers_and_body() {
        let email = parse(
            "Content-Type: image/png\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             iVBORw0KGgo=\r\n",
        );

        assert_eq!(email.subject, NO_SUBJECT);
        assert_eq!(email.sender, UNKNOWN_SENDER);
        assert_eq!(email.body, "");
    }

    #[test]
    fn test_blank_subject_uses_sentinel() {
        let email = parse("From: a@b.com\r\nSubject:   \r\n\r\nbody\r\n");
        assert_eq!(email.subject, NO_SUBJECT);
        assert_eq!(email.body, "body");
    }

    #[test]
    fn test_normalize_body() {
        assert_eq!(normalize_body("  a\r\nb\nc  \n"), "abc");
        assert_eq!(normalize_body("\n\n"), "");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>there</b></p>"), "Hello there");
    }
}
