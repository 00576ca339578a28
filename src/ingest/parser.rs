//! Email parsing and normalization.
//!
//! Parses raw RFC 5322 message bytes into structured records suitable for
//! storage and threading, using the `mailparse` crate for MIME handling.
//!
//! A missing or mangled Message-ID is not an error: such emails cannot be
//! linked by references, but they must still flow through the pipeline and
//! end up in a thread of their own (or be picked up by the subject
//! fallback). Missing sender or an unusable Date header does reject the
//! record; the loader skips it with a warning and moves on.

use chrono::{DateTime, Duration, Utc};
use mailparse::{MailHeaderMap, parse_mail};
use thiserror::Error;

use crate::threading::normalize_subject;

/// Structured representation of a parsed email, before an id is assigned.
#[derive(Debug, Clone)]
pub struct ParsedEmail {
    pub message_id: Option<String>,
    pub subject: String,
    pub normalized_subject: String,
    pub date: DateTime<Utc>,
    pub sender_name: String,
    pub sender_email: String,
    pub body: String,
    pub to_addrs: Vec<(String, String)>,
    pub cc_addrs: Vec<(String, String)>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

impl ParsedEmail {
    /// All referenced message ids relevant for threading: the References
    /// chain plus In-Reply-To, deduplicated, order preserved.
    pub fn referenced_ids(&self) -> Vec<String> {
        let mut ids = self.references.clone();
        if let Some(irt) = &self.in_reply_to {
            if !ids.contains(irt) {
                ids.push(irt.clone());
            }
        }
        ids
    }
}

/// Maximum tolerated clock skew for future-dated emails.
const MAX_FUTURE_SKEW: Duration = Duration::hours(24);

/// Errors that can be returned while parsing and validating an email.
#[derive(Debug, Error)]
pub enum ParseEmailError {
    #[error("failed to parse MIME structure: {0}")]
    MimeParse(#[from] mailparse::MailParseError),
    #[error("missing sender address for message {subject:?}")]
    MissingSender { subject: String },
    #[error("missing Date header for message {subject:?}")]
    MissingDate { subject: String },
    #[error("invalid Date header `{raw}` for message {subject:?}: {error}")]
    InvalidDate {
        subject: String,
        raw: String,
        error: String,
    },
    #[error("future Date header `{raw}` for message {subject:?}")]
    FutureDate { subject: String, raw: String },
}

/// Strip NUL bytes and surrounding whitespace from header/body text.
fn sanitize_text(text: &str) -> String {
    text.replace('\0', "").trim().to_string()
}

/// Clean a message id by removing angle brackets and whitespace.
fn normalize_message_id(msg_id: Option<String>) -> Option<String> {
    msg_id.and_then(|id| {
        let cleaned = id.trim().trim_matches(&['<', '>'][..]).trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(sanitize_text(cleaned))
        }
    })
}

/// Parse (name, address) pairs out of a To/Cc header value.
fn parse_email_addresses(header_value: &str) -> Vec<(String, String)> {
    let mut addresses = Vec::new();

    for addr_str in header_value.split(',') {
        if let Ok(addr) = mailparse::addrparse(addr_str.trim()) {
            for single in addr.iter() {
                if let mailparse::MailAddr::Single(info) = single {
                    let name = info.display_name.clone().unwrap_or_default();
                    addresses.push((sanitize_text(&name), info.addr.to_lowercase()));
                }
            }
        }
    }

    addresses
}

/// Extract message ids from a References header value.
fn extract_references(header_value: &str) -> Vec<String> {
    header_value
        .split_whitespace()
        .map(|id| {
            let cleaned = id.trim().trim_matches(&['<', '>'][..]);
            sanitize_text(cleaned)
        })
        .filter(|id| !id.is_empty())
        .collect()
}

/// Parse raw message bytes into a structured record.
///
/// Required: a usable sender address and a parseable, non-future Date.
/// Everything else degrades gracefully: subject falls back to
/// `(No Subject)`, body to the empty string, Message-ID to `None`.
pub fn parse_email(raw: &[u8]) -> Result<ParsedEmail, ParseEmailError> {
    let parsed = parse_mail(raw)?;

    let message_id = normalize_message_id(parsed.headers.get_first_value("Message-ID"));

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| sanitize_text(&s))
        .unwrap_or_else(|| "(No Subject)".to_string());

    let date = parse_email_date(parsed.headers.get_first_value("Date"), &subject)?;

    let from_str = parsed.headers.get_first_value("From").unwrap_or_default();
    let (sender_name, sender_email) = if let Ok(addrs) = mailparse::addrparse(&from_str) {
        if let Some(mailparse::MailAddr::Single(info)) = addrs.iter().next() {
            let name = info.display_name.clone().unwrap_or_default();
            (sanitize_text(&name), info.addr.to_lowercase())
        } else {
            (String::new(), String::new())
        }
    } else {
        (String::new(), String::new())
    };

    if sender_email.is_empty() {
        log::warn!("email ({}) missing sender address, skipping", subject);
        return Err(ParseEmailError::MissingSender { subject });
    }

    // Prefer the first text/plain part of multipart messages.
    let body = if parsed.subparts.is_empty() {
        parsed.get_body().unwrap_or_default()
    } else {
        let mut body_text = String::new();
        for part in &parsed.subparts {
            if part.ctype.mimetype.as_str() == "text/plain" {
                body_text = part.get_body().unwrap_or_default();
                break;
            }
        }
        if body_text.is_empty() {
            parsed.get_body().unwrap_or_default()
        } else {
            body_text
        }
    };
    let body = sanitize_text(&body);

    let to_addrs = parsed
        .headers
        .get_first_value("To")
        .map(|v| parse_email_addresses(&v))
        .unwrap_or_default();

    let cc_addrs = parsed
        .headers
        .get_first_value("Cc")
        .map(|v| parse_email_addresses(&v))
        .unwrap_or_default();

    let in_reply_to = normalize_message_id(parsed.headers.get_first_value("In-Reply-To"));

    let references = parsed
        .headers
        .get_first_value("References")
        .map(|v| extract_references(&v))
        .unwrap_or_default();

    let normalized_subject = normalize_subject(&subject);

    log::trace!(
        "parsed: {} - {}",
        message_id.as_deref().unwrap_or("<no message id>"),
        subject
    );

    Ok(ParsedEmail {
        message_id,
        subject,
        normalized_subject,
        date,
        sender_name,
        sender_email,
        body,
        to_addrs,
        cc_addrs,
        in_reply_to,
        references,
    })
}

fn parse_email_date(
    raw_date: Option<String>,
    subject: &str,
) -> Result<DateTime<Utc>, ParseEmailError> {
    let raw = raw_date.unwrap_or_default();
    if raw.trim().is_empty() {
        log::warn!("email ({}) missing Date header, skipping", subject);
        return Err(ParseEmailError::MissingDate {
            subject: subject.to_string(),
        });
    }

    match dateparser::parse(&raw) {
        Ok(dt) => {
            let utc = dt.with_timezone(&Utc);
            let now = Utc::now();
            if utc > now + MAX_FUTURE_SKEW {
                log::warn!(
                    "email ({}) has future date `{}` (> {} hours ahead), skipping",
                    subject,
                    raw,
                    MAX_FUTURE_SKEW.num_hours()
                );
                Err(ParseEmailError::FutureDate {
                    subject: subject.to_string(),
                    raw,
                })
            } else {
                Ok(utc)
            }
        }
        Err(source) => {
            log::warn!(
                "email ({}) has invalid date `{}`, skipping: {}",
                subject,
                raw,
                source
            );
            Err(ParseEmailError::InvalidDate {
                subject: subject.to_string(),
                raw,
                error: source.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("hello\0world"), "helloworld");
        assert_eq!(sanitize_text("  test  "), "test");
    }

    #[test]
    fn test_normalize_message_id() {
        assert_eq!(
            normalize_message_id(Some("<test@example.com>".to_string())),
            Some("test@example.com".to_string())
        );
        assert_eq!(normalize_message_id(Some("".to_string())), None);
        assert_eq!(normalize_message_id(None), None);
    }

    #[test]
    fn test_extract_references() {
        let refs = extract_references("<msg1@example.com> <msg2@example.com>");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], "msg1@example.com");
        assert_eq!(refs[1], "msg2@example.com");
    }

    #[test]
    fn test_parse_email_without_message_id_succeeds() {
        let raw = concat!(
            "Subject: No id here\r\n",
            "From: Tester <tester@example.com>\r\n",
            "Date: Mon, 2 Jun 2025 10:00:00 +0000\r\n",
            "\r\n",
            "Body\r\n"
        );

        let email = parse_email(raw.as_bytes()).unwrap();
        assert!(email.message_id.is_none());
        assert_eq!(email.subject, "No id here");
    }

    #[test]
    fn test_parse_email_rejects_missing_date() {
        let raw = concat!(
            "Message-ID: <missing-date@test>\r\n",
            "Subject: Missing Date\r\n",
            "From: Tester <tester@example.com>\r\n",
            "\r\n",
            "Body\r\n"
        );

        let err = parse_email(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseEmailError::MissingDate { .. }));
    }

    #[test]
    fn test_parse_email_rejects_invalid_date() {
        let raw = concat!(
            "Message-ID: <invalid-date@test>\r\n",
            "Subject: Invalid Date\r\n",
            "From: Tester <tester@example.com>\r\n",
            "Date: not-a-real-date\r\n",
            "\r\n",
            "Body\r\n"
        );

        let err = parse_email(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseEmailError::InvalidDate { .. }));
    }

    #[test]
    fn test_parse_email_rejects_future_date() {
        let future = Utc::now() + Duration::days(10);
        let raw = format!(
            "Message-ID: <future-date@test>\r\nSubject: Future Date\r\nFrom: Tester <tester@example.com>\r\nDate: {}\r\n\r\nBody\r\n",
            future.to_rfc2822()
        );

        let err = parse_email(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseEmailError::FutureDate { .. }));
    }

    #[test]
    fn test_referenced_ids_merges_in_reply_to() {
        let raw = concat!(
            "Message-ID: <c@test>\r\n",
            "Subject: Re: chain\r\n",
            "From: Tester <tester@example.com>\r\n",
            "Date: Mon, 2 Jun 2025 10:00:00 +0000\r\n",
            "References: <a@test> <b@test>\r\n",
            "In-Reply-To: <b@test>\r\n",
            "\r\n",
            "Body\r\n"
        );

        let email = parse_email(raw.as_bytes()).unwrap();
        assert_eq!(email.referenced_ids(), vec!["a@test", "b@test"]);
    }
}
