//! Parser for individual `.eml` files (RFC 5322 messages without MBOX framing).

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use tracing::debug;

use crate::model::address::EmailAddress;
use crate::model::attachment::Attachment;
use crate::model::message::{Message, MessageBody, MessageId};

/// Parse a raw RFC 5322 message into an immutable [`Message`] snapshot.
///
/// `fallback_date` is used when the `Date:` header is missing or unparsable
/// (the directory store passes the file modification time). Messages that
/// `mail-parser` rejects outright still produce a snapshot: the body is
/// everything after the first blank line and the headers are left empty.
pub fn parse_message(raw: &[u8], id: MessageId, fallback_date: DateTime<Utc>) -> Message {
    let data = skip_bom(raw);

    let Some(parsed) = MessageParser::default().parse(data) else {
        debug!(id = %id, "mail-parser rejected message, using raw body");
        let mut message = Message::new(id, String::new(), EmailAddress::default(), fallback_date);
        message.body.text = Some(extract_body_fallback(data));
        return message;
    };

    let subject = parsed.subject().unwrap_or_default().trim().to_string();

    let sender = parsed
        .from()
        .and_then(|from| from.first())
        .map(|addr| {
            EmailAddress::new(
                addr.name().unwrap_or_default(),
                addr.address().unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    let received = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or(fallback_date);

    let body = MessageBody {
        text: parsed.body_text(0).map(|s| s.into_owned()),
        html: parsed.body_html(0).map(|s| s.into_owned()),
    };

    let attachments = parsed
        .attachments()
        .enumerate()
        .map(|(idx, part)| {
            let filename = part
                .attachment_name()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("attachment_{}", idx + 1));

            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string())
                .to_lowercase();

            Attachment::new(filename, content_type, part.contents().to_vec())
        })
        .collect();

    Message {
        id,
        subject,
        sender,
        received,
        body,
        attachments,
        unread: true,
    }
}

fn skip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Everything after the first blank line.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    #[test]
    fn test_parse_simple_message() {
        let raw = b"From: Acme Billing <billing@acme.com>\r\n\
Subject: Invoice March\r\n\
Date: Tue, 05 Mar 2024 10:30:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Please find your invoice.\r\n";
        let msg = parse_message(raw, MessageId::new("inbox/1.eml"), epoch());
        assert_eq!(msg.subject, "Invoice March");
        assert_eq!(msg.sender.display_name, "Acme Billing");
        assert_eq!(msg.sender.address, "billing@acme.com");
        assert_eq!(
            msg.received,
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()
        );
        assert!(msg.body.text.unwrap().contains("Please find your invoice."));
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_missing_date_uses_fallback() {
        let raw = b"From: a@b.com\nSubject: No date\n\nBody\n";
        let fallback = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let msg = parse_message(raw, MessageId::new("x"), fallback);
        assert_eq!(msg.received, fallback);
    }

    #[test]
    fn test_parse_attachments_in_order() {
        let raw = b"From: a@b.com\r\n\
Subject: Files\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--XX\r\n\
Content-Type: text/plain; name=\"notes.TXT\"\r\n\
Content-Disposition: attachment; filename=\"notes.TXT\"\r\n\
\r\n\
line one\r\n\
--XX\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--XX--\r\n";
        let msg = parse_message(raw, MessageId::new("m"), epoch());
        assert_eq!(msg.attachments.len(), 2);
        assert_eq!(msg.attachments[0].filename, "notes.TXT");
        assert_eq!(msg.attachments[0].extension, "txt");
        assert_eq!(msg.attachments[1].filename, "invoice.pdf");
        assert_eq!(msg.attachments[1].content_type, "application/pdf");
        assert_eq!(msg.attachments[1].content, b"%PDF-1.4\n");
    }

    #[test]
    fn test_bom_is_skipped() {
        let raw = b"\xEF\xBB\xBFSubject: Hi\n\nBody\n";
        let msg = parse_message(raw, MessageId::new("m"), epoch());
        assert_eq!(msg.subject, "Hi");
    }

    #[test]
    fn test_fallback_body() {
        assert_eq!(extract_body_fallback(b"A: b\n\nbody"), "body");
        assert_eq!(extract_body_fallback(b"no blank line"), "");
    }
}
