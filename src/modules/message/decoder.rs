//
// Copyright (c) 2025 rustmailer.com (https://rustmailer.com)
//
// This file is part of the Onebox Email Triage Project
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use mail_parser::{MessageParser, PartType};

use crate::{
    modules::{
        common::AddrVec,
        error::{code::ErrorCode, OneboxResult},
    },
    raise_error, utc_now,
};

/// Parsed view of one raw RFC 5322 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Milliseconds since the epoch. The decode time when the header is missing.
    pub date: i64,
    pub text: String,
    pub html: String,
    pub message_id: Option<String>,
}

pub fn decode_message(raw: &[u8]) -> OneboxResult<DecodedMessage> {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(raise_error!(
            "Cannot decode an empty message".into(),
            ErrorCode::MessageDecodeFailed
        ));
    }
    let message = MessageParser::default().parse(raw).ok_or_else(|| {
        raise_error!(
            "Message has no parsable header block".into(),
            ErrorCode::MessageDecodeFailed
        )
    })?;
    if message.root_part().headers().is_empty() {
        return Err(raise_error!(
            "Message has no parsable header block".into(),
            ErrorCode::MessageDecodeFailed
        ));
    }

    let render = |address: Option<&mail_parser::Address>| {
        address
            .map(|a| AddrVec::from(a).to_string())
            .unwrap_or_default()
    };

    Ok(DecodedMessage {
        from: render(message.from()),
        to: render(message.to()),
        subject: message.subject().unwrap_or_default().to_string(),
        date: message
            .date()
            .map(|d| d.to_timestamp() * 1000)
            .unwrap_or_else(|| utc_now!()),
        text: message
            .body_text(0)
            .map(|t| t.into_owned())
            .unwrap_or_default(),
        // body_html would synthesize markup from a text-only body
        html: message
            .html_part(0)
            .and_then(|part| match &part.body {
                PartType::Html(html) => Some(html.to_string()),
                _ => None,
            })
            .unwrap_or_default(),
        message_id: message.message_id().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &[u8] = b"From: Jane Roe <jane@example.com>\r\n\
To: ops@example.com, \"Sales Team\" <sales@example.com>\r\n\
Subject: Quarterly review\r\n\
Date: Tue, 01 Oct 2024 10:00:00 +0000\r\n\
Message-ID: <review-1@example.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Can we schedule a call?\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Can we schedule a call?</p>\r\n\
--b1--\r\n";

    #[test]
    fn decodes_headers_and_both_bodies() {
        let decoded = decode_message(MULTIPART).unwrap();
        assert_eq!(decoded.from, "Jane Roe <jane@example.com>");
        assert_eq!(decoded.to, "ops@example.com, Sales Team <sales@example.com>");
        assert_eq!(decoded.subject, "Quarterly review");
        assert_eq!(decoded.date, 1_727_776_800_000);
        assert!(decoded.text.contains("schedule a call"));
        assert!(decoded.html.contains("<p>"));
        assert_eq!(decoded.message_id.as_deref(), Some("review-1@example.com"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let before = utc_now!();
        let decoded = decode_message(b"From: a@example.com\r\n\r\nhello\r\n").unwrap();
        assert_eq!(decoded.to, "");
        assert_eq!(decoded.subject, "");
        assert_eq!(decoded.html, "");
        assert!(decoded.message_id.is_none());
        assert!(decoded.date >= before);
        assert!(decoded.text.contains("hello"));
    }

    #[test]
    fn empty_input_is_a_decode_failure() {
        let err = decode_message(b"").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MessageDecodeFailed);
        assert!(decode_message(b"  \r\n").is_err());
    }
}
