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

use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use tantivy::schema::Value;
use tantivy::TantivyDocument;

use crate::modules::{
    classifier::Category,
    error::{code::ErrorCode, OneboxResult},
    indexer::schema::SchemaTools,
    message::decoder::DecodedMessage,
    utils::create_hash,
};
use crate::raise_error;

/// A classified email as persisted in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
pub struct EmailDocument {
    /// Stable hash of (account, folder, UIDVALIDITY, UID).
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Milliseconds since the epoch.
    pub date: i64,
    pub text: String,
    pub html: String,
    /// Owning mailbox identity (the IMAP login).
    pub account: String,
    pub folder: String,
    pub category: Category,
    pub uid: u32,
    /// UIDVALIDITY of the folder when the message was fetched.
    pub uid_validity: u32,
    pub message_id: Option<String>,
}

/// Document id for one mailbox message. Same key, same id.
pub fn document_id(account: &str, folder: &str, uid_validity: u32, uid: u32) -> String {
    create_hash(&[
        account,
        folder,
        &uid_validity.to_string(),
        &uid.to_string(),
    ])
}

impl EmailDocument {
    pub fn from_decoded(
        account: &str,
        folder: &str,
        uid_validity: u32,
        uid: u32,
        message: DecodedMessage,
        category: Category,
    ) -> Self {
        Self {
            id: document_id(account, folder, uid_validity, uid),
            from: message.from,
            to: message.to,
            subject: message.subject,
            date: message.date,
            text: message.text,
            html: message.html,
            account: account.to_string(),
            folder: folder.to_string(),
            category,
            uid,
            uid_validity,
            message_id: message.message_id,
        }
    }

    pub fn to_document(&self) -> TantivyDocument {
        let f = SchemaTools::email_fields();
        let mut doc = TantivyDocument::new();
        doc.add_text(f.f_id, &self.id);
        doc.add_text(f.f_account, &self.account);
        doc.add_text(f.f_folder, &self.folder);
        doc.add_text(f.f_category, self.category.label());
        doc.add_u64(f.f_uid, self.uid as u64);
        doc.add_u64(f.f_uid_validity, self.uid_validity as u64);
        if let Some(message_id) = &self.message_id {
            doc.add_text(f.f_message_id, message_id);
        }
        doc.add_text(f.f_from, &self.from);
        doc.add_text(f.f_to, &self.to);
        doc.add_text(f.f_subject, &self.subject);
        doc.add_text(f.f_text, &self.text);
        doc.add_text(f.f_html, &self.html);
        doc.add_i64(f.f_date, self.date);
        doc
    }

    pub fn from_tantivy_doc(doc: &TantivyDocument) -> OneboxResult<Self> {
        let f = SchemaTools::email_fields();
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let id = text(f.f_id).ok_or_else(|| {
            raise_error!(
                "Indexed email is missing its id".into(),
                ErrorCode::InternalError
            )
        })?;
        // stored labels are always written by Category::label
        let category = text(f.f_category)
            .and_then(|label| Category::from_label(&label))
            .unwrap_or(Category::NotCategorized);
        let uid = doc
            .get_first(f.f_uid)
            .and_then(|v| v.as_u64())
            .unwrap_or_default() as u32;
        let uid_validity = doc
            .get_first(f.f_uid_validity)
            .and_then(|v| v.as_u64())
            .unwrap_or_default() as u32;
        let date = doc
            .get_first(f.f_date)
            .and_then(|v| v.as_i64())
            .unwrap_or_default();

        Ok(Self {
            id,
            from: text(f.f_from).unwrap_or_default(),
            to: text(f.f_to).unwrap_or_default(),
            subject: text(f.f_subject).unwrap_or_default(),
            date,
            text: text(f.f_text).unwrap_or_default(),
            html: text(f.f_html).unwrap_or_default(),
            account: text(f.f_account).unwrap_or_default(),
            folder: text(f.f_folder).unwrap_or_default(),
            category,
            uid,
            uid_validity,
            message_id: text(f.f_message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_depends_on_every_key_part() {
        let base = document_id("a@example.com", "INBOX", 7, 42);
        assert_eq!(base, document_id("a@example.com", "INBOX", 7, 42));
        assert_ne!(base, document_id("b@example.com", "INBOX", 7, 42));
        assert_ne!(base, document_id("a@example.com", "Archive", 7, 42));
        assert_ne!(base, document_id("a@example.com", "INBOX", 8, 42));
        assert_ne!(base, document_id("a@example.com", "INBOX", 7, 43));
    }

    #[test]
    fn stored_fields_survive_the_index_representation() {
        let email = EmailDocument {
            id: document_id("a@example.com", "INBOX", 1, 5),
            from: "Jane <jane@example.com>".into(),
            to: "a@example.com".into(),
            subject: "Hello".into(),
            date: 1_700_000_000_000,
            text: "body".into(),
            html: "<p>body</p>".into(),
            account: "a@example.com".into(),
            folder: "INBOX".into(),
            category: Category::OutOfOffice,
            uid: 5,
            uid_validity: 1,
            message_id: None,
        };
        let restored = EmailDocument::from_tantivy_doc(&email.to_document()).unwrap();
        assert_eq!(restored, email);
    }
}
