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

use std::sync::{Arc, LazyLock};

use crate::modules::indexer::fields::*;
use tantivy::schema::{Field, Schema, FAST, INDEXED, STORED, STRING, TEXT};

static EMAIL_FIELDS: LazyLock<Arc<EmailFields>> = LazyLock::new(|| {
    let (_, fields) = SchemaTools::create_email_schema();
    Arc::new(fields)
});

pub struct SchemaTools;

impl SchemaTools {
    pub fn email_schema() -> Schema {
        let (schema, _) = Self::create_email_schema();
        schema
    }

    pub fn email_fields() -> &'static EmailFields {
        &EMAIL_FIELDS
    }

    /// Fields searched by a free-text query.
    pub fn email_default_fields() -> Vec<Field> {
        let fields = Self::email_fields();
        vec![fields.f_subject, fields.f_from, fields.f_text]
    }

    pub fn create_email_schema() -> (Schema, EmailFields) {
        let mut builder = Schema::builder();
        // Upsert key hash, exact match only
        let f_id = builder.add_text_field(F_ID, STRING | STORED);
        // Keyword filters: exact, case-sensitive
        let f_account = builder.add_text_field(F_ACCOUNT, STRING | STORED);
        let f_folder = builder.add_text_field(F_FOLDER, STRING | STORED);
        let f_category = builder.add_text_field(F_CATEGORY, STRING | STORED);
        let f_uid = builder.add_u64_field(F_UID, INDEXED | STORED);
        let f_uid_validity = builder.add_u64_field(F_UID_VALIDITY, INDEXED | STORED);
        let f_message_id = builder.add_text_field(F_MESSAGE_ID, STRING | STORED);
        // Tokenized for full-text search
        let f_from = builder.add_text_field(F_FROM, TEXT | STORED);
        let f_to = builder.add_text_field(F_TO, TEXT | STORED);
        let f_subject = builder.add_text_field(F_SUBJECT, TEXT | STORED);
        let f_text = builder.add_text_field(F_TEXT, TEXT | STORED);
        let f_html = builder.add_text_field(F_HTML, STORED);
        // Epoch millis, sort key
        let f_date = builder.add_i64_field(F_DATE, STORED | FAST);
        let fields = EmailFields {
            f_id,
            f_account,
            f_folder,
            f_category,
            f_uid,
            f_uid_validity,
            f_message_id,
            f_from,
            f_to,
            f_subject,
            f_text,
            f_html,
            f_date,
        };
        (builder.build(), fields)
    }
}
