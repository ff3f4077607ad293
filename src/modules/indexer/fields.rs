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

use tantivy::schema::Field;

pub const F_ID: &str = "id";
pub const F_ACCOUNT: &str = "account";
pub const F_FOLDER: &str = "folder";
pub const F_CATEGORY: &str = "category";
pub const F_UID: &str = "uid";
pub const F_UID_VALIDITY: &str = "uid_validity";
pub const F_MESSAGE_ID: &str = "message_id";
pub const F_FROM: &str = "from";
pub const F_TO: &str = "to";
pub const F_SUBJECT: &str = "subject";
pub const F_TEXT: &str = "text";
pub const F_HTML: &str = "html";
pub const F_DATE: &str = "date";

pub struct EmailFields {
    pub f_id: Field,
    pub f_account: Field,
    pub f_folder: Field,
    pub f_category: Field,
    pub f_uid: Field,
    pub f_uid_validity: Field,
    pub f_message_id: Field,
    pub f_from: Field,
    pub f_to: Field,
    pub f_subject: Field,
    pub f_text: Field,
    pub f_html: Field,
    pub f_date: Field,
}
