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

use poem_openapi::{OpenApiService, Tags};

use crate::modules::rest::api::{email::EmailApi, reply::ReplyApi, status::StatusApi};

pub mod email;
pub mod reply;
pub mod status;

#[derive(Tags)]
pub enum ApiTags {
    /// Browse, search and recategorize indexed emails
    Email,
    /// Draft replies from agenda context
    Reply,
    /// Service health
    Status,
}

type OneboxApi = (EmailApi, ReplyApi, StatusApi);

pub fn create_openapi_service() -> OpenApiService<OneboxApi, ()> {
    OpenApiService::new(
        (EmailApi, ReplyApi, StatusApi),
        "Onebox API",
        env!("CARGO_PKG_VERSION"),
    )
}
