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

use poem::web::Data;
use poem_openapi::{payload::Json, Object, OpenApi};

use crate::modules::{
    message::service::EmailService,
    rest::{api::ApiTags, ApiResult},
};

#[derive(Debug, Object)]
pub struct ServiceStatus {
    pub version: String,
    /// Emails currently in the index.
    pub documents: u64,
}

pub struct StatusApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Status")]
impl StatusApi {
    #[oai(path = "/status", method = "get", operation_id = "get_status")]
    async fn get_status(&self, service: Data<&EmailService>) -> ApiResult<Json<ServiceStatus>> {
        Ok(Json(ServiceStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            documents: service.index().count()?,
        }))
    }
}
