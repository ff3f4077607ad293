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
#[oai(rename_all = "camelCase")]
pub struct SuggestReplyRequest {
    pub email_text: Option<String>,
}

#[derive(Debug, Object)]
#[oai(rename_all = "camelCase")]
pub struct SuggestReplyResponse {
    pub suggested_reply: String,
}

pub struct ReplyApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Reply")]
impl ReplyApi {
    /// Drafts a reply to the given email text.
    #[oai(path = "/suggest-reply", method = "post", operation_id = "suggest_reply")]
    async fn suggest_reply(
        &self,
        payload: Json<SuggestReplyRequest>,
        service: Data<&EmailService>,
    ) -> ApiResult<Json<SuggestReplyResponse>> {
        let suggested_reply = service
            .suggest_reply(payload.0.email_text.as_deref())
            .await?;
        Ok(Json(SuggestReplyResponse { suggested_reply }))
    }
}
