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
use poem_openapi::{
    param::{Path, Query},
    payload::Json,
    Object, OpenApi,
};

use crate::modules::{
    indexer::document::EmailDocument,
    message::{search::ListFilter, service::EmailService},
    rest::{api::ApiTags, ApiResult},
};

#[derive(Debug, Object)]
pub struct UpdateCategoryRequest {
    /// One of the category labels, e.g. `Interested` or `Meeting Booked`.
    pub category: Option<String>,
}

#[derive(Debug, Object)]
pub struct UpdateCategoryResponse {
    pub success: bool,
    pub updated: EmailDocument,
}

#[derive(Debug, Object)]
pub struct MarkInterestedResponse {
    pub success: bool,
    pub email: EmailDocument,
}

pub struct EmailApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Email")]
impl EmailApi {
    /// Lists indexed emails, newest first unless `sort=asc`.
    ///
    /// Every given filter must match. `search` is a full-text query over
    /// subject, sender and body.
    #[oai(path = "/emails", method = "get", operation_id = "list_emails")]
    async fn list_emails(
        &self,
        folder: Query<Option<String>>,
        account: Query<Option<String>>,
        category: Query<Option<String>>,
        search: Query<Option<String>>,
        sort: Query<Option<String>>,
        service: Data<&EmailService>,
    ) -> ApiResult<Json<Vec<EmailDocument>>> {
        let filter = ListFilter::new(folder.0, account.0, category.0, search.0, sort.0);
        Ok(Json(service.list(&filter).await?))
    }

    /// Sets the category of an email. Setting `Interested` sends the
    /// configured notifications.
    #[oai(path = "/emails/:id", method = "patch", operation_id = "update_category")]
    async fn update_category(
        &self,
        id: Path<String>,
        payload: Json<UpdateCategoryRequest>,
        service: Data<&EmailService>,
    ) -> ApiResult<Json<UpdateCategoryResponse>> {
        let updated = service
            .set_category(&id.0, payload.0.category.as_deref())
            .await?;
        Ok(Json(UpdateCategoryResponse {
            success: true,
            updated,
        }))
    }

    /// Marks an email as Interested and sends the configured notifications.
    #[oai(
        path = "/emails/:id/mark-interested",
        method = "post",
        operation_id = "mark_interested"
    )]
    async fn mark_interested(
        &self,
        id: Path<String>,
        service: Data<&EmailService>,
    ) -> ApiResult<Json<MarkInterestedResponse>> {
        let email = service.mark_interested(&id.0).await?;
        Ok(Json(MarkInterestedResponse {
            success: true,
            email,
        }))
    }
}
