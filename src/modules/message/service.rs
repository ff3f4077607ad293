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

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    modules::{
        classifier::Category,
        error::{code::ErrorCode, OneboxResult},
        indexer::{document::EmailDocument, manager::EmailIndex},
        message::search::ListFilter,
        notify::Notifier,
        reply::ReplySuggester,
    },
    raise_error,
};

/// Operations behind the HTTP API.
#[derive(Clone)]
pub struct EmailService {
    index: Arc<EmailIndex>,
    notifier: Arc<dyn Notifier>,
    suggester: Arc<dyn ReplySuggester>,
    page_size: usize,
}

impl EmailService {
    pub fn new(
        index: Arc<EmailIndex>,
        notifier: Arc<dyn Notifier>,
        suggester: Arc<dyn ReplySuggester>,
        page_size: usize,
    ) -> Self {
        Self {
            index,
            notifier,
            suggester,
            page_size,
        }
    }

    pub fn index(&self) -> &Arc<EmailIndex> {
        &self.index
    }

    pub async fn list(&self, filter: &ListFilter) -> OneboxResult<Vec<EmailDocument>> {
        self.index.list(filter, self.page_size).await
    }

    /// Overwrites the category of a stored email. `Interested` triggers one
    /// notification.
    pub async fn set_category(
        &self,
        id: &str,
        category: Option<&str>,
    ) -> OneboxResult<EmailDocument> {
        let label = category.ok_or_else(|| {
            raise_error!(
                "Missing required field 'category'".into(),
                ErrorCode::InvalidParameter
            )
        })?;
        let category = Category::from_label(label).ok_or_else(|| {
            raise_error!(
                format!("Unknown category '{}'", label),
                ErrorCode::InvalidParameter
            )
        })?;
        let mut email = self.index.get(id).await?.ok_or_else(|| not_found(id))?;
        email.category = category;
        self.index.upsert(&email).await?;
        info!("Email {} recategorized as '{}'", id, category);

        if category == Category::Interested {
            self.notify(&email).await;
        }
        Ok(email)
    }

    pub async fn mark_interested(&self, id: &str) -> OneboxResult<EmailDocument> {
        let email = self
            .index
            .update_category(id, Category::Interested)
            .await?
            .ok_or_else(|| not_found(id))?;
        info!("Email {} marked as Interested", id);
        self.notify(&email).await;
        Ok(email)
    }

    pub async fn suggest_reply(&self, email_text: Option<&str>) -> OneboxResult<String> {
        let text = email_text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                raise_error!(
                    "Missing required field 'emailText'".into(),
                    ErrorCode::InvalidParameter
                )
            })?;
        self.suggester.suggest(text).await
    }

    async fn notify(&self, email: &EmailDocument) {
        if let Err(e) = self.notifier.notify_interested(email).await {
            warn!("Interested notification for email {} failed: {}", email.id, e);
        }
    }
}

fn not_found(id: &str) -> crate::modules::error::OneboxError {
    raise_error!(
        format!("Email '{}' not found", id),
        ErrorCode::ResourceNotFound
    )
}
