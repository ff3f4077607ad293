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

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use poem_openapi::Enum;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod keyword;
pub mod zero_shot;

/// Intent assigned to an indexed email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
pub enum Category {
    Interested,
    #[serde(rename = "Meeting Booked")]
    #[oai(rename = "Meeting Booked")]
    MeetingBooked,
    #[serde(rename = "Not Interested")]
    #[oai(rename = "Not Interested")]
    NotInterested,
    Spam,
    #[serde(rename = "Out of Office")]
    #[oai(rename = "Out of Office")]
    OutOfOffice,
    /// The keyword rules found nothing.
    Uncategorized,
    /// Classification was skipped or failed.
    #[serde(rename = "Not Categorized")]
    #[oai(rename = "Not Categorized")]
    NotCategorized,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Interested,
        Category::MeetingBooked,
        Category::NotInterested,
        Category::Spam,
        Category::OutOfOffice,
        Category::Uncategorized,
        Category::NotCategorized,
    ];

    /// Labels offered to the zero-shot model.
    pub const CANDIDATES: [Category; 5] = [
        Category::Interested,
        Category::MeetingBooked,
        Category::NotInterested,
        Category::Spam,
        Category::OutOfOffice,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Interested => "Interested",
            Category::MeetingBooked => "Meeting Booked",
            Category::NotInterested => "Not Interested",
            Category::Spam => "Spam",
            Category::OutOfOffice => "Out of Office",
            Category::Uncategorized => "Uncategorized",
            Category::NotCategorized => "Not Categorized",
        }
    }

    /// Exact, case-sensitive lookup by display label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classification backend. Implementations never fail: any problem is
/// reported as [`Category::NotCategorized`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, subject: &str, text: &str) -> Category;

    fn name(&self) -> &'static str;
}

/// Front door used by the ingestion pipeline. Short-circuits blank messages
/// and picks the text handed to the backend.
#[derive(Clone)]
pub struct Classifier {
    backend: Arc<dyn IntentClassifier>,
}

impl Classifier {
    pub fn new(backend: Arc<dyn IntentClassifier>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn classify(&self, subject: &str, body: &str) -> Category {
        let subject = subject.trim();
        let body = body.trim();
        if subject.is_empty() && body.is_empty() {
            debug!("Skipping classification of an email with no subject and no body");
            return Category::NotCategorized;
        }
        let text = if body.is_empty() { subject } else { body };
        self.backend.classify(subject, text).await
    }
}
