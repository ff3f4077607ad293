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

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    modules::{
        classifier::{Category, IntentClassifier},
        error::{code::ErrorCode, OneboxResult},
    },
    raise_error,
};

#[derive(Debug, Deserialize)]
struct RankedLabels {
    labels: Vec<String>,
    #[serde(default)]
    scores: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Shapes returned by hosted zero-shot endpoints.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Ranked(RankedLabels),
    Batch(Vec<RankedLabels>),
    Pairs(Vec<LabelScore>),
    Failure { error: serde_json::Value },
}

impl RankedLabels {
    fn top(&self) -> Option<&str> {
        if self.scores.len() == self.labels.len() {
            self.labels
                .iter()
                .zip(&self.scores)
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(label, _)| label.as_str())
        } else {
            self.labels.first().map(String::as_str)
        }
    }
}

impl ZeroShotResponse {
    fn top_label(&self) -> OneboxResult<Option<&str>> {
        match self {
            ZeroShotResponse::Ranked(ranked) => Ok(ranked.top()),
            ZeroShotResponse::Batch(batch) => Ok(batch.first().and_then(RankedLabels::top)),
            ZeroShotResponse::Pairs(pairs) => Ok(pairs
                .iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .map(|p| p.label.as_str())),
            ZeroShotResponse::Failure { error } => Err(raise_error!(
                format!("Zero-shot endpoint reported an error: {}", error),
                ErrorCode::HttpResponseError
            )),
        }
    }
}

/// Hosted zero-shot classification over HTTP with a bearer token.
pub struct ZeroShotClassifier {
    client: Client,
    url: String,
    token: String,
}

impl ZeroShotClassifier {
    pub fn new(url: &str, token: &str, timeout: Duration) -> OneboxResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            raise_error!(
                format!("Failed to build classifier HTTP client: {}", e),
                ErrorCode::InternalError
            )
        })?;
        Ok(Self {
            client,
            url: url.to_string(),
            token: token.to_string(),
        })
    }

    async fn rank(&self, text: &str) -> OneboxResult<Category> {
        let candidate_labels: Vec<&str> = Category::CANDIDATES.iter().map(|c| c.label()).collect();
        let body = json!({
            "inputs": text,
            "parameters": { "candidate_labels": candidate_labels },
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let code = if e.is_timeout() {
                    ErrorCode::ConnectionTimeout
                } else {
                    ErrorCode::NetworkError
                };
                raise_error!(format!("Zero-shot request failed: {}", e), code)
            })?;

        let status = response.status();
        let parsed: ZeroShotResponse = response.json().await.map_err(|e| {
            raise_error!(
                format!("Unreadable zero-shot response (status {}): {}", status, e),
                ErrorCode::HttpResponseError
            )
        })?;
        if !status.is_success() {
            return Err(raise_error!(
                format!("Zero-shot endpoint returned status {}: {:?}", status, parsed),
                ErrorCode::HttpResponseError
            ));
        }

        let label = parsed.top_label()?.ok_or_else(|| {
            raise_error!(
                "Zero-shot endpoint returned an empty ranking".into(),
                ErrorCode::HttpResponseError
            )
        })?;
        Category::from_label(label.trim()).ok_or_else(|| {
            raise_error!(
                format!("Zero-shot endpoint returned unknown label '{}'", label),
                ErrorCode::HttpResponseError
            )
        })
    }
}

#[async_trait]
impl IntentClassifier for ZeroShotClassifier {
    async fn classify(&self, _subject: &str, text: &str) -> Category {
        match self.rank(text).await {
            Ok(category) => {
                debug!("Zero-shot classification result: {}", category);
                category
            }
            Err(e) => {
                warn!("Classification failed, storing as Not Categorized: {}", e);
                Category::NotCategorized
            }
        }
    }

    fn name(&self) -> &'static str {
        "zero-shot"
    }
}
