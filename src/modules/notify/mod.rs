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

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    modules::{
        error::{code::ErrorCode, OneboxResult},
        indexer::document::EmailDocument,
    },
    raise_error,
};

/// Receives emails that were just marked Interested.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_interested(&self, email: &EmailDocument) -> OneboxResult<()>;
}

fn rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| millis.to_string())
}

async fn post_json(client: &Client, target: &str, url: &str, body: &Value) -> OneboxResult<()> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        let code = if e.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else {
            ErrorCode::NetworkError
        };
        raise_error!(format!("{} delivery failed: {}", target, e), code)
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(raise_error!(
            format!("{} responded with status {}", target, status),
            ErrorCode::HttpResponseError
        ));
    }
    debug!("{} notification delivered", target);
    Ok(())
}

/// Slack incoming webhook, `{text}` payload.
pub struct SlackNotifier {
    client: Client,
    url: String,
}

impl SlackNotifier {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    fn message(email: &EmailDocument) -> String {
        format!(
            "📬 *New Interested Email*\n*From:* {}\n*Subject:* {}\n*Account:* {}\n*Date:* {}",
            email.from,
            email.subject,
            email.account,
            rfc3339(email.date)
        )
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_interested(&self, email: &EmailDocument) -> OneboxResult<()> {
        let body = json!({ "text": Self::message(email) });
        post_json(&self.client, "Slack", &self.url, &body).await
    }
}

/// Generic JSON webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_interested(&self, email: &EmailDocument) -> OneboxResult<()> {
        let body = json!({
            "from": email.from,
            "subject": email.subject,
            "category": email.category,
            "account": email.account,
            "date": rfc3339(email.date),
        });
        post_json(&self.client, "Webhook", &self.url, &body).await
    }
}

/// Delivers to every configured target in turn. All targets are attempted;
/// failures are collected into one error.
#[derive(Default)]
pub struct NotifierSet {
    targets: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }

    /// Slack and webhook targets for whichever URLs are configured.
    pub fn from_urls(
        slack_url: Option<&str>,
        webhook_url: Option<&str>,
        timeout: Duration,
    ) -> OneboxResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            raise_error!(
                format!("Failed to build notification HTTP client: {}", e),
                ErrorCode::InternalError
            )
        })?;
        let mut targets: Vec<Arc<dyn Notifier>> = Vec::new();
        if let Some(url) = slack_url {
            targets.push(Arc::new(SlackNotifier::new(client.clone(), url)));
        }
        if let Some(url) = webhook_url {
            targets.push(Arc::new(WebhookNotifier::new(client, url)));
        }
        if targets.is_empty() {
            info!("No Slack or webhook URL configured, Interested notifications are disabled");
        }
        Ok(Self { targets })
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    async fn notify_interested(&self, email: &EmailDocument) -> OneboxResult<()> {
        let mut failures = Vec::new();
        for target in &self.targets {
            if let Err(e) = target.notify_interested(email).await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(raise_error!(failures.join("; "), ErrorCode::HttpResponseError))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{
        classifier::Category, common::testing::serve_loopback, indexer::document::document_id,
    };
    use poem::{handler, http::StatusCode, post, web::Data, web::Json, EndpointExt, Route};
    use std::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    #[handler]
    fn slack(Json(body): Json<Value>, captured: Data<&Captured>) -> StatusCode {
        captured.lock().unwrap().push(("slack".into(), body));
        StatusCode::OK
    }

    #[handler]
    fn hook(Json(body): Json<Value>, captured: Data<&Captured>) -> StatusCode {
        captured.lock().unwrap().push(("hook".into(), body));
        StatusCode::OK
    }

    #[handler]
    fn broken() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn email() -> EmailDocument {
        EmailDocument {
            id: document_id("me@example.com", "INBOX", 1, 1),
            from: "Lead <lead@example.com>".into(),
            to: "me@example.com".into(),
            subject: "Let's talk".into(),
            date: 1_700_000_000_000,
            text: "interested".into(),
            html: String::new(),
            account: "me@example.com".into(),
            folder: "INBOX".into(),
            category: Category::Interested,
            uid: 1,
            uid_validity: 1,
            message_id: None,
        }
    }

    async fn server(captured: Captured) -> String {
        let app = Route::new()
            .at("/slack", post(slack))
            .at("/hook", post(hook))
            .at("/broken", post(broken))
            .data(captured);
        serve_loopback(app).await
    }

    #[tokio::test]
    async fn both_targets_receive_their_payloads() {
        let captured: Captured = Default::default();
        let base = server(captured.clone()).await;
        let set = NotifierSet::from_urls(
            Some(&format!("{}/slack", base)),
            Some(&format!("{}/hook", base)),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(set.target_count(), 2);
        set.notify_interested(&email()).await.unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 2);
        let text = captured[0].1["text"].as_str().unwrap();
        assert!(text.contains("Lead <lead@example.com>"));
        assert!(text.contains("2023-11-14T22:13:20Z"));
        let webhook_body = &captured[1].1;
        assert_eq!(webhook_body["category"], "Interested");
        assert_eq!(webhook_body["account"], "me@example.com");
        assert_eq!(webhook_body["subject"], "Let's talk");
    }

    #[tokio::test]
    async fn one_failing_target_does_not_stop_the_other() {
        let captured: Captured = Default::default();
        let base = server(captured.clone()).await;
        let set = NotifierSet::from_urls(
            Some(&format!("{}/broken", base)),
            Some(&format!("{}/hook", base)),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = set.notify_interested(&email()).await.unwrap_err();
        assert!(err.to_string().contains("Slack"));
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_targets_is_a_no_op() {
        let set = NotifierSet::from_urls(None, None, Duration::from_secs(1)).unwrap();
        assert_eq!(set.target_count(), 0);
        set.notify_interested(&email()).await.unwrap();
    }
}
