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

use std::{path::Path, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::modules::{
    account::entity::AccountConfig,
    classifier::{
        keyword::KeywordClassifier, zero_shot::ZeroShotClassifier, Classifier, IntentClassifier,
    },
    common::signal::SignalManager,
    error::OneboxResult,
    indexer::manager::EmailIndex,
    message::service::EmailService,
    notify::NotifierSet,
    reply::{load_agenda, openai::OpenAiSuggester, template::TemplateSuggester, ReplySuggester},
    settings::cli::Settings,
    sync::{
        backoff::ReconnectPolicy,
        pipeline::IngestPipeline,
        worker::{MailboxWorker, WorkerExit},
        MailConnector,
    },
};

const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything the workers and the HTTP API share, wired from settings.
pub struct OneboxContext {
    pub index: Arc<EmailIndex>,
    pub service: EmailService,
    pub pipeline: IngestPipeline,
    policy: ReconnectPolicy,
    backfill_days: u32,
}

/// Zero-shot when an API token is configured, keyword rules otherwise.
pub fn build_classifier(settings: &Settings) -> OneboxResult<Classifier> {
    let backend: Arc<dyn IntentClassifier> =
        match settings.onebox_classifier_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Arc::new(ZeroShotClassifier::new(
                &settings.onebox_classifier_url,
                token,
                Duration::from_secs(settings.onebox_classifier_timeout_secs),
            )?),
            _ => Arc::new(KeywordClassifier::new()?),
        };
    let classifier = Classifier::new(backend);
    info!("Using the '{}' intent classifier", classifier.backend_name());
    Ok(classifier)
}

pub fn build_suggester(settings: &Settings) -> OneboxResult<Arc<dyn ReplySuggester>> {
    let agenda = load_agenda(settings.onebox_agenda_file.as_deref().map(Path::new))?;
    let suggester: Arc<dyn ReplySuggester> = match settings.onebox_openai_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Arc::new(OpenAiSuggester::new(
            &settings.onebox_openai_base_url,
            key,
            &settings.onebox_chat_model,
            &settings.onebox_embedding_model,
            agenda,
            REPLY_TIMEOUT,
        )?),
        _ => Arc::new(TemplateSuggester::new(agenda)),
    };
    info!("Using the '{}' reply suggester", suggester.name());
    Ok(suggester)
}

impl OneboxContext {
    pub fn new(settings: &Settings, index: Arc<EmailIndex>) -> OneboxResult<Self> {
        let classifier = build_classifier(settings)?;
        let notifier = NotifierSet::from_urls(
            settings.onebox_slack_webhook_url.as_deref(),
            settings.onebox_webhook_url.as_deref(),
            Duration::from_secs(settings.onebox_notify_timeout_secs),
        )?;
        if notifier.target_count() > 0 {
            info!(
                "{} Interested notification target(s) configured",
                notifier.target_count()
            );
        }
        let service = EmailService::new(
            index.clone(),
            Arc::new(notifier),
            build_suggester(settings)?,
            settings.onebox_page_size,
        );
        Ok(Self {
            pipeline: IngestPipeline::new(classifier, index.clone()),
            index,
            service,
            policy: ReconnectPolicy::new(
                Duration::from_secs(settings.onebox_reconnect_base_delay_secs),
                Duration::from_secs(settings.onebox_reconnect_max_delay_secs),
                settings.onebox_reconnect_max_attempts,
            ),
            backfill_days: settings.onebox_backfill_days,
        })
    }

    /// One task per account.
    pub fn spawn_workers(
        &self,
        accounts: Vec<AccountConfig>,
        connector: Arc<dyn MailConnector>,
        signals: &SignalManager,
    ) -> Vec<JoinHandle<WorkerExit>> {
        accounts
            .into_iter()
            .map(|account| {
                let user = account.user.clone();
                let worker = MailboxWorker::new(
                    account,
                    connector.clone(),
                    self.pipeline.clone(),
                    self.policy,
                    self.backfill_days,
                    signals.subscribe(),
                );
                info!("[account {}] Starting mailbox worker", user);
                tokio::spawn(async move {
                    let exit = worker.run().await;
                    if exit == WorkerExit::Failed {
                        warn!("[account {}] Mailbox worker exited after repeated failures", user);
                    }
                    exit
                })
            })
            .collect()
    }
}
