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

use tracing::{debug, error, info, warn};

use crate::modules::{
    classifier::{Category, Classifier},
    indexer::{document::EmailDocument, manager::EmailIndex},
    message::decoder::decode_message,
    sync::RawMessage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed(Category),
    DecodeFailed,
    StoreFailed,
}

/// Decode, classify and upsert one fetched message. Never fails: per-message
/// problems are logged and reported through the outcome.
#[derive(Clone)]
pub struct IngestPipeline {
    classifier: Classifier,
    index: Arc<EmailIndex>,
}

impl IngestPipeline {
    pub fn new(classifier: Classifier, index: Arc<EmailIndex>) -> Self {
        Self { classifier, index }
    }

    /// Drops what was indexed for this folder under an earlier UIDVALIDITY.
    /// Those UIDs no longer name the same messages and backfill re-indexes
    /// the ones still present.
    pub async fn retire_stale(&self, account: &str, folder: &str, uid_validity: u32) {
        match self.index.purge_stale(account, folder, uid_validity).await {
            Ok(0) => {}
            Ok(removed) => info!(
                "[account {}] Removed {} emails indexed under an earlier UIDVALIDITY of {}",
                account, removed, folder
            ),
            Err(e) => error!(
                "[account {}] Failed to remove stale emails of {}: {}",
                account, folder, e
            ),
        }
    }

    pub async fn process(
        &self,
        account: &str,
        folder: &str,
        uid_validity: u32,
        raw: RawMessage,
    ) -> IngestOutcome {
        let decoded = match decode_message(&raw.body) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(
                    "[account {}] Skipping UID {} in {}: {}",
                    account, raw.uid, folder, e
                );
                return IngestOutcome::DecodeFailed;
            }
        };

        let category = self.classifier.classify(&decoded.subject, &decoded.text).await;
        let email =
            EmailDocument::from_decoded(account, folder, uid_validity, raw.uid, decoded, category);

        match self.index.upsert(&email).await {
            Ok(()) => {
                debug!(
                    "[account {}] Indexed UID {} as '{}': {}",
                    account, raw.uid, category, email.subject
                );
                IngestOutcome::Indexed(category)
            }
            Err(e) => {
                error!(
                    "[account {}] Failed to index UID {} in {}: {}",
                    account, raw.uid, folder, e
                );
                IngestOutcome::StoreFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{
        classifier::keyword::KeywordClassifier, indexer::document::document_id,
    };

    fn pipeline(dir: &tempfile::TempDir) -> (IngestPipeline, Arc<EmailIndex>) {
        let index = Arc::new(EmailIndex::open(dir.path()).unwrap());
        let classifier = Classifier::new(Arc::new(KeywordClassifier::new().unwrap()));
        (IngestPipeline::new(classifier, index.clone()), index)
    }

    #[tokio::test]
    async fn classified_message_lands_in_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) = pipeline(&dir);
        let raw = RawMessage {
            uid: 9,
            body: b"From: lead@example.com\r\nSubject: Re: demo\r\n\r\nSounds good, I'm interested.\r\n"
                .to_vec(),
        };
        let outcome = pipeline.process("me@example.com", "INBOX", 3, raw).await;
        assert_eq!(outcome, IngestOutcome::Indexed(Category::Interested));

        let stored = index
            .get(&document_id("me@example.com", "INBOX", 3, 9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.account, "me@example.com");
        assert_eq!(stored.uid, 9);
        assert_eq!(stored.category, Category::Interested);
    }

    #[tokio::test]
    async fn retiring_a_uid_validity_keeps_the_current_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) = pipeline(&dir);
        let raw = |uid| RawMessage {
            uid,
            body: b"From: a@example.com\r\nSubject: hi\r\n\r\nhello\r\n".to_vec(),
        };
        pipeline.process("me@example.com", "INBOX", 3, raw(1)).await;
        pipeline.process("me@example.com", "INBOX", 4, raw(1)).await;
        assert_eq!(index.count().unwrap(), 2);

        pipeline.retire_stale("me@example.com", "INBOX", 4).await;
        assert_eq!(index.count().unwrap(), 1);
        assert!(index
            .get(&document_id("me@example.com", "INBOX", 4, 1))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn undecodable_message_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) = pipeline(&dir);
        let raw = RawMessage {
            uid: 1,
            body: Vec::new(),
        };
        assert_eq!(
            pipeline.process("me@example.com", "INBOX", 3, raw).await,
            IngestOutcome::DecodeFailed
        );
        assert_eq!(index.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) = pipeline(&dir);
        index.close().await.unwrap();
        let raw = RawMessage {
            uid: 2,
            body: b"From: a@example.com\r\nSubject: hi\r\n\r\nhello\r\n".to_vec(),
        };
        assert_eq!(
            pipeline.process("me@example.com", "INBOX", 3, raw).await,
            IngestOutcome::StoreFailed
        );
    }
}
