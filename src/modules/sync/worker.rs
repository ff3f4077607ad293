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

use chrono::Utc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::modules::{
    account::entity::AccountConfig,
    error::OneboxResult,
    sync::{
        backoff::ReconnectPolicy,
        pipeline::{IngestOutcome, IngestPipeline},
        FolderStatus, MailConnector, MailSource, MailboxEvent,
    },
};

/// Progress of one mailbox. `hwm` is the highest UID already processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCursor {
    pub uid_validity: u32,
    pub hwm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Shutdown,
    /// The reconnect budget ran out.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Keeps one account's folder ingested: backfill, then IDLE-driven live
/// mode, reconnecting with backoff when the session breaks.
pub struct MailboxWorker {
    account: AccountConfig,
    connector: Arc<dyn MailConnector>,
    pipeline: IngestPipeline,
    policy: ReconnectPolicy,
    backfill_days: u32,
    shutdown: broadcast::Receiver<()>,
    cursor: Option<SyncCursor>,
}

impl MailboxWorker {
    pub fn new(
        account: AccountConfig,
        connector: Arc<dyn MailConnector>,
        pipeline: IngestPipeline,
        policy: ReconnectPolicy,
        backfill_days: u32,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            account,
            connector,
            pipeline,
            policy,
            backfill_days,
            shutdown,
            cursor: None,
        }
    }

    pub async fn run(mut self) -> WorkerExit {
        let user = self.account.user.clone();
        let mut failures = 0u32;
        loop {
            if self.shutdown_requested() {
                return WorkerExit::Shutdown;
            }

            let connected = tokio::select! {
                result = self.connector.connect(&self.account) => result,
                _ = self.shutdown.recv() => return WorkerExit::Shutdown,
            };

            match connected {
                Ok(mut source) => {
                    let mut ready = false;
                    match self.run_session(source.as_mut(), &mut ready).await {
                        Ok(()) => {
                            source.close().await;
                            info!("[account {}] Mailbox worker stopped", user);
                            return WorkerExit::Shutdown;
                        }
                        Err(e) => {
                            failures = if ready { 1 } else { failures + 1 };
                            warn!("[account {}] Mailbox session ended: {}", user, e);
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "[account {}] Connection attempt {}/{} failed: {}",
                        user, failures, self.policy.max_attempts, e
                    );
                }
            }

            if self.policy.exhausted(failures) {
                error!(
                    "[account {}] Giving up after {} consecutive failed attempts; mailbox is no longer synchronized",
                    user, failures
                );
                return WorkerExit::Failed;
            }

            let delay = self.policy.delay(failures);
            info!("[account {}] Reconnecting in {:?}", user, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.recv() => return WorkerExit::Shutdown,
            }
        }
    }

    /// Returns `Ok` only when shutdown was requested. `ready` is set once the
    /// folder has been opened, which counts as a successful connection.
    async fn run_session(
        &mut self,
        source: &mut dyn MailSource,
        ready: &mut bool,
    ) -> OneboxResult<()> {
        let status = source.open_folder(&self.account.folder).await?;
        *ready = true;
        info!(
            "[account {}] Opened {} (UIDVALIDITY {}, {} messages)",
            self.account.user, self.account.folder, status.uid_validity, status.exists
        );

        match self.cursor {
            Some(cursor) if cursor.uid_validity == status.uid_validity => {
                info!(
                    "[account {}] Resuming after UID {}",
                    self.account.user, cursor.hwm
                );
            }
            previous => {
                if let Some(cursor) = previous {
                    warn!(
                        "[account {}] UIDVALIDITY changed from {} to {}, backfilling again",
                        self.account.user, cursor.uid_validity, status.uid_validity
                    );
                }
                if self.backfill(source, status).await? == Flow::Stop {
                    return Ok(());
                }
            }
        }

        if self.catch_up(source).await? == Flow::Stop {
            return Ok(());
        }

        loop {
            match source.next_event(&mut self.shutdown).await? {
                MailboxEvent::Shutdown => return Ok(()),
                event => {
                    // EXISTS sent while a command was running never reaches
                    // IDLE, so every wakeup re-checks above the mark
                    debug!("[account {}] Mailbox wakeup: {:?}", self.account.user, event);
                    if self.catch_up(source).await? == Flow::Stop {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn backfill(
        &mut self,
        source: &mut dyn MailSource,
        status: FolderStatus,
    ) -> OneboxResult<Flow> {
        self.pipeline
            .retire_stale(&self.account.user, &self.account.folder, status.uid_validity)
            .await;
        let since = (Utc::now() - chrono::Duration::days(self.backfill_days as i64)).date_naive();
        let mut uids = source.search_since(since).await?;
        uids.sort_unstable();
        uids.dedup();

        // everything at or below the seed existed before EXAMINE
        let mut hwm = match status.uid_next {
            Some(next) => next.saturating_sub(1),
            None => source
                .search_after(0)
                .await?
                .into_iter()
                .max()
                .unwrap_or_default(),
        };

        if uids.is_empty() {
            info!(
                "[account {}] Backfill: no emails found since {}",
                self.account.user, since
            );
        } else {
            info!(
                "[account {}] Backfill: {} emails since {}",
                self.account.user,
                uids.len(),
                since
            );
        }

        let mut indexed = 0usize;
        for uid in uids {
            if self.shutdown_requested() {
                return Ok(Flow::Stop);
            }
            if let Some(IngestOutcome::Indexed(_)) =
                self.ingest(source, status.uid_validity, uid).await?
            {
                indexed += 1;
            }
            hwm = hwm.max(uid);
        }
        if indexed > 0 {
            info!(
                "[account {}] Backfill complete, {} emails indexed",
                self.account.user, indexed
            );
        }

        self.cursor = Some(SyncCursor {
            uid_validity: status.uid_validity,
            hwm,
        });
        Ok(Flow::Continue)
    }

    /// Ingests every UID above the high-water mark, ascending.
    async fn catch_up(&mut self, source: &mut dyn MailSource) -> OneboxResult<Flow> {
        let Some(cursor) = self.cursor else {
            return Ok(Flow::Continue);
        };
        // `UID n:*` also answers with the highest UID when it is below n
        let mut uids: Vec<u32> = source
            .search_after(cursor.hwm)
            .await?
            .into_iter()
            .filter(|uid| *uid > cursor.hwm)
            .collect();
        uids.sort_unstable();
        uids.dedup();

        if !uids.is_empty() {
            info!(
                "[account {}] {} new emails above UID {}",
                self.account.user,
                uids.len(),
                cursor.hwm
            );
        }
        for uid in uids {
            if self.shutdown_requested() {
                return Ok(Flow::Stop);
            }
            self.ingest(source, cursor.uid_validity, uid).await?;
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.hwm = uid;
            }
        }
        Ok(Flow::Continue)
    }

    async fn ingest(
        &self,
        source: &mut dyn MailSource,
        uid_validity: u32,
        uid: u32,
    ) -> OneboxResult<Option<IngestOutcome>> {
        let Some(raw) = source.fetch_raw(uid).await? else {
            warn!(
                "[account {}] UID {} disappeared before it could be fetched",
                self.account.user, uid
            );
            return Ok(None);
        };
        let outcome = self
            .pipeline
            .process(&self.account.user, &self.account.folder, uid_validity, raw)
            .await;
        Ok(Some(outcome))
    }

    fn shutdown_requested(&mut self) -> bool {
        !matches!(self.shutdown.try_recv(), Err(TryRecvError::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{
        classifier::{keyword::KeywordClassifier, Classifier},
        common::signal::SignalManager,
        error::code::ErrorCode,
        indexer::manager::EmailIndex,
        sync::RawMessage,
    };
    use crate::raise_error;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Mailbox {
        uid_validity: u32,
        uid_next: Option<u32>,
        messages: BTreeMap<u32, Vec<u8>>,
        backfill_hits: Vec<u32>,
        fetched: Vec<u32>,
        since_searches: usize,
        idles: usize,
        logouts: usize,
        connects: usize,
        refuse_connects: bool,
        /// (fetched UID, UID that lands while it is being fetched)
        arrive_on_fetch: Option<(u32, u32)>,
    }

    enum Push {
        Deliver(u32),
        Keepalive,
        Drop,
    }

    type Shared = Arc<Mutex<Mailbox>>;
    type Pushes = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Push>>>;

    struct MockConnector {
        mailbox: Shared,
        pushes: Pushes,
    }

    struct MockSource {
        mailbox: Shared,
        pushes: Pushes,
    }

    fn message(uid: u32) -> Vec<u8> {
        format!("From: sender@example.com\r\nSubject: Message {uid}\r\n\r\nHello number {uid}\r\n")
            .into_bytes()
    }

    #[async_trait]
    impl MailConnector for MockConnector {
        async fn connect(&self, _account: &AccountConfig) -> OneboxResult<Box<dyn MailSource>> {
            let mut mailbox = self.mailbox.lock().unwrap();
            mailbox.connects += 1;
            if mailbox.refuse_connects {
                return Err(raise_error!(
                    "connection refused".into(),
                    ErrorCode::NetworkError
                ));
            }
            Ok(Box::new(MockSource {
                mailbox: self.mailbox.clone(),
                pushes: self.pushes.clone(),
            }))
        }
    }

    #[async_trait]
    impl MailSource for MockSource {
        async fn open_folder(&mut self, _folder: &str) -> OneboxResult<FolderStatus> {
            let mailbox = self.mailbox.lock().unwrap();
            Ok(FolderStatus {
                uid_validity: mailbox.uid_validity,
                uid_next: mailbox.uid_next,
                exists: mailbox.messages.len() as u32,
            })
        }

        async fn search_since(&mut self, _since: NaiveDate) -> OneboxResult<Vec<u32>> {
            let mut mailbox = self.mailbox.lock().unwrap();
            mailbox.since_searches += 1;
            Ok(mailbox.backfill_hits.clone())
        }

        async fn search_after(&mut self, uid: u32) -> OneboxResult<Vec<u32>> {
            let mailbox = self.mailbox.lock().unwrap();
            let above: Vec<u32> = mailbox.messages.range(uid + 1..).map(|(u, _)| *u).collect();
            if above.is_empty() {
                // servers answer `n:*` with the last message
                return Ok(mailbox.messages.keys().last().copied().into_iter().collect());
            }
            Ok(above)
        }

        async fn fetch_raw(&mut self, uid: u32) -> OneboxResult<Option<RawMessage>> {
            let mut mailbox = self.mailbox.lock().unwrap();
            mailbox.fetched.push(uid);
            if let Some((during, arriving)) = mailbox.arrive_on_fetch {
                if during == uid {
                    mailbox.messages.insert(arriving, message(arriving));
                    mailbox.uid_next = Some(arriving + 1);
                }
            }
            Ok(mailbox
                .messages
                .get(&uid)
                .map(|body| RawMessage { uid, body: body.clone() }))
        }

        async fn next_event(
            &mut self,
            shutdown: &mut broadcast::Receiver<()>,
        ) -> OneboxResult<MailboxEvent> {
            self.mailbox.lock().unwrap().idles += 1;
            let mut pushes = self.pushes.lock().await;
            tokio::select! {
                push = pushes.recv() => match push {
                    Some(Push::Deliver(uid)) => {
                        let mut mailbox = self.mailbox.lock().unwrap();
                        mailbox.messages.insert(uid, message(uid));
                        mailbox.uid_next = Some(uid + 1);
                        Ok(MailboxEvent::NewMail)
                    }
                    Some(Push::Keepalive) => Ok(MailboxEvent::Timeout),
                    Some(Push::Drop) => Err(raise_error!(
                        "connection reset by peer".into(),
                        ErrorCode::NetworkError
                    )),
                    None => std::future::pending().await,
                },
                _ = shutdown.recv() => Ok(MailboxEvent::Shutdown),
            }
        }

        async fn close(&mut self) {
            self.mailbox.lock().unwrap().logouts += 1;
        }
    }

    struct Harness {
        mailbox: Shared,
        pushes: mpsc::UnboundedSender<Push>,
        index: Arc<EmailIndex>,
        signal: SignalManager,
        handle: tokio::task::JoinHandle<WorkerExit>,
        _dir: tempfile::TempDir,
    }

    fn account() -> AccountConfig {
        serde_json::from_str(
            r#"{"user":"me@example.com","password":"x","host":"imap.example.com"}"#,
        )
        .unwrap()
    }

    fn start(mailbox: Mailbox, max_attempts: u32) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(EmailIndex::open(dir.path()).unwrap());
        let classifier = Classifier::new(Arc::new(KeywordClassifier::new().unwrap()));
        let mailbox = Arc::new(Mutex::new(mailbox));
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(MockConnector {
            mailbox: mailbox.clone(),
            pushes: Arc::new(tokio::sync::Mutex::new(rx)),
        });
        let signal = SignalManager::new();
        let worker = MailboxWorker::new(
            account(),
            connector,
            IngestPipeline::new(classifier, index.clone()),
            ReconnectPolicy::new(Duration::from_millis(1), Duration::from_millis(5), max_attempts),
            30,
            signal.subscribe(),
        );
        Harness {
            mailbox,
            pushes: tx,
            index,
            signal,
            handle: tokio::spawn(worker.run()),
            _dir: dir,
        }
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn with_messages(uids: &[u32]) -> Mailbox {
        Mailbox {
            uid_validity: 1,
            uid_next: uids.iter().max().map(|u| u + 1),
            messages: uids.iter().map(|u| (*u, message(*u))).collect(),
            backfill_hits: uids.to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_backfill_enters_live_mode() {
        let h = start(
            Mailbox {
                uid_validity: 1,
                uid_next: Some(1),
                ..Default::default()
            },
            3,
        );
        let mailbox = h.mailbox.clone();
        eventually(|| mailbox.lock().unwrap().idles == 1).await;
        assert_eq!(h.index.count().unwrap(), 0);

        h.pushes.send(Push::Deliver(1)).unwrap();
        let index = h.index.clone();
        eventually(|| index.count().unwrap() == 1).await;

        h.signal.trigger();
        assert_eq!(h.handle.await.unwrap(), WorkerExit::Shutdown);
        assert_eq!(h.mailbox.lock().unwrap().logouts, 1);
    }

    #[tokio::test]
    async fn message_arriving_during_backfill_is_indexed_once() {
        // UID 3 arrived after EXAMINE but before the SINCE search
        let mut early = with_messages(&[1, 2, 3]);
        early.uid_next = Some(3);
        // UID 3 arrived after the SINCE search
        let mut late = with_messages(&[1, 2, 3]);
        late.uid_next = Some(3);
        late.backfill_hits = vec![1, 2];

        for mailbox in [early, late] {
            let h = start(mailbox, 3);
            let m = h.mailbox.clone();
            eventually(|| m.lock().unwrap().idles == 1).await;

            let fetched = h.mailbox.lock().unwrap().fetched.clone();
            assert_eq!(fetched, vec![1, 2, 3]);
            assert_eq!(h.index.count().unwrap(), 3);
            h.signal.trigger();
            h.handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn live_mode_ignores_the_trailing_uid_quirk() {
        let h = start(with_messages(&[4, 9]), 3);
        let m = h.mailbox.clone();
        eventually(|| m.lock().unwrap().idles == 1).await;
        h.pushes.send(Push::Deliver(12)).unwrap();
        eventually(|| m.lock().unwrap().idles == 2).await;

        let fetched = h.mailbox.lock().unwrap().fetched.clone();
        assert_eq!(fetched, vec![4, 9, 12]);
        h.signal.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn reconnect_resumes_from_the_high_water_mark() {
        let h = start(with_messages(&[1]), 3);
        let m = h.mailbox.clone();
        eventually(|| m.lock().unwrap().idles == 1).await;

        h.mailbox.lock().unwrap().messages.insert(2, message(2));
        h.pushes.send(Push::Drop).unwrap();
        eventually(|| m.lock().unwrap().idles == 2).await;

        let mailbox = h.mailbox.lock().unwrap();
        assert_eq!(mailbox.connects, 2);
        assert_eq!(mailbox.since_searches, 1);
        assert_eq!(mailbox.fetched, vec![1, 2]);
        drop(mailbox);
        assert_eq!(h.index.count().unwrap(), 2);
        h.signal.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn uid_validity_change_triggers_a_new_backfill() {
        let h = start(with_messages(&[1, 2]), 3);
        let m = h.mailbox.clone();
        eventually(|| m.lock().unwrap().idles == 1).await;

        h.mailbox.lock().unwrap().uid_validity = 2;
        h.pushes.send(Push::Drop).unwrap();
        eventually(|| m.lock().unwrap().idles == 2).await;

        let mailbox = h.mailbox.lock().unwrap();
        assert_eq!(mailbox.since_searches, 2);
        assert_eq!(mailbox.fetched, vec![1, 2, 1, 2]);
        drop(mailbox);
        assert_eq!(h.index.count().unwrap(), 2);
        h.signal.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn mail_landing_mid_fetch_is_picked_up_on_the_next_wakeup() {
        let mut mailbox = with_messages(&[1]);
        mailbox.arrive_on_fetch = Some((2, 3));
        let h = start(mailbox, 3);
        let m = h.mailbox.clone();
        eventually(|| m.lock().unwrap().idles == 1).await;

        // the EXISTS for UID 3 is answered to the FETCH of UID 2, not to IDLE
        h.pushes.send(Push::Deliver(2)).unwrap();
        eventually(|| m.lock().unwrap().idles == 2).await;
        assert_eq!(h.mailbox.lock().unwrap().fetched, vec![1, 2]);

        h.pushes.send(Push::Keepalive).unwrap();
        eventually(|| m.lock().unwrap().idles == 3).await;
        assert_eq!(h.mailbox.lock().unwrap().fetched, vec![1, 2, 3]);
        assert_eq!(h.index.count().unwrap(), 3);

        h.pushes.send(Push::Keepalive).unwrap();
        eventually(|| m.lock().unwrap().idles == 4).await;
        assert_eq!(h.mailbox.lock().unwrap().fetched, vec![1, 2, 3]);
        h.signal.trigger();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn worker_fails_after_the_retry_budget() {
        let h = start(
            Mailbox {
                refuse_connects: true,
                ..Default::default()
            },
            3,
        );
        assert_eq!(h.handle.await.unwrap(), WorkerExit::Failed);
        assert_eq!(h.mailbox.lock().unwrap().connects, 3);
    }

    #[tokio::test]
    async fn undecodable_message_still_advances_the_mark() {
        let mut mailbox = with_messages(&[1]);
        mailbox.messages.insert(1, Vec::new());
        let h = start(mailbox, 3);
        let m = h.mailbox.clone();
        eventually(|| m.lock().unwrap().idles == 1).await;

        h.pushes.send(Push::Deliver(2)).unwrap();
        eventually(|| m.lock().unwrap().idles == 2).await;
        assert_eq!(h.mailbox.lock().unwrap().fetched, vec![1, 2]);
        assert_eq!(h.index.count().unwrap(), 1);
        h.signal.trigger();
        h.handle.await.unwrap();
    }
}
