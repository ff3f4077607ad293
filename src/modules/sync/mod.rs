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

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::modules::{account::entity::AccountConfig, error::OneboxResult};

pub mod backoff;
pub mod pipeline;
pub mod worker;

/// State of the selected folder as reported by EXAMINE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderStatus {
    pub uid_validity: u32,
    pub uid_next: Option<u32>,
    pub exists: u32,
}

/// Full RFC 5322 bytes of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub uid: u32,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxEvent {
    /// The server announced new messages (EXISTS).
    NewMail,
    /// The keep-alive window elapsed without news.
    Timeout,
    /// Other untagged data such as EXPUNGE or flag updates.
    Changed,
    /// Process shutdown was requested while waiting.
    Shutdown,
}

/// One authenticated mailbox session.
///
/// Any error returned here is connection-level: the caller drops the
/// session and reconnects.
#[async_trait]
pub trait MailSource: Send {
    /// Selects `folder` read-only.
    async fn open_folder(&mut self, folder: &str) -> OneboxResult<FolderStatus>;

    /// UIDs of messages received on or after `since`, ascending.
    async fn search_since(&mut self, since: NaiveDate) -> OneboxResult<Vec<u32>>;

    /// UIDs strictly greater than `uid`, ascending.
    async fn search_after(&mut self, uid: u32) -> OneboxResult<Vec<u32>>;

    /// Fetches a message without setting `\Seen`. `None` when it vanished.
    async fn fetch_raw(&mut self, uid: u32) -> OneboxResult<Option<RawMessage>>;

    /// Blocks until the server reports news, the keep-alive window elapses,
    /// or `shutdown` fires.
    async fn next_event(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> OneboxResult<MailboxEvent>;

    /// Best-effort LOGOUT.
    async fn close(&mut self);
}

/// Opens [`MailSource`] sessions for an account.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, account: &AccountConfig) -> OneboxResult<Box<dyn MailSource>>;
}
