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

use std::{fmt::Debug, time::Duration};

use async_imap::{extensions::idle::IdleResponse, types::Fetch, Client, Session};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use imap_proto::{MailboxDatum, Response};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::broadcast,
};
use tracing::{debug, info, warn};

use crate::{
    modules::{
        account::entity::AccountConfig,
        error::{code::ErrorCode, OneboxResult},
        imap::tls::{server_name, tls_connector},
        sync::{FolderStatus, MailConnector, MailSource, MailboxEvent, RawMessage},
    },
    raise_error,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// RFC 2177 asks clients to re-issue IDLE at least every 29 minutes.
const IDLE_KEEPALIVE: Duration = Duration::from_secs(25 * 60);
const BODY_FETCH_COMMAND: &str = "(UID BODY.PEEK[])";

pub trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send + Debug {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + Debug> ImapStream for T {}

type ImapSession = Session<Box<dyn ImapStream>>;

/// Opens real IMAP sessions over TCP, with TLS when the account asks for it.
#[derive(Debug, Default)]
pub struct ImapConnector;

impl ImapConnector {
    async fn open_stream(account: &AccountConfig) -> OneboxResult<Box<dyn ImapStream>> {
        let tcp = TcpStream::connect((account.host.as_str(), account.port))
            .await
            .map_err(|e| {
                raise_error!(
                    format!(
                        "Failed to connect to {}:{}: {}",
                        account.host, account.port, e
                    ),
                    ErrorCode::NetworkError
                )
            })?;
        if !account.use_tls {
            return Ok(Box::new(tcp));
        }
        let connector = tls_connector(account.accept_invalid_certs)?;
        let tls = connector
            .connect(server_name(&account.host)?, tcp)
            .await
            .map_err(|e| {
                raise_error!(
                    format!("TLS handshake with {} failed: {}", account.host, e),
                    ErrorCode::NetworkError
                )
            })?;
        Ok(Box::new(tls))
    }

    async fn login(account: &AccountConfig) -> OneboxResult<ImapSession> {
        let stream = Self::open_stream(account).await?;
        let client = Client::new(stream);
        client
            .login(&account.user, &account.password)
            .await
            .map_err(|(e, _)| {
                raise_error!(
                    format!("IMAP login for {} failed: {:#?}", account.user, e),
                    ErrorCode::ImapAuthenticationFailed
                )
            })
    }
}

#[async_trait]
impl MailConnector for ImapConnector {
    async fn connect(&self, account: &AccountConfig) -> OneboxResult<Box<dyn MailSource>> {
        let session = tokio::time::timeout(CONNECT_TIMEOUT, Self::login(account))
            .await
            .map_err(|_| {
                raise_error!(
                    format!(
                        "Timed out connecting to {}:{} after {:?}",
                        account.host, account.port, CONNECT_TIMEOUT
                    ),
                    ErrorCode::ConnectionTimeout
                )
            })??;
        info!(
            "[account {}] Connected to {}:{}",
            account.user, account.host, account.port
        );
        Ok(Box::new(ImapMailSource {
            user: account.user.clone(),
            session: Some(session),
        }))
    }
}

/// One logged-in IMAP session. The session is moved out while IDLE runs
/// and is gone for good after a failure there.
pub struct ImapMailSource {
    user: String,
    session: Option<ImapSession>,
}

fn imap_error(context: &str, e: async_imap::error::Error) -> crate::modules::error::OneboxError {
    raise_error!(
        format!("{} failed: {:#?}", context, e),
        ErrorCode::ImapCommandFailed
    )
}

/// IMAP `SINCE` wants `1-Jan-2024`.
fn imap_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}

fn sorted(uids: impl IntoIterator<Item = u32>) -> Vec<u32> {
    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();
    uids
}

impl ImapMailSource {
    fn session(&mut self) -> OneboxResult<&mut ImapSession> {
        self.session.as_mut().ok_or_else(|| {
            raise_error!(
                "IMAP session is no longer usable".into(),
                ErrorCode::ImapUnexpectedResult
            )
        })
    }
}

#[async_trait]
impl MailSource for ImapMailSource {
    async fn open_folder(&mut self, folder: &str) -> OneboxResult<FolderStatus> {
        let encoded = utf7_imap::encode_utf7_imap(folder.to_string());
        let mailbox = self
            .session()?
            .examine(&encoded)
            .await
            .map_err(|e| imap_error("EXAMINE", e))?;
        let uid_validity = mailbox.uid_validity.ok_or_else(|| {
            raise_error!(
                format!("Server did not report UIDVALIDITY for {}", folder),
                ErrorCode::ImapUnexpectedResult
            )
        })?;
        Ok(FolderStatus {
            uid_validity,
            uid_next: mailbox.uid_next,
            exists: mailbox.exists,
        })
    }

    async fn search_since(&mut self, since: NaiveDate) -> OneboxResult<Vec<u32>> {
        let query = format!("SINCE {}", imap_date(since));
        let uids = self
            .session()?
            .uid_search(&query)
            .await
            .map_err(|e| imap_error("UID SEARCH SINCE", e))?;
        Ok(sorted(uids))
    }

    async fn search_after(&mut self, uid: u32) -> OneboxResult<Vec<u32>> {
        let query = format!("UID {}:*", uid.saturating_add(1));
        let uids = self
            .session()?
            .uid_search(&query)
            .await
            .map_err(|e| imap_error("UID SEARCH", e))?;
        Ok(sorted(uids.into_iter().filter(|found| *found > uid)))
    }

    async fn fetch_raw(&mut self, uid: u32) -> OneboxResult<Option<RawMessage>> {
        let fetches: Vec<Fetch> = self
            .session()?
            .uid_fetch(uid.to_string(), BODY_FETCH_COMMAND)
            .await
            .map_err(|e| imap_error("UID FETCH", e))?
            .try_collect()
            .await
            .map_err(|e| imap_error("UID FETCH", e))?;

        let body = fetches
            .iter()
            .find(|fetch| fetch.uid == Some(uid))
            .and_then(|fetch| fetch.body());
        Ok(body.map(|body| RawMessage {
            uid,
            body: body.to_vec(),
        }))
    }

    async fn next_event(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> OneboxResult<MailboxEvent> {
        let session = self.session.take().ok_or_else(|| {
            raise_error!(
                "IMAP session is no longer usable".into(),
                ErrorCode::ImapUnexpectedResult
            )
        })?;
        let mut handle = session.idle();
        handle.init().await.map_err(|e| imap_error("IDLE", e))?;
        debug!("[account {}] Waiting in IDLE", self.user);

        let (response, interrupted) = {
            let (wait, stop) = handle.wait_with_timeout(IDLE_KEEPALIVE);
            tokio::pin!(wait);
            let early = tokio::select! {
                response = &mut wait => Some(response),
                _ = shutdown.recv() => None,
            };
            match early {
                Some(response) => (response, false),
                None => {
                    drop(stop);
                    (wait.await, true)
                }
            }
        };
        let response = response.map_err(|e| imap_error("IDLE", e))?;
        let session = handle.done().await.map_err(|e| imap_error("DONE", e))?;
        self.session = Some(session);

        if interrupted {
            return Ok(MailboxEvent::Shutdown);
        }
        Ok(match response {
            IdleResponse::NewData(data) => match data.parsed() {
                Response::MailboxData(MailboxDatum::Exists(count)) => {
                    debug!("[account {}] EXISTS {}", self.user, count);
                    MailboxEvent::NewMail
                }
                _ => MailboxEvent::Changed,
            },
            IdleResponse::Timeout => MailboxEvent::Timeout,
            IdleResponse::ManualInterrupt => MailboxEvent::Shutdown,
        })
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout().await {
                warn!("[account {}] LOGOUT failed: {:#?}", self.user, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_dates_use_the_imap_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(imap_date(date), "7-Mar-2024");
    }

    #[test]
    fn uid_lists_are_sorted() {
        assert_eq!(sorted([9, 2, 5]), vec![2, 5, 9]);
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let account: AccountConfig = serde_json::from_str(
            r#"{"user":"me@example.com","password":"x","host":"127.0.0.1","port":9,"use_tls":false}"#,
        )
        .unwrap();
        let err = match ImapConnector.connect(&account).await {
            Ok(_) => panic!("connection to a closed port succeeded"),
            Err(e) => e,
        };
        assert!(matches!(
            err.code(),
            ErrorCode::NetworkError | ErrorCode::ConnectionTimeout
        ));
    }
}
