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

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::{
    modules::error::{code::ErrorCode, OneboxResult},
    raise_error,
};

pub mod entity;

use entity::{AccountConfig, DEFAULT_FOLDER, DEFAULT_IMAPS_PORT};

/// Loads the account list from the JSON file when given, otherwise from the
/// numbered `IMAP_*{n}` environment variables. An empty result is an error.
pub fn load_accounts(accounts_file: Option<&str>) -> OneboxResult<Vec<AccountConfig>> {
    let accounts = match accounts_file {
        Some(path) => load_from_file(Path::new(path))?,
        None => load_from_env(|key| std::env::var(key).ok())?,
    };
    validate_accounts(&accounts)?;
    info!("Loaded {} mailbox account(s)", accounts.len());
    Ok(accounts)
}

fn load_from_file(path: &Path) -> OneboxResult<Vec<AccountConfig>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        raise_error!(
            format!("Failed to read accounts file {:?}: {}", path, e),
            ErrorCode::MissingConfiguration
        )
    })?;
    serde_json::from_str(&content).map_err(|e| {
        raise_error!(
            format!("Accounts file {:?} is not a valid account list: {}", path, e),
            ErrorCode::MissingConfiguration
        )
    })
}

/// Reads `IMAP_USER1`, `IMAP_PASSWORD1`, `IMAP_HOST1`, `IMAP_PORT1`, ... until
/// the first index without an `IMAP_USER{n}`. `IMAP_TLS{n}`, `IMAP_FOLDER{n}`
/// and `IMAP_ACCEPT_INVALID_CERTS{n}` are optional.
pub fn load_from_env<F>(lookup: F) -> OneboxResult<Vec<AccountConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut accounts = Vec::new();
    for n in 1.. {
        let Some(user) = lookup(&format!("IMAP_USER{n}")) else {
            break;
        };
        let required = |name: &str| {
            lookup(&format!("{name}{n}")).ok_or_else(|| {
                raise_error!(
                    format!("IMAP_USER{n} is set but {name}{n} is missing"),
                    ErrorCode::MissingConfiguration
                )
            })
        };
        let password = required("IMAP_PASSWORD")?;
        let host = required("IMAP_HOST")?;
        let port = match lookup(&format!("IMAP_PORT{n}")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                raise_error!(
                    format!("IMAP_PORT{n} must be a port number, got '{raw}'"),
                    ErrorCode::MissingConfiguration
                )
            })?,
            None => DEFAULT_IMAPS_PORT,
        };
        let flag = |name: &str, default: bool| {
            lookup(&format!("{name}{n}"))
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(default)
        };
        accounts.push(AccountConfig {
            user,
            password,
            host,
            port,
            use_tls: flag("IMAP_TLS", true),
            folder: lookup(&format!("IMAP_FOLDER{n}")).unwrap_or_else(|| DEFAULT_FOLDER.into()),
            accept_invalid_certs: flag("IMAP_ACCEPT_INVALID_CERTS", false),
        });
    }
    Ok(accounts)
}

fn validate_accounts(accounts: &[AccountConfig]) -> OneboxResult<()> {
    if accounts.is_empty() {
        return Err(raise_error!(
            "No IMAP accounts configured. Set ONEBOX_ACCOUNTS_FILE or IMAP_USER1/IMAP_PASSWORD1/IMAP_HOST1."
                .into(),
            ErrorCode::MissingConfiguration
        ));
    }
    let mut seen = HashSet::new();
    for account in accounts {
        account.validate()?;
        if !seen.insert(account.mailbox_key()) {
            return Err(raise_error!(
                format!("Mailbox {} is configured more than once", account.mailbox_key()),
                ErrorCode::MissingConfiguration
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn numbered_env_vars_are_read_until_the_first_gap() {
        let lookup = env(&[
            ("IMAP_USER1", "one@example.com"),
            ("IMAP_PASSWORD1", "p1"),
            ("IMAP_HOST1", "imap.example.com"),
            ("IMAP_PORT1", "993"),
            ("IMAP_USER2", "two@example.com"),
            ("IMAP_PASSWORD2", "p2"),
            ("IMAP_HOST2", "imap.other.com"),
            ("IMAP_TLS2", "false"),
            ("IMAP_PORT2", "143"),
            ("IMAP_USER4", "ignored@example.com"),
        ]);
        let accounts = load_from_env(lookup).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].user, "one@example.com");
        assert!(accounts[0].use_tls);
        assert_eq!(accounts[1].port, 143);
        assert!(!accounts[1].use_tls);
        assert_eq!(accounts[1].folder, "INBOX");
    }

    #[test]
    fn missing_password_is_a_configuration_error() {
        let lookup = env(&[("IMAP_USER1", "one@example.com"), ("IMAP_HOST1", "h")]);
        let err = load_from_env(lookup).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingConfiguration);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let lookup = env(&[
            ("IMAP_USER1", "one@example.com"),
            ("IMAP_PASSWORD1", "p"),
            ("IMAP_HOST1", "h"),
            ("IMAP_PORT1", "imaps"),
        ]);
        assert!(load_from_env(lookup).is_err());
    }

    #[test]
    fn accounts_file_is_parsed_and_duplicates_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"[
                {"user":"a@example.com","password":"x","host":"imap.example.com"},
                {"user":"a@example.com","password":"x","host":"imap.example.com","folder":"Spam"}
            ]"#,
        )
        .unwrap();
        let accounts = load_accounts(path.to_str()).unwrap();
        assert_eq!(accounts.len(), 2);

        let dup = dir.path().join("dup.json");
        std::fs::write(
            &dup,
            br#"[
                {"user":"a@example.com","password":"x","host":"imap.example.com"},
                {"user":"a@example.com","password":"y","host":"imap.example.com"}
            ]"#,
        )
        .unwrap();
        assert!(load_accounts(dup.to_str()).is_err());
    }

    #[test]
    fn empty_account_list_is_fatal() {
        assert!(validate_accounts(&[]).is_err());
    }
}
