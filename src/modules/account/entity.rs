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

use serde::{Deserialize, Serialize};

use crate::{
    modules::error::{code::ErrorCode, OneboxResult},
    raise_error,
};

pub const DEFAULT_FOLDER: &str = "INBOX";
pub const DEFAULT_IMAPS_PORT: u16 = 993;

fn default_port() -> u16 {
    DEFAULT_IMAPS_PORT
}

fn default_use_tls() -> bool {
    true
}

fn default_folder() -> String {
    DEFAULT_FOLDER.to_string()
}

/// Static description of one mailbox to ingest.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccountConfig {
    /// Login name, also used as the owning `account` of indexed documents.
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Skip certificate verification. Only meant for self-signed test servers.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("folder", &self.folder)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl AccountConfig {
    pub fn validate(&self) -> OneboxResult<()> {
        for (name, value) in [
            ("user", &self.user),
            ("password", &self.password),
            ("host", &self.host),
            ("folder", &self.folder),
        ] {
            if value.trim().is_empty() {
                return Err(raise_error!(
                    format!(
                        "Account '{}' is missing the required '{}' setting",
                        self.user, name
                    ),
                    ErrorCode::MissingConfiguration
                ));
            }
        }
        if self.port == 0 {
            return Err(raise_error!(
                format!("Account '{}' has an invalid port 0", self.user),
                ErrorCode::MissingConfiguration
            ));
        }
        Ok(())
    }

    /// Identity used for log prefixes and duplicate detection.
    pub fn mailbox_key(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.folder)
    }
}
