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

use super::error::code::ErrorCode;
use super::error::OneboxError;
use mail_parser::{Addr as MimeAddr, Address as MimeAddress};
use poem::error::ResponseError;
use poem::Body;
use poem::{http::StatusCode, Response};
use std::ops::Deref;
use tracing::error;

pub mod signal;
#[cfg(test)]
pub mod testing;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Addr {
    /// The optional display name associated with the email address (e.g., "John Doe").
    pub name: Option<String>,
    /// The optional email address (e.g., "john.doe@example.com").
    pub address: Option<String>,
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.address) {
            (Some(name), Some(address)) => write!(f, "{} <{}>", name, address),
            (None, Some(address)) => write!(f, "{}", address),
            (Some(name), None) => write!(f, "{}", name),
            (None, None) => write!(f, ""),
        }
    }
}

impl<'x> From<&MimeAddr<'x>> for Addr {
    fn from(original: &MimeAddr<'x>) -> Self {
        Addr {
            name: original.name.as_ref().map(|s| s.to_string()),
            address: original.address.as_ref().map(|s| s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddrVec(pub Vec<Addr>);

impl Deref for AddrVec {
    type Target = Vec<Addr>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for AddrVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|a| a.to_string())
            .filter(|s| !s.is_empty())
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}

impl<'x> From<&MimeAddress<'x>> for AddrVec {
    fn from(original: &MimeAddress<'x>) -> Self {
        let vec = match original {
            MimeAddress::List(addrs) => addrs.iter().map(Addr::from).collect(),
            MimeAddress::Group(groups) => groups
                .iter()
                .flat_map(|group| group.addresses.iter().map(Addr::from))
                .collect(),
        };
        AddrVec(vec)
    }
}

impl ResponseError for OneboxError {
    fn status(&self) -> StatusCode {
        self.code().status()
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        let (code, message) = match self {
            OneboxError::Generic {
                message,
                location,
                code,
            } => {
                error!(
                    error_code = *code as u32,
                    error_message = %message,
                    error_location = ?location
                );
                (*code, message.to_string())
            }
            OneboxError::IoError { source, location } => {
                error!(
                    error_code = ErrorCode::IoError as u32,
                    error_message = %source,
                    error_location = ?location
                );
                (ErrorCode::IoError, source.to_string())
            }
        };
        let body = Body::from_json(serde_json::json!({
            "code": code as u32,
            "message": message,
        }))
        .unwrap_or_else(|_| Body::empty());
        Response::builder().status(self.status()).body(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_list_renders_like_a_header() {
        let list = AddrVec(vec![
            Addr {
                name: Some("Jane Roe".into()),
                address: Some("jane@example.com".into()),
            },
            Addr {
                name: None,
                address: Some("ops@example.com".into()),
            },
            Addr {
                name: None,
                address: None,
            },
        ]);
        assert_eq!(list.to_string(), "Jane Roe <jane@example.com>, ops@example.com");
    }
}
