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

use std::path::Path;

use async_trait::async_trait;

use crate::{
    modules::error::{code::ErrorCode, OneboxResult},
    raise_error,
};

pub mod openai;
pub mod template;

/// Context used when no agenda file is configured.
pub const DEFAULT_AGENDA: [&str; 3] = [
    "I am applying for a job position. If the lead is interested, share the meeting booking link: https://cal.com/example",
    "Our product is an AI-powered CRM that helps with email automation and lead scoring.",
    "If the person wants a demo, share the demo calendar link: https://cal.com/demo-link",
];

/// Drafts a reply to an inbound email.
#[async_trait]
pub trait ReplySuggester: Send + Sync {
    async fn suggest(&self, email_text: &str) -> OneboxResult<String>;

    fn name(&self) -> &'static str;
}

/// Agenda snippets from a JSON array of strings, or the built-in defaults.
pub fn load_agenda(path: Option<&Path>) -> OneboxResult<Vec<String>> {
    let Some(path) = path else {
        return Ok(DEFAULT_AGENDA.iter().map(|s| s.to_string()).collect());
    };
    let content = std::fs::read_to_string(path).map_err(|e| {
        raise_error!(
            format!("Failed to read agenda file {}: {}", path.display(), e),
            ErrorCode::MissingConfiguration
        )
    })?;
    let snippets: Vec<String> = serde_json::from_str(&content).map_err(|e| {
        raise_error!(
            format!("Agenda file {} is not a JSON array of strings: {}", path.display(), e),
            ErrorCode::MissingConfiguration
        )
    })?;
    let snippets: Vec<String> = snippets
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if snippets.is_empty() {
        return Err(raise_error!(
            format!("Agenda file {} has no snippets", path.display()),
            ErrorCode::MissingConfiguration
        ));
    }
    Ok(snippets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let agenda = load_agenda(None).unwrap();
        assert_eq!(agenda.len(), 3);
        assert!(agenda[2].contains("demo"));
    }

    #[test]
    fn reads_and_trims_snippets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agenda.json");
        std::fs::write(&path, r#"["  Book here: https://cal.com/me ", ""]"#).unwrap();
        assert_eq!(
            load_agenda(Some(&path)).unwrap(),
            vec!["Book here: https://cal.com/me".to_string()]
        );
    }

    #[test]
    fn empty_or_malformed_files_are_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agenda.json");
        std::fs::write(&path, "[]").unwrap();
        assert_eq!(
            load_agenda(Some(&path)).unwrap_err().code(),
            ErrorCode::MissingConfiguration
        );
        std::fs::write(&path, "{\"a\":1}").unwrap();
        assert!(load_agenda(Some(&path)).is_err());
        assert!(load_agenda(Some(&dir.path().join("missing.json"))).is_err());
    }
}
