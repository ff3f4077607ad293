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

use async_trait::async_trait;

use crate::{
    modules::{
        error::{code::ErrorCode, OneboxResult},
        reply::ReplySuggester,
    },
    raise_error,
};

/// Offline suggester: picks the agenda snippet sharing the most words with
/// the email and fills a fixed reply.
pub struct TemplateSuggester {
    agenda: Vec<String>,
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

impl TemplateSuggester {
    pub fn new(agenda: Vec<String>) -> Self {
        Self { agenda }
    }

    /// Ties keep the earliest snippet.
    fn best_snippet(&self, email_text: &str) -> Option<&str> {
        let email_words = words(email_text);
        let mut best: Option<(&str, usize)> = None;
        for snippet in &self.agenda {
            let overlap = words(snippet).intersection(&email_words).count();
            if best.is_none_or(|(_, score)| overlap > score) {
                best = Some((snippet.as_str(), overlap));
            }
        }
        best.map(|(snippet, _)| snippet)
    }
}

#[async_trait]
impl ReplySuggester for TemplateSuggester {
    async fn suggest(&self, email_text: &str) -> OneboxResult<String> {
        let context = self.best_snippet(email_text).ok_or_else(|| {
            raise_error!(
                "No agenda snippets available for reply context".into(),
                ErrorCode::ReplyGenerationFailed
            )
        })?;
        Ok(format!(
            "Hi,\n\nThank you for your email. {}\n\nBest regards",
            context
        ))
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::reply::load_agenda;

    #[tokio::test]
    async fn picks_the_snippet_with_the_most_shared_words() {
        let suggester = TemplateSuggester::new(load_agenda(None).unwrap());
        let reply = suggester
            .suggest("Could you show me a demo next week? I'd like to see the calendar.")
            .await
            .unwrap();
        assert!(reply.contains("https://cal.com/demo-link"));
        assert!(reply.starts_with("Hi,"));
    }

    #[tokio::test]
    async fn no_overlap_falls_back_to_the_first_snippet() {
        let suggester = TemplateSuggester::new(vec!["first".into(), "second".into()]);
        let reply = suggester.suggest("zzz").await.unwrap();
        assert!(reply.contains("first"));
    }

    #[tokio::test]
    async fn empty_agenda_is_an_error() {
        let err = TemplateSuggester::new(Vec::new())
            .suggest("hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReplyGenerationFailed);
    }
}
