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
use regex::{Regex, RegexSet};

use crate::{
    modules::{
        classifier::{Category, IntentClassifier},
        error::{code::ErrorCode, OneboxResult},
    },
    raise_error,
};

const MEETING_PATTERNS: &[&str] = &[
    r"book a meeting",
    r"schedule",
    r"calendar",
    r"meeting booked",
    r"meeting confirmed",
    r"calendly",
];

const MEETING_CANCEL_PATTERNS: &[&str] = &[
    r"\bcancel(?:l?ed|ling|lation)?\b",
    r"\bcall(?:ed)? off\b",
    r"\bno longer (?:meet|available)",
];

const INTEREST_PATTERNS: &[&str] = &[
    r"interested",
    r"let[’']s talk",
    r"sounds good",
    r"i[’']d love to",
];

const DECLINE_PATTERNS: &[&str] = &[
    r"not interested",
    r"no thanks",
    r"no thank you",
    r"not at this time",
];

const ABSENCE_PATTERNS: &[&str] = &[
    r"out of office",
    r"\booo\b",
    r"vacation",
    r"on leave",
    r"auto-reply",
];

const SPAM_PATTERNS: &[&str] = &[
    r"unsubscribe",
    r"you won",
    r"click here",
    r"limited time offer",
];

/// Deterministic rule-based backend used when no zero-shot token is configured.
///
/// Rules are evaluated in order against the lower-cased `subject + " " + text`:
/// meeting (unless cancelled), interest (after decline phrases are removed),
/// decline, absence, promotional. No match yields [`Category::Uncategorized`].
pub struct KeywordClassifier {
    meeting: RegexSet,
    meeting_cancel: RegexSet,
    interest: RegexSet,
    decline: RegexSet,
    decline_strip: Regex,
    absence: RegexSet,
    spam: RegexSet,
}

fn regex_set(patterns: &[&str]) -> OneboxResult<RegexSet> {
    RegexSet::new(patterns).map_err(|e| {
        raise_error!(
            format!("Invalid keyword pattern: {}", e),
            ErrorCode::InternalError
        )
    })
}

impl KeywordClassifier {
    pub fn new() -> OneboxResult<Self> {
        let decline_strip = Regex::new(&DECLINE_PATTERNS.join("|")).map_err(|e| {
            raise_error!(
                format!("Invalid keyword pattern: {}", e),
                ErrorCode::InternalError
            )
        })?;
        Ok(Self {
            meeting: regex_set(MEETING_PATTERNS)?,
            meeting_cancel: regex_set(MEETING_CANCEL_PATTERNS)?,
            interest: regex_set(INTEREST_PATTERNS)?,
            decline: regex_set(DECLINE_PATTERNS)?,
            decline_strip,
            absence: regex_set(ABSENCE_PATTERNS)?,
            spam: regex_set(SPAM_PATTERNS)?,
        })
    }

    pub fn categorize(&self, subject: &str, text: &str) -> Category {
        let haystack = format!("{} {}", subject, text).to_lowercase();

        if self.meeting.is_match(&haystack) && !self.meeting_cancel.is_match(&haystack) {
            return Category::MeetingBooked;
        }

        let without_declines = self.decline_strip.replace_all(&haystack, " ");
        if self.interest.is_match(&without_declines) {
            return Category::Interested;
        }
        if self.decline.is_match(&haystack) {
            return Category::NotInterested;
        }
        if self.absence.is_match(&haystack) {
            return Category::OutOfOffice;
        }
        if self.spam.is_match(&haystack) {
            return Category::Spam;
        }
        Category::Uncategorized
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, subject: &str, text: &str) -> Category {
        self.categorize(subject, text)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(subject: &str, body: &str) -> Category {
        KeywordClassifier::new().unwrap().categorize(subject, body)
    }

    #[test]
    fn schedule_in_any_case_is_a_meeting() {
        assert_eq!(classify("", "Can we SCHEDULE a call?"), Category::MeetingBooked);
        assert_eq!(classify("Calendly invite", ""), Category::MeetingBooked);
    }

    #[test]
    fn cancelled_meetings_fall_through() {
        assert_eq!(
            classify("Meeting cancelled", "I have to cancel our calendar slot"),
            Category::Uncategorized
        );
        assert_eq!(
            classify("Meeting canceled", "Not interested anymore"),
            Category::NotInterested
        );
    }

    #[test]
    fn decline_phrases_do_not_count_as_interest() {
        assert_eq!(
            classify("Re: proposal", "Sorry, not interested."),
            Category::NotInterested
        );
        assert_eq!(
            classify("Re: proposal", "No thanks for now"),
            Category::NotInterested
        );
        assert_eq!(
            classify("Re: proposal", "We are interested, let's talk next week"),
            Category::Interested
        );
        assert_eq!(
            classify("Re: proposal", "Not interested in plan A but interested in plan B"),
            Category::Interested
        );
    }

    #[test]
    fn curly_apostrophes_are_understood() {
        assert_eq!(classify("", "I’d love to hear more"), Category::Interested);
    }

    #[test]
    fn ooo_only_matches_as_a_word() {
        assert_eq!(classify("OOO until Monday", ""), Category::OutOfOffice);
        assert_eq!(classify("Look at this", "a cooool idea"), Category::Uncategorized);
        assert_eq!(
            classify("Automatic reply", "I am on vacation"),
            Category::OutOfOffice
        );
    }

    #[test]
    fn promotional_text_is_spam() {
        assert_eq!(
            classify("You won!", "Click here to claim. Unsubscribe below."),
            Category::Spam
        );
    }

    #[test]
    fn unmatched_text_is_uncategorized() {
        assert_eq!(classify("Invoice", "Please find attached."), Category::Uncategorized);
    }
}
