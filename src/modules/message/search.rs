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

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// `asc` (any case) sorts oldest first; everything else newest first.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

/// Filters accepted by the email list. Present filters are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub folder: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: SortDirection,
}

impl ListFilter {
    pub fn new(
        folder: Option<String>,
        account: Option<String>,
        category: Option<String>,
        search: Option<String>,
        sort: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            folder: non_empty(folder),
            account: non_empty(account),
            category: non_empty(category),
            search: non_empty(search.map(|s| s.trim().to_string())),
            sort: SortDirection::parse(sort.as_deref()),
        }
    }
}
