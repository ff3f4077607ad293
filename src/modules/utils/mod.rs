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

use std::io::Cursor;

/// Milliseconds since the Unix epoch.
#[macro_export]
macro_rules! utc_now {
    () => {{
        chrono::Utc::now().timestamp_millis()
    }};
}

/// Stable 64-bit hash over the given key parts, rendered as 16 hex digits.
///
/// Parts are joined with a NUL separator so `("ab", "c")` and `("a", "bc")`
/// never collide on the joined bytes.
pub fn create_hash(parts: &[&str]) -> String {
    let joined = parts.join("\u{0}");
    // reading from an in-memory cursor never fails
    let hash =
        murmur3::murmur3_x64_128(&mut Cursor::new(joined.as_bytes()), 0).unwrap_or_default();
    format!("{:016x}", hash as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_separator_aware() {
        let a = create_hash(&["user@example.com", "INBOX", "1", "42"]);
        let b = create_hash(&["user@example.com", "INBOX", "1", "42"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(create_hash(&["ab", "c"]), create_hash(&["a", "bc"]));
    }
}
