// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotency key generation.

use uuid::Uuid;

/// Returns a fresh random UUID v4 string.
///
/// Called exactly once per queued item, at creation. Retries reuse the
/// stored key.
pub fn new_idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_v4_uuids() {
        let key = new_idempotency_key();
        let parsed = Uuid::parse_str(&key).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn keys_do_not_repeat() {
        let keys: HashSet<String> = (0..10_000).map(|_| new_idempotency_key()).collect();
        assert_eq!(keys.len(), 10_000);
    }
}
