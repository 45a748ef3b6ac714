//! Human-shareable lobby codes
//!
//! Codes are short, uppercase, and drawn from an alphabet that excludes
//! visually ambiguous characters (0/O, 1/I/L). Uniqueness among open
//! lobbies is the registry's job; this module only produces candidates.
//! RNG is injected via closure so generation stays deterministic in tests.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters safe for lobby codes (no 0, O, I, 1, L).
pub const SAFE_ALPHABET: &str = "ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Default code length.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// A human-readable join code for a lobby.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LobbyCode(String);

impl LobbyCode {
    /// Wrap an externally supplied code (e.g. typed by a user).
    ///
    /// Codes are matched case-insensitively, so normalize to uppercase.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a random candidate code.
    ///
    /// `pick` must return an index in `0..bound` for the given `bound`.
    pub fn random(length: usize, alphabet: &str, mut pick: impl FnMut(usize) -> usize) -> Self {
        let chars: Vec<char> = alphabet.chars().collect();
        let code: String = (0..length).map(|_| chars[pick(chars.len())]).collect();
        Self(code)
    }

    /// Generate a fallback candidate with a time-derived suffix.
    ///
    /// Used after repeated collisions: the final two characters come from
    /// the clock, which guarantees the retry loop terminates.
    pub fn random_with_time_suffix(
        length: usize,
        alphabet: &str,
        pick: impl FnMut(usize) -> usize,
        now: DateTime<Utc>,
    ) -> Self {
        let random_len = length.saturating_sub(2);
        let base = Self::random(random_len, alphabet, pick);
        let suffix = base36_suffix(now.timestamp_millis(), 2);
        Self(format!("{}{}", base.0, suffix))
    }
}

impl fmt::Display for LobbyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last `len` digits of `value` rendered in uppercase base-36.
fn base36_suffix(value: i64, len: usize) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut n = value.unsigned_abs();
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    let s = String::from_utf8_lossy(&out).into_owned();
    let start = s.len().saturating_sub(len);
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cycling_pick(seq: Vec<usize>) -> impl FnMut(usize) -> usize {
        let mut i = 0;
        move |bound| {
            let v = seq[i % seq.len()] % bound;
            i += 1;
            v
        }
    }

    #[test]
    fn test_random_code_length_and_alphabet() {
        let code = LobbyCode::random(DEFAULT_CODE_LENGTH, SAFE_ALPHABET, cycling_pick(vec![0, 5, 30]));
        assert_eq!(code.as_str().len(), DEFAULT_CODE_LENGTH);
        assert!(code.as_str().chars().all(|c| SAFE_ALPHABET.contains(c)));
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_characters() {
        for ambiguous in ['0', 'O', '1', 'I', 'L'] {
            assert!(!SAFE_ALPHABET.contains(ambiguous));
        }
    }

    #[test]
    fn test_time_suffix_fallback_keeps_length() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp");
        let code =
            LobbyCode::random_with_time_suffix(6, SAFE_ALPHABET, cycling_pick(vec![3]), now);
        assert_eq!(code.as_str().len(), 6);
    }

    #[test]
    fn test_time_suffix_is_deterministic_for_fixed_clock() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp");
        let a = LobbyCode::random_with_time_suffix(6, SAFE_ALPHABET, cycling_pick(vec![0]), now);
        let b = LobbyCode::random_with_time_suffix(6, SAFE_ALPHABET, cycling_pick(vec![0]), now);
        assert_eq!(a.as_str()[4..], b.as_str()[4..]);
    }

    #[test]
    fn test_external_codes_are_uppercased() {
        assert_eq!(LobbyCode::new("abc234").as_str(), "ABC234");
    }
}
