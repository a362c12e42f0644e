//! Interpretation of acknowledgement payloads.
//!
//! An acknowledgement payload starts with a confirmation code; `0x00`
//! means the command succeeded. Any other code is the module declining
//! (wrong password, no finger on the sensor, no matching template),
//! which callers see as a plain `false` or `None` rather than as a
//! transport error.

use byteorder::{BigEndian, ByteOrder};
use log::warn;

/// Confirmation code of a successful command.
pub const CONFIRMATION_OK: u8 = 0x00;

/// A successful library search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Flash slot of the matching template.
    pub id: u16,
    /// Match score; higher is a closer match.
    pub score: u16,
}

/// True iff the payload opens with an OK confirmation.
pub fn is_ok(payload: &[u8]) -> bool {
    payload.first() == Some(&CONFIRMATION_OK)
}

/// Reads a search acknowledgement.
///
/// ```text
/// confrm | 0x00 = found [1]
/// pageid | template slot [2]
/// score  | match score [2]
/// ```
///
/// A non-OK confirmation means no template matched. An OK reply too
/// short to carry slot and score should not happen; it is logged and
/// treated as no match.
pub fn search_match(payload: &[u8]) -> Option<SearchMatch> {
    if !is_ok(payload) {
        return None;
    }
    if payload.len() < 5 {
        warn!("search ack too short: {} bytes", payload.len());
        return None;
    }
    Some(SearchMatch {
        id: BigEndian::read_u16(&payload[1..3]),
        score: BigEndian::read_u16(&payload[3..5]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_requires_a_leading_zero() {
        assert!(is_ok(&[0x00]));
        assert!(is_ok(&[0x00, 0x05]));
        assert!(!is_ok(&[0x09]));
        assert!(!is_ok(&[]));
    }

    #[test]
    fn decodes_a_found_match() {
        assert_eq!(
            search_match(&[0x00, 0x00, 0x05, 0x00, 0x32]),
            Some(SearchMatch { id: 5, score: 50 })
        );
    }

    #[test]
    fn a_declined_search_is_no_match() {
        assert_eq!(search_match(&[0x09]), None);
    }

    #[test]
    fn a_short_ok_reply_is_no_match() {
        assert_eq!(search_match(&[0x00]), None);
        assert_eq!(search_match(&[0x00, 0x00, 0x05]), None);
    }
}
