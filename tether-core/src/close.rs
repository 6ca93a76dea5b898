//! Close-code classification
//!
//! When a connection closes, the close code (and optionally the textual
//! reason) determines how aggressively to reconnect. This module is the
//! pure mapping from code to category; the backoff policy in
//! `tether-client` turns the category into a delay.
//!
//! # Categories
//!
//! - [`CloseCategory::Normal`]: deliberate shutdown, do not reconnect
//! - [`CloseCategory::AuthError`]: credential problem, single-retry path
//! - [`CloseCategory::ServerError`]: server-side failure, long minimum delay
//! - [`CloseCategory::AbnormalClose`]: dirty disconnect, moderate minimum delay
//! - [`CloseCategory::PolicyViolation`]: application policy rejection,
//!   retried like `Unknown` but logged distinctly
//! - [`CloseCategory::Unknown`]: anything else, plain exponential backoff
//!
//! # Code ranges
//!
//! Codes 1000/1001 are benign closes. 1006 is the reserved "abnormal
//! closure" code reported when the peer vanished without a close frame.
//! 1011 through 1014 indicate server-side trouble (internal error,
//! restart, try-again-later, bad gateway). The 4000 range is reserved for
//! application-defined codes; this protocol uses it for auth and policy
//! rejections.

/// Category assigned to a connection close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCategory {
    /// Clean close; reconnection is not wanted
    Normal,
    /// Credential rejected; eligible for exactly one elevated-delay retry
    AuthError,
    /// Server-side failure; the server is likely mid-recovery
    ServerError,
    /// Dirty disconnect without a close handshake
    AbnormalClose,
    /// Application policy rejection; retried like `Unknown`
    PolicyViolation,
    /// Unrecognized code; default exponential backoff applies
    Unknown,
}

/// Classify a close code and optional reason text
///
/// Pure function: same inputs always produce the same category. The
/// reason text only matters for 4000-range codes, where servers that
/// do not use a dedicated auth code still tend to say "auth" somewhere
/// in the reason.
pub fn classify(code: u16, reason: &str) -> CloseCategory {
    match code {
        1000 | 1001 => CloseCategory::Normal,
        1006 => CloseCategory::AbnormalClose,
        1011..=1014 => CloseCategory::ServerError,
        4000..=4999 => {
            if code == 4001 || code == 4003 || reason.to_ascii_lowercase().contains("auth") {
                CloseCategory::AuthError
            } else {
                CloseCategory::PolicyViolation
            }
        }
        _ => CloseCategory::Unknown,
    }
}
