//! Time utilities for the lab console runtime

/// Current time as an RFC 3339 timestamp, as stamped on outbound envelopes
///
/// # Examples
/// ```
/// use lc_core::time::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts.ends_with('Z'));
/// ```
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
