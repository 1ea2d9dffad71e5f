/// Current UTC timestamp in milliseconds.
///
/// Lease bookkeeping compares these stamps directly, so callers treat the
/// value as monotonically non-decreasing wall-clock time.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
