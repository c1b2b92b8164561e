pub mod order;
pub mod order_item;

/// Current wall clock as Unix milliseconds, the unit of every `ctime`/`utime` column.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
