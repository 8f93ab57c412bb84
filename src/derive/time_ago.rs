use chrono::{DateTime, Utc};

use crate::store::Timestamp;

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;
const MONTH: i64 = 2_592_000;
const YEAR: i64 = 31_536_000;

/// Coarse Arabic "N units ago" label. Buckets are fixed-length (a month is
/// 30 days, a year 365) and a unit applies only once elapsed time exceeds it.
pub fn time_ago(timestamp: Timestamp, now: DateTime<Utc>) -> String {
    if timestamp.seconds == 0 {
        return String::new();
    }
    let elapsed = now.timestamp() - timestamp.seconds;

    let buckets = [
        (YEAR, "سنوات"),
        (MONTH, "أشهر"),
        (DAY, "أيام"),
        (HOUR, "ساعات"),
        (MINUTE, "دقائق"),
    ];
    for (size, unit) in buckets {
        if elapsed > size {
            return format!("قبل {} {}", elapsed / size, unit);
        }
    }
    "قبل لحظات".to_string()
}
