//! Wall-clock helper shared by every handler that stamps a timestamp onto
//! domain state (`enqueued_at_ms`, `started_at_ms`, replay event offsets).

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time moves forward")
        .as_millis() as i64
}
