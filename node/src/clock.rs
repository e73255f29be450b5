use minemesh_protocol::Millis;
use web_time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds. Protocol timestamps are always
/// local-clock values; peers never compare them across nodes.
pub fn now_ms() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Millis)
        .unwrap_or(0)
}
