pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_message_id() -> String {
    nanoid::nanoid!()
}
