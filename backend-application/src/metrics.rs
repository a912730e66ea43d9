use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    published: AtomicU64,
    publish_errors: AtomicU64,
    relayed: AtomicU64,
    dropped_payloads: AtomicU64,
    hook_failures: AtomicU64,
    admissions_allowed: AtomicU64,
    admissions_denied: AtomicU64,
    open_connections: AtomicI64,
    rooms_created: AtomicU64,
    rooms_destroyed: AtomicU64,
    rooms_expired: AtomicU64,
}

impl Metrics {
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped_payloads.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_hook_failure(&self) {
        self.hook_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission(&self, allowed: bool) {
        if allowed {
            self.admissions_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.admissions_denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn connection_opened(&self) {
        self.open_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.open_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_room_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_room_destroyed(&self) {
        self.rooms_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_room_expired(&self) {
        self.rooms_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hook_failures(&self) -> u64 {
        self.hook_failures.load(Ordering::Relaxed)
    }

    pub fn dropped_payloads(&self) -> u64 {
        self.dropped_payloads.load(Ordering::Relaxed)
    }

    pub fn open_connections(&self) -> i64 {
        self.open_connections.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("burnroom_published_total", self.published.load(Ordering::Relaxed)),
            ("burnroom_publish_errors_total", self.publish_errors.load(Ordering::Relaxed)),
            ("burnroom_relayed_total", self.relayed.load(Ordering::Relaxed)),
            ("burnroom_dropped_payloads_total", self.dropped_payloads.load(Ordering::Relaxed)),
            ("burnroom_hook_failures_total", self.hook_failures.load(Ordering::Relaxed)),
            ("burnroom_admissions_allowed_total", self.admissions_allowed.load(Ordering::Relaxed)),
            ("burnroom_admissions_denied_total", self.admissions_denied.load(Ordering::Relaxed)),
            ("burnroom_rooms_created_total", self.rooms_created.load(Ordering::Relaxed)),
            ("burnroom_rooms_destroyed_total", self.rooms_destroyed.load(Ordering::Relaxed)),
            ("burnroom_rooms_expired_total", self.rooms_expired.load(Ordering::Relaxed)),
        ];

        let mut out = String::new();
        for (name, value) in counters {
            out.push_str(&format!("# TYPE {} counter\n{} {}\n", name, name, value));
        }
        out.push_str(&format!(
            "# TYPE burnroom_open_connections gauge\nburnroom_open_connections {}\n",
            self.open_connections()
        ));
        out
    }
}
