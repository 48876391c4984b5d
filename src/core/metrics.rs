// src/core/metrics.rs

//! Ambient operational counters, exposed in plain text by `server::metrics_server`
//! (`GET /metrics`): per-subject dispatch counts and the census/zombie counts
//! from the most recent reaper pass. Not part of the control-plane API itself.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Default)]
pub struct Metrics {
    dispatch_counts: DashMap<&'static str, AtomicU64>,
    last_reaper_pass_unix_secs: AtomicI64,
    last_census_size: AtomicU64,
    last_zombie_count: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self, subject: &'static str) {
        self.dispatch_counts
            .entry(subject)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reaper_pass(&self, census_size: u64, zombie_count: u64) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.last_reaper_pass_unix_secs.store(now, Ordering::Relaxed);
        self.last_census_size.store(census_size, Ordering::Relaxed);
        self.last_zombie_count.store(zombie_count, Ordering::Relaxed);
    }

    /// Renders every counter as plain text, one metric per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in self.dispatch_counts.iter() {
            out.push_str(&format!(
                "dispatch_count{{subject=\"{}\"}} {}\n",
                entry.key(),
                entry.value().load(Ordering::Relaxed)
            ));
        }
        out.push_str(&format!(
            "reaper_last_pass_unix_secs {}\n",
            self.last_reaper_pass_unix_secs.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "reaper_last_census_size {}\n",
            self.last_census_size.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "reaper_last_zombie_count {}\n",
            self.last_zombie_count.load(Ordering::Relaxed)
        ));
        out
    }
}
