//! Compilation metrics using metrics-rs.
//!
//! Recording goes through the `metrics` facade, so it is free when no
//! recorder is installed. The CLI installs [`CliRecorder`] to print a
//! summary after a run.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_histogram, histogram,
};
use parking_lot::RwLock;

pub const PROGRAMS_COMPILED: &str = "pjit_programs_compiled_total";
pub const PROGRAMS_FAILED: &str = "pjit_programs_failed_total";
pub const FIXUPS: &str = "pjit_fixups_total";
pub const IMAGE_BYTES: &str = "pjit_image_bytes";

// ============================================================================
// Metric descriptions
// ============================================================================

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        PROGRAMS_COMPILED,
        Unit::Count,
        "Programs compiled to native code"
    );
    describe_counter!(
        PROGRAMS_FAILED,
        Unit::Count,
        "Programs that failed to compile, by failure kind"
    );
    describe_counter!(
        FIXUPS,
        Unit::Count,
        "Subprogram call sites patched after first-phase compilation"
    );
    describe_histogram!(IMAGE_BYTES, Unit::Bytes, "Generated image size");
}

// ============================================================================
// Metric recording functions
// ============================================================================

/// Record a finished image.
pub fn record_compiled(bytes: u32) {
    counter!(PROGRAMS_COMPILED).increment(1);
    histogram!(IMAGE_BYTES).record(f64::from(bytes));
}

/// Record a failed compilation.
pub fn record_failed(kind: &'static str) {
    counter!(PROGRAMS_FAILED, "kind" => kind).increment(1);
}

pub fn record_fixups(patched: usize) {
    counter!(FIXUPS).increment(patched as u64);
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

/// Values collected by a [`CliRecorder`], keyed by [`key_to_string`].
#[derive(Default)]
struct Store {
    counters: RwLock<HashMap<String, u64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    store: Arc<Store>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self.store.counters.write().entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.store.counters.write().insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    store: Arc<Store>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        self.store
            .histograms
            .write()
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// In-memory recorder for CLI runs. Gauges are not recorded.
#[derive(Default)]
pub struct CliRecorder {
    store: Arc<Store>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. Returns `None` if one is already
    /// installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let handle = self.handle();
        metrics::set_global_recorder(self).ok()?;
        Some(handle)
    }

    fn handle(&self) -> CliRecorderHandle {
        CliRecorderHandle {
            store: Arc::clone(&self.store),
        }
    }
}

/// `name{label=value,...}`
fn key_to_string(key: &Key) -> String {
    let mut out = key.name().to_string();
    let mut labels = key.labels().peekable();
    if labels.peek().is_some() {
        let joined: Vec<String> = labels.map(|l| format!("{}={}", l.key(), l.value())).collect();
        out.push('{');
        out.push_str(&joined.join(","));
        out.push('}');
    }
    out
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            store: Arc::clone(&self.store),
        }))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            store: Arc::clone(&self.store),
        }))
    }
}

/// Read access to what a [`CliRecorder`] collected.
pub struct CliRecorderHandle {
    store: Arc<Store>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.store.counters.read().get(key).copied()
    }

    pub fn get_histogram(&self, key: &str) -> Option<Vec<f64>> {
        self.store.histograms.read().get(key).cloned()
    }

    /// Print compile counts, failures by kind, and image size statistics.
    pub fn print_summary(&self) {
        let counters = self.store.counters.read();
        let histograms = self.store.histograms.read();
        if counters.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!("\n## Metrics Summary\n");
        let mut entries: Vec<_> = counters.iter().collect();
        entries.sort();
        for (key, value) in entries {
            println!("  {key}: {value}");
        }
        if let Some(sizes) = histograms.get(IMAGE_BYTES).filter(|v| !v.is_empty()) {
            let total: f64 = sizes.iter().sum();
            let largest = sizes.iter().copied().fold(0.0, f64::max);
            println!(
                "  {IMAGE_BYTES}: images={}, total={total:.0}, largest={largest:.0}, avg={:.1}",
                sizes.len(),
                total / sizes.len() as f64
            );
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::Label;

    #[test]
    fn test_key_to_string() {
        let key = Key::from_name(PROGRAMS_COMPILED);
        assert_eq!(key_to_string(&key), "pjit_programs_compiled_total");

        let key = Key::from_parts(PROGRAMS_FAILED, vec![Label::new("kind", "unsupported")]);
        assert_eq!(
            key_to_string(&key),
            "pjit_programs_failed_total{kind=unsupported}"
        );
    }

    #[test]
    fn test_recording_through_local_recorder() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_compiled(64);
            record_compiled(32);
            record_failed("unsupported");
            record_fixups(3);
        });
        assert_eq!(handle.get_counter(PROGRAMS_COMPILED), Some(2));
        assert_eq!(
            handle.get_counter("pjit_programs_failed_total{kind=unsupported}"),
            Some(1)
        );
        assert_eq!(handle.get_counter(FIXUPS), Some(3));
        assert_eq!(handle.get_histogram(IMAGE_BYTES), Some(vec![64.0, 32.0]));
    }

    #[test]
    fn test_gauges_ignored() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::gauge!("pjit_unused").set(1.0);
        });
        assert_eq!(handle.get_counter("pjit_unused"), None);
        assert_eq!(handle.get_histogram("pjit_unused"), None);
    }
}
