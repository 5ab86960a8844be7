//! # Tuner Control Loop
//!
//! The long-running analysis loop: drain a table's sample ring,
//! compute a smoothed write-ratio and a frequency-ranked histogram of
//! accessed column sets, decide on a suggested set of indexes,
//! synchronize the registry toward that set subject to a storage cap
//! and a write-intensity override, update each live index's utility by
//! exponential moving average, and invoke the builder.
//!
//! [`Tuner`] is an explicitly constructed object, owned by whatever
//! embeds it and passed around by `Arc`, rather than a process-wide
//! singleton — tests can build independent instances that do not share
//! state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, trace};

use crate::builder::{self, BuildConfig};
use crate::index::{IndexKind, IndexMetadata, SkipListIndex};
use crate::sample::SampleKind;
use crate::tile::{ColumnId, Table};


/// All configuration knobs the tuner exposes, with their recommended
/// defaults.
#[derive(Debug, Clone, Copy)]
pub struct TunerConfig {
    pub sample_count_threshold: usize,
    pub index_count_threshold: usize,
    pub index_utility_threshold: f64,
    pub write_ratio_threshold: f64,
    pub alpha: f64,
    pub max_tile_groups_indexed_per_pass: u64,
    pub initial_utility: f64,
    pub frequent_sample_rank: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_count_threshold: 20,
            index_count_threshold: 5,
            index_utility_threshold: 0.1,
            write_ratio_threshold: 0.8,
            alpha: 0.2,
            max_tile_groups_indexed_per_pass: 10,
            initial_utility: 0.5,
            frequent_sample_rank: 10,
        }
    }
}

/// Errors that abort a single table's analysis pass. The control loop
/// logs these and continues with the next table — it never terminates
/// because of one table's fault.
#[derive(Debug, thiserror::Error)]
pub enum TunerError {
    #[error("table {table}: negative weight in sample")]
    NegativeWeight { table: String },
    #[error("table {table}: registry invariant violated: {source}")]
    RegistryInvariant {
        table: String,
        #[source]
        source: crate::registry::RegistryError,
    },
}

/// The long-running tuner: owns the set of registered tables, the
/// stop flag, and the single background worker thread.
pub struct Tuner {
    tables: Mutex<Vec<Arc<Table>>>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: TunerConfig,
    /// Shared across every registered table, exactly like the original
    /// `IndexTuner::average_write_ratio` member.
    write_ratio: Mutex<Option<f64>>,
    next_oid: std::sync::atomic::AtomicU64,
}

impl Tuner {
    pub fn new(config: TunerConfig) -> Arc<Self> {
        Arc::new(Self {
            tables: Mutex::new(Vec::new()),
            stop: Arc::new(AtomicBool::new(true)),
            worker: Mutex::new(None),
            config,
            write_ratio: Mutex::new(None),
            next_oid: std::sync::atomic::AtomicU64::new(1),
        })
    }

    pub fn register_table(&self, table: Arc<Table>) {
        self.tables.lock().unwrap().push(table);
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// The current smoothed write-ratio, or `None` before the first pass.
    pub fn smoothed_write_ratio(&self) -> Option<f64> {
        *self.write_ratio.lock().unwrap()
    }

    /// Launches the background worker thread.
    pub fn start(self: &Arc<Self>) {
        self.stop.store(false, Ordering::SeqCst);
        let this = Arc::clone(self);
        let handle = std::thread::spawn(move || this.run());
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Sets the stop flag and joins the worker. After this returns, no
    /// further index mutations or cursor advances happen.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn run(self: Arc<Self>) {
        trace!("tuner worker starting");
        while !self.stop.load(Ordering::SeqCst) {
            let tables: Vec<Arc<Table>> = self.tables.lock().unwrap().clone();
            for table in &tables {
                if self.stop.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = self.analyze_table(table) {
                    error!(table = %table.name, error = %e, "tuner pass aborted for table");
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        trace!("tuner worker stopped");
    }

    /// Runs one analysis + build pass for a single table: write-ratio
    /// estimation, column histogram, add/drop policy, utility update,
    /// builder invocation. Public so callers that want deterministic,
    /// single-step control (e.g. tests) can drive it without the
    /// background thread.
    pub fn analyze_table(&self, table: &Table) -> Result<(), TunerError> {
        let sample_count = table.samples.len();
        if sample_count < self.config.sample_count_threshold {
            return Ok(());
        }

        let samples = table.samples.drain();
        if samples.is_empty() {
            return Ok(());
        }

        // (a) Write-ratio estimation.
        let mut access_weight = 0.0f64;
        let mut update_weight = 0.0f64;
        for s in &samples {
            if s.weight < 0.0 {
                return Err(TunerError::NegativeWeight {
                    table: table.name.clone(),
                });
            }
            match s.kind {
                SampleKind::Access => access_weight += s.weight,
                SampleKind::Update => update_weight += s.weight,
            }
        }
        let total = access_weight + update_weight;
        let smoothed_ratio = if total > 0.0 {
            let r = update_weight / total;
            let mut guard = self.write_ratio.lock().unwrap();
            let updated = match *guard {
                None => r,
                Some(prev) => self.config.alpha * r + (1.0 - self.config.alpha) * prev,
            };
            *guard = Some(updated);
            Some(updated)
        } else {
            *self.write_ratio.lock().unwrap()
        };
        debug!(table = %table.name, ?smoothed_ratio, "write ratio updated");

        // (b) Frequency-weighted column-set histogram.
        let mut histogram: BTreeMap<Vec<ColumnId>, f64> = BTreeMap::new();
        let mut total_metric = 0.0f64;
        for s in &samples {
            match s.kind {
                SampleKind::Access | SampleKind::Update => {
                    let mut cols = s.columns.clone();
                    cols.sort_unstable();
                    cols.dedup();
                    *histogram.entry(cols).or_insert(0.0) += s.metric;
                    total_metric += s.metric;
                }
            }
        }
        if total_metric > 0.0 {
            for v in histogram.values_mut() {
                *v /= total_metric;
            }
        }

        // (c) Suggested indexes: top-N by fraction.
        let mut ranked: Vec<(Vec<ColumnId>, f64)> = histogram.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let suggested: Vec<Vec<ColumnId>> = ranked
            .iter()
            .take(self.config.frequent_sample_rank)
            .map(|(cols, _)| cols.clone())
            .filter(|cols| !cols.is_empty())
            .collect();

        // (d) Drop policy.
        let valid_count = table.registry.valid_count();
        let write_intensive = smoothed_ratio
            .map(|r| r > self.config.write_ratio_threshold)
            .unwrap_or(false);
        let over_cap = valid_count > self.config.index_count_threshold;

        let mut below_threshold: Vec<u64> = table
            .registry
            .iter_live()
            .into_iter()
            .filter(|(_, idx)| idx.metadata().utility() < self.config.index_utility_threshold)
            .map(|(_, idx)| idx.metadata().oid)
            .collect();
        for oid in below_threshold.drain(..) {
            info!(table = %table.name, oid, "dropping index below utility threshold");
            table
                .registry
                .drop_by_oid(oid)
                .map_err(|e| TunerError::RegistryInvariant {
                    table: table.name.clone(),
                    source: e,
                })?;
        }

        if over_cap || write_intensive {
            let mut live = table.registry.iter_live();
            live.sort_by(|(_, a), (_, b)| {
                a.metadata()
                    .utility()
                    .partial_cmp(&b.metadata().utility())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let excess = table
                .registry
                .valid_count()
                .saturating_sub(self.config.index_count_threshold);
            for (_, idx) in live.into_iter().take(excess.max(if write_intensive { 1 } else { 0 })) {
                let oid = idx.metadata().oid;
                info!(table = %table.name, oid, over_cap, write_intensive, "dropping lowest-utility index");
                let _ = table.registry.drop_by_oid(oid);
            }
        }

        // (e) Add policy. The write-intensity override gates this step
        // too: a write-heavy table should not pay the cost of building
        // fresh indexes it would likely have to drop again next pass.
        if !write_intensive && table.registry.valid_count() <= self.config.index_count_threshold {
            for cols in &suggested {
                if table.registry.valid_count() >= self.config.index_count_threshold {
                    break;
                }
                let col_set: std::collections::BTreeSet<ColumnId> = cols.iter().copied().collect();
                let already_present = table
                    .registry
                    .iter_live()
                    .iter()
                    .any(|(_, idx)| idx.metadata().key_attr_set() == col_set);
                if already_present {
                    continue;
                }
                let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
                let meta = IndexMetadata::new(oid, format!("adhoc_index_{oid}"), cols.clone(), IndexKind::Secondary);
                meta.set_utility(self.config.initial_utility);
                let index = SkipListIndex::new(meta);
                let slot = table.registry.add(index);
                info!(table = %table.name, oid, slot, ?cols, "created new index");
            }
        }

        // (f) Utility update.
        let fractions: BTreeMap<Vec<ColumnId>, f64> = ranked.into_iter().collect();
        for (_, idx) in table.registry.iter_live() {
            let mut key: Vec<ColumnId> = idx.metadata().key_attrs.clone();
            key.sort_unstable();
            let u = fractions.get(&key).copied().unwrap_or(0.0);
            let prev = idx.metadata().utility();
            let updated = self.config.alpha * u + (1.0 - self.config.alpha) * prev;
            idx.metadata().set_utility(updated);
            trace!(table = %table.name, oid = idx.metadata().oid, u, updated, "utility updated");
        }

        // (g) Build.
        let build_cfg = BuildConfig {
            max_tile_groups_per_pass: self.config.max_tile_groups_indexed_per_pass,
        };
        let report = builder::build_all(table, &table.registry, &build_cfg);
        if !report.retired.is_empty() {
            debug!(table = %table.name, ?report.retired, "builder retired indexes this pass");
        }

        // (h) the sample ring was already drained at the top of this pass.
        Ok(())
    }
}
