use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;

use crate::cache::{MemoCache, cache_key, fingerprint_bytes};
use crate::chart::{self, ChartKind};
use crate::color::ColorMap;
use crate::config::DashboardConfig;
use crate::data::aggregate::{Distribution, distribution};
use crate::data::export::{ExportFormat, Exporter};
use crate::data::filter::{Choice, FilterEngine, FilterSet, RangeFilter};
use crate::data::loader::{LoaderOptions, load_bytes};
use crate::data::model::{RecordSet, Value};
use crate::error::{DashboardError, ParseFailure};

// ---------------------------------------------------------------------------
// Session phases
// ---------------------------------------------------------------------------

/// Where the single interactive session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No usable file.
    Idle,
    /// File parsed, baseline distribution available.
    Loaded,
    /// Filters submitted and a filtered distribution available.
    Filtered,
}

/// Which distribution a download refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Baseline,
    Filtered,
}

#[derive(Debug, Clone)]
pub struct UploadInfo {
    pub name: String,
    pub size: usize,
}

/// Bytes ready to be written wherever the user chooses.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Arc<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// The full dashboard state, independent of rendering.
///
/// Every user action (upload, submit) runs one synchronous cycle through the
/// methods below. Failures never escape: they become `messages`.
pub struct SessionState {
    pub config: DashboardConfig,
    loader: LoaderOptions,
    phase: Phase,

    /// The uploaded file (None while idle).
    pub upload: Option<UploadInfo>,
    baseline: Option<Arc<RecordSet>>,
    baseline_dist: Option<Distribution>,
    /// Result of the last submit; equal to the baseline right after upload.
    filtered: Option<Arc<RecordSet>>,
    /// None when the last cycle produced nothing to summarise.
    filtered_dist: Option<Distribution>,
    colors: Option<ColorMap>,

    /// Filter form values, applied only on submit.
    pub pending: FilterSet,
    pub pending_chart: ChartKind,
    applied_chart: ChartKind,

    /// User-visible errors for the current cycle.
    messages: Vec<String>,

    load_cache: MemoCache<Result<Arc<RecordSet>, ParseFailure>>,
    filter_engine: FilterEngine,
    exporter: Exporter,
    chart_cache: MemoCache<Arc<Vec<u8>>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

impl SessionState {
    pub fn new(config: DashboardConfig) -> Self {
        let capacity = config.cache_capacity;
        Self {
            loader: LoaderOptions::from_config(&config),
            phase: Phase::Idle,
            upload: None,
            baseline: None,
            baseline_dist: None,
            filtered: None,
            filtered_dist: None,
            colors: None,
            pending: FilterSet {
                range: None,
                memberships: Vec::new(),
            },
            pending_chart: ChartKind::default(),
            applied_chart: ChartKind::default(),
            messages: Vec::new(),
            load_cache: MemoCache::new(capacity),
            filter_engine: FilterEngine::new(capacity),
            exporter: Exporter::new(capacity),
            chart_cache: MemoCache::new(capacity),
            config,
        }
    }

    // -- Transitions --

    /// Parse a new file. Any previous dataset is discarded first, so a failed
    /// upload leaves the session idle.
    pub fn upload(&mut self, name: &str, bytes: &[u8]) {
        self.clear_dataset();
        self.messages.clear();
        self.upload = Some(UploadInfo {
            name: name.to_string(),
            size: bytes.len(),
        });

        let key = fingerprint_bytes(bytes);
        let outcome = match self.load_cache.get(&key) {
            Some(cached) => cached,
            None => {
                let parsed = load_bytes(bytes, &self.loader).map(Arc::new);
                self.load_cache.insert(key, parsed.clone());
                parsed
            }
        };

        let dataset = match outcome {
            Ok(dataset) => dataset,
            Err(failure) => {
                log::error!("Failed to load {name}: {failure}");
                self.messages.extend(failure.messages());
                self.upload = None;
                return;
            }
        };

        let target = self.config.target_column.clone();
        let baseline_dist = match distribution(&dataset, &target) {
            Ok(dist) => dist,
            Err(DashboardError::EmptyResult) => {
                log::error!("No baseline distribution for {name}: '{target}' has no values");
                self.messages
                    .push(format!("{name}: no values in target column '{target}'"));
                self.upload = None;
                return;
            }
            Err(e) => {
                log::error!("No baseline distribution for {name}: {e}");
                self.messages.push(format!("{name}: {e}"));
                self.upload = None;
                return;
            }
        };

        log::info!(
            "Loaded {name}: {} rows, columns {:?}",
            dataset.len(),
            dataset.columns
        );
        self.colors = dataset
            .unique_values
            .get(&target)
            .map(|vals| ColorMap::new(&target, vals));
        self.pending = FilterSet::defaults_for(&dataset, &self.config);
        self.filtered = Some(Arc::clone(&dataset));
        self.filtered_dist = Some(baseline_dist.clone());
        self.baseline_dist = Some(baseline_dist);
        self.baseline = Some(dataset);
        self.phase = Phase::Loaded;
    }

    /// Apply every pending predicate at once and summarise the result.
    pub fn submit(&mut self) {
        let Some(baseline) = self.baseline.clone() else {
            log::warn!("Submit ignored: no dataset loaded");
            return;
        };
        self.messages.clear();

        let filters = self.pending.clone();
        let filtered = match self.filter_engine.run(&baseline, &filters) {
            Ok(filtered) => filtered,
            Err(e) => {
                log::error!("Filtering failed: {e}");
                self.fail_cycle(None, &e);
                return;
            }
        };

        match distribution(&filtered, &self.config.target_column) {
            Ok(dist) => {
                self.filtered = Some(filtered);
                self.filtered_dist = Some(dist);
                self.applied_chart = self.pending_chart;
                self.phase = Phase::Filtered;
            }
            Err(e) => {
                log::warn!("Filtered distribution unavailable: {e}");
                self.fail_cycle(Some(filtered), &e);
            }
        }
    }

    fn fail_cycle(&mut self, filtered: Option<Arc<RecordSet>>, error: &DashboardError) {
        self.messages.push(format!("Filter error: {error}"));
        self.filtered = filtered;
        self.filtered_dist = None;
        self.phase = Phase::Loaded;
    }

    /// Put the form back to the full range and the wildcard everywhere.
    pub fn reset_filters(&mut self) {
        if let Some(baseline) = &self.baseline {
            self.pending = FilterSet::defaults_for(baseline, &self.config);
        }
    }

    fn clear_dataset(&mut self) {
        self.phase = Phase::Idle;
        self.upload = None;
        self.baseline = None;
        self.baseline_dist = None;
        self.filtered = None;
        self.filtered_dist = None;
        self.colors = None;
    }

    // -- Pending form edits --

    /// Toggle one entry of a column's multi-select.
    pub fn toggle_choice(&mut self, column: &str, choice: &Choice) {
        if let Some(selected) = self.pending.selection_mut(column) {
            if !selected.remove(choice) {
                selected.insert(choice.clone());
            }
        }
    }

    /// Set the range filter bounds, keeping `min <= max`.
    pub fn set_range(&mut self, min: f64, max: f64) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        match &mut self.pending.range {
            Some(range) => {
                range.min = min;
                range.max = max;
            }
            None => {
                self.pending.range = Some(RangeFilter {
                    column: self.config.range_column.clone(),
                    min,
                    max,
                });
            }
        }
    }

    // -- Read access --

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn dismiss_messages(&mut self) {
        self.messages.clear();
    }

    /// Surface a failure from outside the cycle (file dialogs, disk writes).
    pub fn report(&mut self, message: String) {
        self.messages.push(message);
    }

    pub fn baseline(&self) -> Option<&Arc<RecordSet>> {
        self.baseline.as_ref()
    }

    pub fn filtered(&self) -> Option<&Arc<RecordSet>> {
        self.filtered.as_ref()
    }

    pub fn baseline_distribution(&self) -> Option<&Distribution> {
        self.baseline_dist.as_ref()
    }

    pub fn filtered_distribution(&self) -> Option<&Distribution> {
        self.filtered_dist.as_ref()
    }

    pub fn colors(&self) -> Option<&ColorMap> {
        self.colors.as_ref()
    }

    pub fn applied_chart(&self) -> ChartKind {
        self.applied_chart
    }

    /// Values offered in a column's multi-select, from the unfiltered data.
    pub fn options_for(&self, column: &str) -> Option<&BTreeSet<Value>> {
        self.baseline.as_ref()?.unique_values.get(column)
    }

    /// Integer bounds for the range slider.
    pub fn range_bounds(&self) -> Option<(i64, i64)> {
        let (lo, hi) = self
            .baseline
            .as_ref()?
            .numeric_bounds(&self.config.range_column)?;
        Some((lo.floor() as i64, hi.ceil() as i64))
    }

    // -- Downloads --

    /// The filtered rows as CSV or XLSX.
    pub fn export_data(&mut self, format: ExportFormat) -> Option<Download> {
        let dataset = self.exportable_view()?;
        let file_name = format!("filtered_data.{}", format.extension());
        let result = self.exporter.export(&dataset, format);
        self.finish_download(file_name, format.mime(), result)
    }

    /// One distribution as a two-column workbook.
    pub fn export_distribution(&mut self, side: Side) -> Option<Download> {
        let (dist, prefix) = match side {
            Side::Baseline => (self.baseline_dist.as_ref()?, "bank_raw"),
            Side::Filtered => (self.filtered_dist.as_ref()?, "bank"),
        };
        let file_name = format!("{prefix}_{}.xlsx", dist.column);
        let result = dist
            .to_record_set()
            .map_err(anyhow::Error::from)
            .and_then(|table| self.exporter.export(&table, ExportFormat::Xlsx));
        self.finish_download(file_name, ExportFormat::Xlsx.mime(), result)
    }

    /// The before/after chart as PNG, in the kind chosen at the last submit.
    pub fn export_chart(&mut self) -> Option<Download> {
        let baseline = self.baseline_dist.as_ref()?;
        let filtered = self.filtered_dist.as_ref()?;
        let colors = self.colors.as_ref()?;
        let kind = self.applied_chart;
        let chart_config = &self.config.chart;

        let result = cache_key(
            "chart",
            &(
                &baseline.source_fingerprint,
                &filtered.source_fingerprint,
                kind.label(),
                chart_config.dpi,
                chart_config.width_in,
                chart_config.height_in,
            ),
        )
        .and_then(|key| {
            self.chart_cache.get_or_try_insert_with(key, || {
                chart::render_png(baseline, filtered, kind, colors, chart_config)
                    .map(Arc::new)
                    .context("rendering chart")
            })
        });
        self.finish_download(kind.file_name(), "image/png", result)
    }

    fn exportable_view(&self) -> Option<Arc<RecordSet>> {
        self.filtered_dist.as_ref()?;
        self.filtered.clone()
    }

    fn finish_download(
        &mut self,
        file_name: String,
        mime: &'static str,
        result: anyhow::Result<Arc<Vec<u8>>>,
    ) -> Option<Download> {
        match result {
            Ok(bytes) => Some(Download {
                file_name,
                mime,
                bytes,
            }),
            Err(e) => {
                log::error!("Export of {file_name} failed: {e:#}");
                self.messages.push(format!("Could not prepare {file_name}: {e:#}"));
                None
            }
        }
    }
}
