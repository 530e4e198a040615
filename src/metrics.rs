//! Prometheus metrics for the run coordinator.
//!
//! Tracks the following metrics:
//! - `coordinatord_files_processed_total`: process candidates that reached a terminal status (counter)
//! - `coordinatord_files_success_total`: process candidates that ended in `success` (counter)
//! - `coordinatord_files_failed_total`: process candidates that ended in a failure status (counter)
//! - `coordinatord_files_skipped_total`: files skipped for instability or already-claimed (counter)
//! - `coordinatord_archive_moves_total`: archive moves scheduled (counter)
//! - `coordinatord_runs_total`: run-trigger invocations (counter)
//! - `coordinatord_last_run_duration_seconds`: duration of the most recent run (gauge)

use std::sync::OnceLock;

use miette::{IntoDiagnostic, Result};
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static FILES_PROCESSED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static FILES_SUCCESS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static FILES_FAILED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static FILES_SKIPPED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static ARCHIVE_MOVES_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static RUNS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static LAST_RUN_DURATION_SECONDS: OnceLock<Gauge> = OnceLock::new();

pub fn init_metrics() {
	let registry = Registry::new();

	let files_processed_total = IntCounter::new(
		"coordinatord_files_processed_total",
		"Process candidates that reached a terminal status",
	)
	.expect("failed to create files_processed_total metric");
	let files_success_total = IntCounter::new(
		"coordinatord_files_success_total",
		"Process candidates that ended in success",
	)
	.expect("failed to create files_success_total metric");
	let files_failed_total = IntCounter::new(
		"coordinatord_files_failed_total",
		"Process candidates that ended in a failure status",
	)
	.expect("failed to create files_failed_total metric");
	let files_skipped_total = IntCounter::new(
		"coordinatord_files_skipped_total",
		"Files skipped for instability or already-claimed",
	)
	.expect("failed to create files_skipped_total metric");
	let archive_moves_total = IntCounter::new(
		"coordinatord_archive_moves_total",
		"Archive moves scheduled",
	)
	.expect("failed to create archive_moves_total metric");
	let runs_total = IntCounter::new("coordinatord_runs_total", "Run-trigger invocations")
		.expect("failed to create runs_total metric");
	let last_run_duration_seconds = Gauge::new(
		"coordinatord_last_run_duration_seconds",
		"Duration of the most recent run",
	)
	.expect("failed to create last_run_duration_seconds metric");

	registry
		.register(Box::new(files_processed_total.clone()))
		.expect("failed to register files_processed_total metric");
	registry
		.register(Box::new(files_success_total.clone()))
		.expect("failed to register files_success_total metric");
	registry
		.register(Box::new(files_failed_total.clone()))
		.expect("failed to register files_failed_total metric");
	registry
		.register(Box::new(files_skipped_total.clone()))
		.expect("failed to register files_skipped_total metric");
	registry
		.register(Box::new(archive_moves_total.clone()))
		.expect("failed to register archive_moves_total metric");
	registry
		.register(Box::new(runs_total.clone()))
		.expect("failed to register runs_total metric");
	registry
		.register(Box::new(last_run_duration_seconds.clone()))
		.expect("failed to register last_run_duration_seconds metric");

	REGISTRY.set(registry).expect("metrics already initialized");
	FILES_PROCESSED_TOTAL
		.set(files_processed_total)
		.expect("metrics already initialized");
	FILES_SUCCESS_TOTAL
		.set(files_success_total)
		.expect("metrics already initialized");
	FILES_FAILED_TOTAL
		.set(files_failed_total)
		.expect("metrics already initialized");
	FILES_SKIPPED_TOTAL
		.set(files_skipped_total)
		.expect("metrics already initialized");
	ARCHIVE_MOVES_TOTAL
		.set(archive_moves_total)
		.expect("metrics already initialized");
	RUNS_TOTAL.set(runs_total).expect("metrics already initialized");
	LAST_RUN_DURATION_SECONDS
		.set(last_run_duration_seconds)
		.expect("metrics already initialized");
}

pub fn inc_files_processed() {
	if let Some(metric) = FILES_PROCESSED_TOTAL.get() {
		metric.inc();
	}
}

pub fn inc_files_success() {
	if let Some(metric) = FILES_SUCCESS_TOTAL.get() {
		metric.inc();
	}
}

pub fn inc_files_failed() {
	if let Some(metric) = FILES_FAILED_TOTAL.get() {
		metric.inc();
	}
}

pub fn inc_files_skipped() {
	if let Some(metric) = FILES_SKIPPED_TOTAL.get() {
		metric.inc();
	}
}

pub fn inc_archive_moves() {
	if let Some(metric) = ARCHIVE_MOVES_TOTAL.get() {
		metric.inc();
	}
}

pub fn inc_runs() {
	if let Some(metric) = RUNS_TOTAL.get() {
		metric.inc();
	}
}

pub fn set_last_run_duration(seconds: f64) {
	if let Some(metric) = LAST_RUN_DURATION_SECONDS.get() {
		metric.set(seconds);
	}
}

pub fn gather_metrics() -> Result<String> {
	let registry = REGISTRY
		.get()
		.ok_or_else(|| miette::miette!("metrics not initialized"))?;
	let metric_families = registry.gather();
	let encoder = TextEncoder::new();
	let mut buffer = Vec::new();
	encoder.encode(&metric_families, &mut buffer).into_diagnostic()?;
	String::from_utf8(buffer).into_diagnostic()
}
