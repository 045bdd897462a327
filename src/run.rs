//! Evaluation of one run: read the results directory, prepare all
//! datasets, render the plots of the spec and write the statistics
//! document.

use anyhow::{anyhow, Context, Result};

use crate::align::{align, require_non_empty, FillPolicy, Window};
use crate::bench_data::{fio_bandwidth, read_fio_time_offset, BW_DATASET, MARKERS_FILE};
use crate::config_file::save_json_file;
use crate::csv_input::{read_markers_csv, read_sensor_csv, read_trace_csv};
use crate::dataset::Datasets;
use crate::phase::{segment, BenchType};
use crate::plot::render::PlotRenderer;
use crate::plot::spec::Spec;
use crate::plot::ResolveContext;
use crate::run_config::RunConfig;
use crate::sensor::SensorKind;
use crate::stats::{StatsAggregator, StatsDocument};
use crate::trace::{trace_datasets, TraceOffsetCorrector};

/// The window of the run. The end is derived from the length of the
/// primary power series before windowing; without a primary power
/// sensor the run is only cut at the start.
pub fn run_window(spec: &Spec) -> Result<Window> {
    let Some(primary) = spec.primary_sensor() else {
        return Ok(Window::new(spec.offset, None));
    };
    let raw = read_sensor_csv(&spec.results_dir.join(primary.identity()))?;
    let rows = align(&raw, &Window::default(), FillPolicy::CarryForward)
        .with_context(|| anyhow!("aligning primary power sensor {}", primary.identity()))?
        .len();
    Ok(spec.window(rows))
}

/// All datasets of the run plus the offset in seconds that benchmark
/// time lags behind the window.
pub fn load_datasets(spec: &Spec, window: &Window, config: &RunConfig) -> Result<(Datasets, f64)> {
    let mut datasets = Datasets::default();
    for descriptor in &spec.sensors {
        let series = descriptor.load(&spec.results_dir, window, config)?;
        if descriptor.kind == SensorKind::PrimaryPower {
            require_non_empty(&series, window)
                .with_context(|| anyhow!("primary power sensor {}", descriptor.identity()))?;
        }
        datasets.add_sensor(descriptor.clone(), series);
    }

    datasets.markers = read_markers_csv(&spec.results_dir.join(MARKERS_FILE))?;
    if datasets.markers.is_none() {
        log::info!("run {}: no markers, evaluating as a whole", spec.name);
    }

    let mut time_offset = 0.;
    if spec.bench_type == BenchType::Fio {
        time_offset = read_fio_time_offset(&spec.results_dir, window.offset)?;
        if let Some(bw) = fio_bandwidth(&spec.results_dir, window)? {
            datasets.add_bench(BW_DATASET, bw);
        }
    }

    match read_trace_csv(&spec.trace_path())? {
        Some(records) => {
            let corrector = TraceOffsetCorrector::for_run(spec.trace_clock, &spec.results_dir)?;
            log::debug!(
                "run {}: trace clock in {}, correction {} ticks",
                spec.name,
                spec.trace_clock.unit_short(),
                corrector.correction
            );
            for (category, series) in trace_datasets(&records, &corrector, window)? {
                log::debug!(
                    "run {}: {} with {} ticks",
                    spec.name,
                    category.dataset_name(),
                    series.len()
                );
                datasets.add_bench(category.dataset_name(), series);
            }
        }
        None => log::info!("run {}: no trace at {:?}", spec.name, spec.trace_path()),
    }

    Ok((datasets, time_offset))
}

/// Evaluate the run described by `spec`, handing every plot to
/// `renderer`. Returns the statistics, which are also written to
/// `spec.stats_path()`.
pub fn process_run(spec: &Spec, renderer: &dyn PlotRenderer) -> Result<StatsDocument> {
    let config = RunConfig::load(spec.config_yaml.as_deref(), spec.info_json.as_deref())?;
    if config.cpu_topology.is_empty() {
        log::info!("run {}: no CPU topology, skipping per-domain statistics", spec.name);
    }
    let window = run_window(spec)?;
    log::info!("run {}: window {window:?}", spec.name);
    let (datasets, time_offset) = load_datasets(spec, &window, &config)?;

    let ctx = ResolveContext {
        datasets: &datasets,
        time_offset,
        window,
    };
    for plot in &spec.plots {
        let resolved = plot
            .resolve(&ctx, spec.width)
            .with_context(|| anyhow!("resolving plot {:?}", plot.file_name))?;
        let path = renderer.render(&spec.plot_dir, plot, &resolved)?;
        log::info!("run {}: wrote {path:?}", spec.name);
    }

    let phases = segment(&spec.bench_type, datasets.markers.as_deref(), spec.offset)?;
    let stats = StatsAggregator::new(&datasets, &config).aggregate(&phases);
    let stats_path = spec.stats_path();
    save_json_file(&stats_path, &stats)?;
    log::info!("run {}: wrote {stats_path:?}", spec.name);
    Ok(stats)
}
