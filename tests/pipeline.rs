use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;
use approx::assert_abs_diff_eq;
use energy_bench_evaluator::batch::run_batch;
use energy_bench_evaluator::plot::render::{PlotDataRenderer, PlotRenderer};
use energy_bench_evaluator::plot::{Plot, ResolvedPlot};
use energy_bench_evaluator::plot::spec::{Spec, SpecOverrides};
use energy_bench_evaluator::run::{load_datasets, process_run, run_window};
use energy_bench_evaluator::run_config::RunConfig;
use serde_json::{json, Value};

fn constant_power_csv(ticks: i64, watts: f64) -> String {
    let mut s = String::from("time,Total\n");
    for t in 0..ticks {
        writeln!(s, "{t},{watts}").expect("write to String");
    }
    s
}

fn write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

fn power_plot() -> Value {
    json!({
        "time": {"axis_type": "sensor", "dataset_name": "powersensor3.csv",
                 "dataset_field": "time", "axis_label": "Time (s)"},
        "y_axis": [{"axis_type": "sensor", "dataset_name": "powersensor3.csv",
                    "dataset_field": "Total", "plot_label": "SSD", "axis_label": "Power (W)"}],
        "title": "SSD power",
        "file_name": "ssd-power",
        "dir": "time"
    })
}

struct Run {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Run {
    fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().to_path_buf();
        write(&root.join("results/powersensor3.csv"), &constant_power_csv(1000, 5.))?;
        Ok(Run { _dir: dir, root })
    }

    fn results(&self) -> PathBuf {
        self.root.join("results")
    }

    fn plots(&self) -> PathBuf {
        self.root.join("plots")
    }

    fn spec_doc(&self, name: &str, bench_type: &str) -> Value {
        json!({
            "plot_dir": self.plots(),
            "results_dir": self.results(),
            "name": name,
            "bench_type": bench_type,
            "sensors": ["powersensor3.csv"],
            "plots": [power_plot()]
        })
    }

    fn write_spec(&self, doc: &Value) -> Result<PathBuf> {
        let path = self.root.join(format!("{}.json", doc["name"].as_str().unwrap_or("spec")));
        write(&path, &serde_json::to_string(doc)?)?;
        Ok(path)
    }

    fn spec(&self, doc: &Value) -> Result<Spec> {
        Spec::load(Some(&self.write_spec(doc)?), SpecOverrides::default())
    }
}

#[test]
fn t_filebench_phases() -> Result<()> {
    let run = Run::new()?;
    write(
        &run.results().join("markers.csv"),
        "time,marker_name\n300,fileset-done\n700,benchmark-done\n",
    )?;
    let spec = run.spec(&run.spec_doc("fb", "filebench"))?;
    let stats = process_run(&spec, &PlotDataRenderer)?;

    let names: Vec<_> = stats.phases.keys().map(String::as_str).collect();
    assert_eq!(names, ["benchmark", "fileset", "post_benchmark", "total"]);
    for phase in stats.phases.values() {
        let ssd = phase.ssd.as_ref().expect("ssd stats");
        assert_abs_diff_eq!(ssd.power.expect("power"), 5., epsilon = 1e-9);
    }
    let total = stats.phases["total"].ssd.as_ref().expect("ssd stats");
    // Trapezoid over the sample span, one tick short of the run.
    assert_abs_diff_eq!(total.energy, 5., epsilon = 5. * 0.001 + 1e-9);
    assert_abs_diff_eq!(stats.times["fileset"], 0.3, epsilon = 1e-9);
    assert_abs_diff_eq!(stats.times["benchmark"], 0.4, epsilon = 1e-9);
    assert_abs_diff_eq!(stats.times["post_benchmark"], 0.3, epsilon = 1e-9);
    assert_abs_diff_eq!(stats.times["total"], 1., epsilon = 1e-9);

    let written: Value = serde_json::from_str(&std::fs::read_to_string(spec.stats_path())?)?;
    assert!(written["benchmark"]["ssd"]["power"].is_number());
    assert!(written["times"]["total"].is_number());
    assert!(run.plots().join("time/ssd-power.json").exists());
    Ok(())
}

#[test]
fn t_too_few_markers_fall_back_to_total() -> Result<()> {
    let run = Run::new()?;
    write(&run.results().join("markers.csv"), "time,marker_name\n300,fileset-done\n")?;
    let spec = run.spec(&run.spec_doc("fb-short", "filebench"))?;
    let stats = process_run(&spec, &PlotDataRenderer)?;
    assert_eq!(stats.phases.keys().collect::<Vec<_>>(), ["total"]);
    Ok(())
}

#[test]
fn t_trace_rebased_with_sidecar() -> Result<()> {
    let run = Run::new()?;
    write(&run.results().join("trace_offset"), "50\n")?;
    write(
        &run.plots().join("plot_data/traced.csv"),
        "function,time,count,is_nvme_call,has_fs_pagewrite,requeued_io,vfs_read,vfs_write,vfs_fsync\n\
         read+76,2000000,2,true,false,false,true,false,false\n\
         read+76,2100000,1,true,false,false,true,false,false\n",
    )?;
    let spec = run.spec(&run.spec_doc("traced", "cmd"))?;
    let window = run_window(&spec)?;
    let (datasets, time_offset) = load_datasets(&spec, &window, &RunConfig::default())?;
    assert_eq!(time_offset, 0.);
    assert_eq!(datasets.bench_names().collect::<Vec<_>>(), ["trace-read"]);

    let read = datasets.bench("trace-read")?;
    let count = read.column("count").expect("count field");
    let first = count.iter().position(|c| *c > 0.).expect("an event");
    assert_abs_diff_eq!(read.time()[first], 0.05, epsilon = 1e-12);
    assert_eq!(count[first], 2.);
    assert_eq!(count[150], 1.);
    Ok(())
}

#[test]
fn t_fio_time_offset_only_shifts_time() -> Result<()> {
    let run = Run::new()?;
    write(
        &run.results().join("results.json"),
        r#"{"jobs": [{"job options": {"ramp_time": "1s"}}]}"#,
    )?;
    let mut doc = run.spec_doc("fio", "fio");
    doc["plots"][0]["x_axis"] = json!({"axis_type": "sensor", "dataset_name": "powersensor3.csv",
                                       "dataset_field": "Total", "axis_label": "Power (W)"});
    doc["plots"].as_array_mut().expect("plots").push(power_plot());
    doc["plots"][1]["file_name"] = json!("shifted");
    let spec = run.spec(&doc)?;
    process_run(&spec, &PlotDataRenderer)?;

    let read = |file: &str| -> Result<Value> {
        Ok(serde_json::from_str(&std::fs::read_to_string(
            run.plots().join("time").join(file),
        )?)?)
    };
    let unshifted = read("ssd-power.json")?;
    assert_eq!(unshifted["lines"][0]["x"][0], 5.);
    let shifted = read("shifted.json")?;
    assert_abs_diff_eq!(shifted["lines"][0]["x"][0].as_f64().expect("x"), 1., epsilon = 1e-12);
    assert_eq!(shifted["lines"][0]["y"][0], 5.);
    Ok(())
}

#[test]
fn t_window_cuts_run() -> Result<()> {
    let run = Run::new()?;
    let mut doc = run.spec_doc("windowed", "cmd");
    doc["offset"] = json!(100);
    doc["trim_end"] = json!(400);
    let spec = run.spec(&doc)?;
    let stats = process_run(&spec, &PlotDataRenderer)?;
    assert_abs_diff_eq!(stats.times["total"], 0.5, epsilon = 1e-9);
    Ok(())
}

#[test]
fn t_batch_isolates_failures() -> Result<()> {
    let run = Run::new()?;
    let good = run.write_spec(&run.spec_doc("good", "cmd"))?;
    let mut broken = run.spec_doc("broken", "cmd");
    broken["results_dir"] = json!(run.root.join("nowhere"));
    let broken = run.write_spec(&broken)?;
    let invalid = run.root.join("invalid.json");
    write(&invalid, r#"{"name": "invalid"}"#)?;

    let report = run_batch(&[good, broken, invalid.clone()], 2, &PlotDataRenderer)?;
    assert_eq!(report.successes.keys().collect::<Vec<_>>(), ["good"]);
    assert!(report.failures.contains_key("broken"));
    let invalid_error = &report.failures[&*invalid.to_string_lossy()];
    assert!(invalid_error.contains("plot_dir"), "{invalid_error}");
    Ok(())
}

#[test]
fn t_batch_reports_out_of_range_timestamps() -> Result<()> {
    let run = Run::new()?;
    let good = run.write_spec(&run.spec_doc("good", "cmd"))?;
    write(&run.root.join("far/powersensor3.csv"), "time,Total\n0,5\n1e19,5\n")?;
    let mut far = run.spec_doc("far", "cmd");
    far["results_dir"] = json!(run.root.join("far"));
    let far = run.write_spec(&far)?;

    let report = run_batch(&[good, far], 2, &PlotDataRenderer)?;
    assert_eq!(report.successes.keys().collect::<Vec<_>>(), ["good"]);
    assert!(report.failures["far"].contains("beyond"), "{}", report.failures["far"]);
    Ok(())
}

/// Renders like `PlotDataRenderer`, but panics on plots named
/// `explode`.
struct ExplodingRenderer;

impl PlotRenderer for ExplodingRenderer {
    fn render(&self, plot_dir: &Path, plot: &Plot, resolved: &ResolvedPlot) -> Result<PathBuf> {
        if plot.file_name == "explode" {
            panic!("renderer exploded");
        }
        PlotDataRenderer.render(plot_dir, plot, resolved)
    }
}

#[test]
fn t_batch_isolates_panics() -> Result<()> {
    let run = Run::new()?;
    let good = run.write_spec(&run.spec_doc("good", "cmd"))?;
    let mut exploding = run.spec_doc("exploding", "cmd");
    exploding["plots"][0]["file_name"] = json!("explode");
    let exploding = run.write_spec(&exploding)?;

    let report = run_batch(&[good, exploding], 2, &ExplodingRenderer)?;
    assert_eq!(report.successes.keys().collect::<Vec<_>>(), ["good"]);
    let error = &report.failures["exploding"];
    assert!(error.contains("renderer exploded"), "{error}");
    Ok(())
}

#[test]
fn t_batch_keys_shared_names_by_path() -> Result<()> {
    let run = Run::new()?;
    let mut paths = Vec::new();
    for copy in ["a", "b"] {
        let mut doc = run.spec_doc("twin", "cmd");
        doc["plot_dir"] = json!(run.root.join(copy));
        let path = run.root.join(format!("twin-{copy}.json"));
        write(&path, &serde_json::to_string(&doc)?)?;
        paths.push(path);
    }
    paths.push(run.write_spec(&run.spec_doc("single", "cmd"))?);

    let report = run_batch(&paths, 2, &PlotDataRenderer)?;
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    let mut expected: Vec<String> = paths[..2]
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    expected.push("single".into());
    expected.sort();
    assert_eq!(report.successes.keys().cloned().collect::<Vec<_>>(), expected);
    Ok(())
}
