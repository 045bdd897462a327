use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use energy_bench_evaluator::batch::run_batch;
use energy_bench_evaluator::config_file::save_json_file;
use energy_bench_evaluator::plot::render::PlotDataRenderer;
use energy_bench_evaluator::plot::spec::{Spec, SpecOverrides};
use energy_bench_evaluator::run::process_run;
use energy_bench_evaluator::utillib::logging::{init_logging, LogLevelOpt};

const PROGRAM_NAME: &str = "energy-bench-evaluator";
const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(clap::Parser, Debug)]
#[clap(next_line_help = true)]
struct Opts {
    #[clap(flatten)]
    log_level: LogLevelOpt,

    /// The subcommand to run. Use `--help` after the sub-command to
    /// get a list of the allowed options there.
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct OverrideOpts {
    /// Directory to write plots and the statistics document to
    #[clap(long)]
    plot_dir: Option<PathBuf>,

    /// Directory holding the sensor files of the run
    #[clap(long)]
    results_dir: Option<PathBuf>,

    /// Name of the run, used in output file names
    #[clap(long)]
    name: Option<String>,

    /// Benchmark type (filebench, ycsb, fio, ...), selects the phases
    #[clap(long)]
    bench_type: Option<String>,

    /// Benchmark configuration (YAML)
    #[clap(long)]
    config_yaml: Option<PathBuf>,

    /// Run info with the CPU topology (JSON)
    #[clap(long)]
    info_json: Option<PathBuf>,

    /// First tick (ms) to evaluate; 0 evaluates the whole run
    #[clap(long)]
    offset: Option<u64>,

    /// Ticks (ms) to cut from the end of the run
    #[clap(long)]
    trim_end: Option<u64>,

    /// Width of the plots
    #[clap(long)]
    width: Option<u32>,
}

impl From<OverrideOpts> for SpecOverrides {
    fn from(o: OverrideOpts) -> Self {
        SpecOverrides {
            plot_dir: o.plot_dir,
            results_dir: o.results_dir,
            name: o.name,
            bench_type: o.bench_type,
            config_yaml: o.config_yaml,
            info_json: o.info_json,
            offset: o.offset,
            trim_end: o.trim_end,
            width: o.width,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print version
    Version,

    /// Evaluate one run: write its plot data and statistics
    Plot {
        /// Spec document (JSON); options given here take precedence
        spec: Option<PathBuf>,

        #[clap(flatten)]
        overrides: OverrideOpts,
    },

    /// Evaluate many runs in parallel; failing runs are reported and
    /// do not stop the others
    Batch {
        /// Number of threads (0: one per CPU)
        #[clap(short, long, default_value = "0")]
        jobs: usize,

        /// Write the summary of all runs (JSON) to this path
        #[clap(long)]
        report: Option<PathBuf>,

        /// Spec documents (JSON), one per run
        #[clap(required = true)]
        specs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let Opts { log_level, command } = Opts::parse();
    init_logging(log_level.into());

    match command {
        Command::Version => println!("{PROGRAM_NAME} version {PROGRAM_VERSION}"),
        Command::Plot { spec, overrides } => {
            let spec = Spec::load(spec.as_deref(), overrides.into())?;
            let stats = process_run(&spec, &PlotDataRenderer)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Batch {
            jobs,
            report,
            specs,
        } => {
            let result = run_batch(&specs, jobs, &PlotDataRenderer)?;
            for (name, error) in &result.failures {
                eprintln!("{name}: {error}");
            }
            println!(
                "{} runs evaluated, {} failed",
                result.successes.len(),
                result.failures.len()
            );
            if let Some(report) = report {
                save_json_file(&report, &result)?;
            }
            if result.successes.is_empty() && !result.failures.is_empty() {
                bail!("all runs failed");
            }
        }
    }

    Ok(())
}
