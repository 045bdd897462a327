//! Per-phase statistics of a run: mean power and energy of the power
//! sensors, CPU frequency and load per NUMA domain, disk throughput
//! while active, and SSD power correlated with disk activity.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dataset::Datasets;
use crate::phase::Phase;
use crate::run_config::RunConfig;
use crate::sensor::{domain_freq_column, domain_load_column, SensorKind, POWER_COLUMN};
use crate::series::Series;
use crate::times::seconds_to_tick;

/// Mean of the non-NaN values, `None` if there are none.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0., 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Largest non-NaN value.
pub fn max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(f64::max)
}

/// Trapezoidal integral of `power` (W) over `time` (s), in J. Pairs
/// involving a missing value contribute nothing.
pub fn energy(time: &[f64], power: &[f64]) -> f64 {
    time.windows(2)
        .zip(power.windows(2))
        .map(|(t, p)| (p[0] + p[1]) / 2. * (t[1] - t[0]))
        .filter(|e| e.is_finite())
        .sum()
}

/// Mean over the samples above zero, 0 if the disk was idle
/// throughout.
pub fn active_mean(values: &[f64]) -> f64 {
    let active: Vec<f64> = values.iter().copied().filter(|v| *v > 0.).collect();
    mean(&active).unwrap_or(0.)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SsdStats {
    pub power: Option<f64>,
    pub energy: f64,
    /// Mean power on ticks with disk reads or writes.
    pub io_power: Option<f64>,
    /// Mean power above the idle threshold, over the whole run.
    pub above_idle: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub power: Option<f64>,
    pub energy: Option<f64>,
    /// `average_freq_node<d>` (maximum) and `average_load_node<d>`
    /// (mean).
    #[serde(flatten)]
    pub domains: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    /// MiB per tick, over active ticks only.
    pub read: f64,
    pub write: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssd: Option<SsdStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diskstat: Option<DiskStats>,
}

/// Keyed by phase name, plus the `times` entry with the duration of
/// every phase in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    #[serde(flatten)]
    pub phases: BTreeMap<String, PhaseStats>,
    pub times: BTreeMap<String, f64>,
}

pub struct StatsAggregator<'t> {
    datasets: &'t Datasets,
    config: &'t RunConfig,
}

fn slice<'s>(series: &'s Series, column: &str, phase: &Phase) -> Option<(&'s [f64], &'s [f64])> {
    let rows = phase.rows(series);
    let values = series.column(column)?;
    Some((&series.time()[rows.clone()], &values[rows]))
}

impl<'t> StatsAggregator<'t> {
    pub fn new(datasets: &'t Datasets, config: &'t RunConfig) -> Self {
        Self { datasets, config }
    }

    pub fn aggregate(&self, phases: &[Phase]) -> StatsDocument {
        let run_end = self.datasets.run_end();
        let above_idle = self.above_idle();
        let mut document = StatsDocument::default();
        for phase in phases {
            let stats = PhaseStats {
                ssd: self.ssd(phase, above_idle),
                cpu: self.cpu(phase),
                diskstat: self.diskstat(phase),
            };
            document.phases.insert(phase.name.into(), stats);
            document
                .times
                .insert(phase.name.into(), phase.duration(run_end));
        }
        document
    }

    fn primary(&self) -> Option<&'t Series> {
        self.datasets.sensor_of_kind(&SensorKind::PrimaryPower)
    }

    fn above_idle(&self) -> Option<f64> {
        let power = self.primary()?.column(POWER_COLUMN)?;
        let busy: Vec<f64> = power
            .iter()
            .copied()
            .filter(|p| *p > self.config.ssd_idle_watts)
            .collect();
        mean(&busy)
    }

    fn ssd(&self, phase: &Phase, above_idle: Option<f64>) -> Option<SsdStats> {
        let (time, power) = slice(self.primary()?, POWER_COLUMN, phase)?;
        Some(SsdStats {
            power: mean(power),
            energy: energy(time, power),
            io_power: self.io_power(phase),
            above_idle,
        })
    }

    /// SSD power restricted to the ticks of the phase on which the
    /// disk read or wrote anything.
    fn io_power(&self, phase: &Phase) -> Option<f64> {
        let disk = self.datasets.sensor_of_kind(&SensorKind::DiskStat)?;
        let (time, read) = slice(disk, "read", phase)?;
        let (_, write) = slice(disk, "write", phase)?;
        let active: HashSet<i64> = time
            .iter()
            .zip(read.iter().zip(write))
            .filter(|(_, (r, w))| **r > 0. || **w > 0.)
            .map(|(t, _)| seconds_to_tick(*t))
            .collect();
        let primary = self.primary()?;
        let power = primary.column(POWER_COLUMN)?;
        let during_io: Vec<f64> = primary
            .time()
            .iter()
            .zip(power)
            .filter(|(t, _)| active.contains(&seconds_to_tick(**t)))
            .map(|(_, p)| *p)
            .collect();
        mean(&during_io)
    }

    fn cpu(&self, phase: &Phase) -> Option<CpuStats> {
        let rapl = self
            .datasets
            .sensor_of_kind(&SensorKind::SecondaryPower)
            .and_then(|series| slice(series, POWER_COLUMN, phase));
        let topology = self.datasets.sensor_of_kind(&SensorKind::CpuTopology);
        if rapl.is_none() && topology.is_none() {
            return None;
        }
        let mut stats = CpuStats {
            power: rapl.and_then(|(_, power)| mean(power)),
            energy: rapl.map(|(time, power)| energy(time, power)),
            domains: BTreeMap::new(),
        };
        if let Some(series) = topology {
            let rows = phase.rows(series);
            for domain in self.config.cpu_topology.domain_ids() {
                let freq = domain_freq_column(domain);
                let value = series.column(&freq).and_then(|c| max(&c[rows.clone()]));
                stats.domains.insert(freq, value);
                let load = domain_load_column(domain);
                let value = series.column(&load).and_then(|c| mean(&c[rows.clone()]));
                stats.domains.insert(load, value);
            }
        }
        Some(stats)
    }

    fn diskstat(&self, phase: &Phase) -> Option<DiskStats> {
        let disk = self.datasets.sensor_of_kind(&SensorKind::DiskStat)?;
        let rows = phase.rows(disk);
        let of = |name: &str| {
            disk.column(name)
                .map(|c| active_mean(&c[rows.clone()]))
                .unwrap_or(0.)
        };
        Some(DiskStats {
            read: of("read"),
            write: of("write"),
        })
    }
}
