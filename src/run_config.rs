//! Per-run settings from the benchmark configuration (YAML) and the
//! machine description recorded with the run (JSON).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::config_file::load_config_file;

pub const DEFAULT_CPU_MAX_POWER_WATTS: f64 = 300.;
pub const DEFAULT_SSD_IDLE_WATTS: f64 = 2.;

#[derive(Debug, Default, Deserialize)]
struct BenchConfigDoc {
    #[serde(default)]
    settings: SettingsDoc,
    #[serde(default)]
    extra: ExtraDoc,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsDoc {
    cpu_max_power_watts: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtraDoc {
    ssd_idle: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RunInfoDoc {
    #[serde(default)]
    cpu_topology: BTreeMap<u32, usize>,
}

/// NUMA domain id to the number of cores in it. Cores are numbered
/// consecutively through the domains in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuTopology {
    domains: BTreeMap<u32, usize>,
}

impl CpuTopology {
    pub fn new(domains: BTreeMap<u32, usize>) -> Self {
        Self { domains }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn domain_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.domains.keys().copied()
    }

    /// `(domain id, indices of its cores)`
    pub fn domains(&self) -> impl Iterator<Item = (u32, std::ops::Range<usize>)> + '_ {
        self.domains.iter().scan(0, |start, (id, cores)| {
            let range = *start..*start + cores;
            *start += cores;
            Some((*id, range))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Upper bound (exclusive) of plausible CPU power readings.
    pub cpu_max_power_watts: f64,
    /// SSD power at or below this is considered idle.
    pub ssd_idle_watts: f64,
    pub cpu_topology: CpuTopology,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cpu_max_power_watts: DEFAULT_CPU_MAX_POWER_WATTS,
            ssd_idle_watts: DEFAULT_SSD_IDLE_WATTS,
            cpu_topology: CpuTopology::default(),
        }
    }
}

impl RunConfig {
    /// Both documents are optional; what is absent keeps its default.
    pub fn load(config_yaml: Option<&Path>, info_json: Option<&Path>) -> Result<Self> {
        let config: BenchConfigDoc = match config_yaml {
            Some(path) => load_config_file(path)?,
            None => BenchConfigDoc::default(),
        };
        let info: RunInfoDoc = match info_json {
            Some(path) => load_config_file(path)?,
            None => RunInfoDoc::default(),
        };
        Ok(Self {
            cpu_max_power_watts: config
                .settings
                .cpu_max_power_watts
                .unwrap_or(DEFAULT_CPU_MAX_POWER_WATTS),
            ssd_idle_watts: config.extra.ssd_idle.unwrap_or(DEFAULT_SSD_IDLE_WATTS),
            cpu_topology: CpuTopology::new(info.cpu_topology),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_topology_core_ranges() {
        let topology = CpuTopology::new([(1, 4), (0, 2)].into_iter().collect());
        let domains: Vec<_> = topology.domains().collect();
        assert_eq!(domains, [(0, 0..2), (1, 2..6)]);
    }

    #[test]
    fn t_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let yaml = dir.path().join("config.yaml");
        std::fs::write(
            &yaml,
            "name: run\nsettings:\n  device: /dev/nvme0n1\n  cpu_max_power_watts: 250\nextra:\n  ssd_idle: 1.5\n",
        )?;
        let json = dir.path().join("info.json");
        std::fs::write(&json, r#"{"power_state": 0, "cpu_topology": {"0": 10, "1": 10}}"#)?;

        let config = RunConfig::load(Some(&yaml), Some(&json))?;
        assert_eq!(config.cpu_max_power_watts, 250.);
        assert_eq!(config.ssd_idle_watts, 1.5);
        assert_eq!(config.cpu_topology.domain_ids().collect::<Vec<_>>(), [0, 1]);

        assert_eq!(RunConfig::load(None, None)?, RunConfig::default());
        std::fs::write(&yaml, "name: run\n")?;
        assert_eq!(RunConfig::load(Some(&yaml), None)?.cpu_max_power_watts, 300.);
        Ok(())
    }
}
