//! Everything prepared for one run that plots and statistics are
//! computed from.

use std::collections::BTreeMap;

use crate::error::DataError;
use crate::phase::Marker;
use crate::sensor::{SensorDescriptor, SensorKind};
use crate::series::Series;

#[derive(Debug, Clone)]
pub struct SensorData {
    pub descriptor: SensorDescriptor,
    pub series: Series,
}

#[derive(Debug, Clone, Default)]
pub struct Datasets {
    /// In the order the sensors were listed.
    sensors: Vec<SensorData>,
    /// Benchmark-derived series (bandwidth, trace categories).
    bench: BTreeMap<String, Series>,
    pub markers: Option<Vec<Marker>>,
}

impl Datasets {
    pub fn add_sensor(&mut self, descriptor: SensorDescriptor, series: Series) {
        self.sensors.push(SensorData { descriptor, series });
    }

    pub fn add_bench(&mut self, name: &str, series: Series) {
        self.bench.insert(name.into(), series);
    }

    pub fn bench_names(&self) -> impl Iterator<Item = &str> {
        self.bench.keys().map(String::as_str)
    }

    pub fn sensor(&self, identity: &str) -> Result<&Series, DataError> {
        self.sensors
            .iter()
            .find(|s| s.descriptor.identity() == identity)
            .map(|s| &s.series)
            .ok_or_else(|| DataError::MissingDataset {
                kind: "sensor",
                name: identity.into(),
            })
    }

    pub fn bench(&self, name: &str) -> Result<&Series, DataError> {
        self.bench.get(name).ok_or_else(|| DataError::MissingDataset {
            kind: "benchmark-data",
            name: name.into(),
        })
    }

    /// The first sensor of that kind, if any.
    pub fn sensor_of_kind(&self, kind: &SensorKind) -> Option<&Series> {
        self.sensors
            .iter()
            .find(|s| &s.descriptor.kind == kind)
            .map(|s| &s.series)
    }

    /// End of the run in seconds: the span of the primary power
    /// series, which is never filtered, or of the longest sensor
    /// series without it.
    pub fn run_end(&self) -> f64 {
        let ticks = match self.sensor_of_kind(&SensorKind::PrimaryPower) {
            Some(series) => series.len(),
            None => self.sensors.iter().map(|s| s.series.len()).max().unwrap_or(0),
        };
        crate::times::tick_to_seconds(ticks as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Column;

    #[test]
    fn t_lookup() {
        let mut datasets = Datasets::default();
        let series = Series::new(vec![0., 0.001], vec![Column::new("Total", vec![1., 2.])]);
        datasets.add_sensor(SensorDescriptor::new("powersensor3.csv"), series.clone());
        datasets.add_bench("bw", series.clone());

        assert_eq!(datasets.sensor("powersensor3.csv"), Ok(&series));
        assert_eq!(datasets.bench("bw"), Ok(&series));
        assert_eq!(
            datasets.sensor("rapl.csv"),
            Err(DataError::MissingDataset {
                kind: "sensor",
                name: "rapl.csv".into()
            })
        );
        assert!(datasets.sensor_of_kind(&SensorKind::PrimaryPower).is_some());
        assert_eq!(datasets.run_end(), 0.002);
    }
}
