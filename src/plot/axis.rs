use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigurationError, DataError};
use crate::plot::ResolveContext;
use crate::series::{Series, TIME};

/// Where an axis takes its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    /// A prepared sensor series, by sensor identity.
    Sensor,
    /// A series derived from benchmark output (bandwidth log, trace
    /// categories), by dataset name.
    BenchmarkData,
}

impl FromStr for AxisKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensor" => Ok(AxisKind::Sensor),
            "benchmark-data" | "bench" => Ok(AxisKind::BenchmarkData),
            _ => Err(ConfigurationError::UnknownAxisKind(s.into())),
        }
    }
}

/// An axis as written in a spec document.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisDoc {
    pub axis_type: String,
    pub dataset_name: String,
    pub dataset_field: String,
    #[serde(default)]
    pub plot_label: String,
    #[serde(default)]
    pub axis_label: String,
    #[serde(default)]
    pub skip_offset: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub kind: AxisKind,
    pub dataset: String,
    pub field: String,
    /// Legend entry of the line.
    pub plot_label: String,
    pub axis_label: String,
    /// Never shift this axis by the run's time offset.
    pub skip_offset: bool,
}

impl TryFrom<AxisDoc> for Axis {
    type Error = ConfigurationError;

    fn try_from(doc: AxisDoc) -> Result<Self, Self::Error> {
        let AxisDoc {
            axis_type,
            dataset_name,
            dataset_field,
            plot_label,
            axis_label,
            skip_offset,
        } = doc;
        Ok(Axis {
            kind: axis_type.parse()?,
            dataset: dataset_name,
            field: dataset_field,
            plot_label,
            axis_label,
            skip_offset,
        })
    }
}

impl Axis {
    /// The time field of the same dataset, exempt from the offset.
    pub fn as_time(&self) -> Axis {
        Axis {
            field: TIME.into(),
            skip_offset: true,
            ..self.clone()
        }
    }

    fn dataset<'d>(&self, ctx: &ResolveContext<'d>) -> Result<&'d Series, DataError> {
        match self.kind {
            AxisKind::Sensor => ctx.datasets.sensor(&self.dataset),
            AxisKind::BenchmarkData => ctx.datasets.bench(&self.dataset),
        }
    }

    /// The values of the field. `time` fields are shifted by the
    /// run's time offset unless the axis is exempt.
    pub fn resolve(&self, ctx: &ResolveContext) -> Result<Vec<f64>, DataError> {
        let series = self.dataset(ctx)?;
        let values = series
            .field(&self.field)
            .ok_or_else(|| DataError::MissingField {
                dataset: self.dataset.clone(),
                field: self.field.clone(),
            })?;
        if self.field == TIME && !self.skip_offset && ctx.time_offset != 0. {
            Ok(values.iter().map(|t| t + ctx.time_offset).collect())
        } else {
            Ok(values.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::Window;
    use crate::dataset::Datasets;
    use crate::sensor::SensorDescriptor;
    use crate::series::Column;

    fn axis(kind: &str, dataset: &str, field: &str) -> Result<Axis, ConfigurationError> {
        Axis::try_from(AxisDoc {
            axis_type: kind.into(),
            dataset_name: dataset.into(),
            dataset_field: field.into(),
            plot_label: "label".into(),
            axis_label: "axis".into(),
            skip_offset: false,
        })
    }

    fn datasets() -> Datasets {
        let mut datasets = Datasets::default();
        datasets.add_sensor(
            SensorDescriptor::new("powersensor3.csv"),
            Series::new(vec![0., 0.5, 1.], vec![Column::new("Total", vec![4., 5., 6.])]),
        );
        datasets.add_bench(
            "bw",
            Series::new(vec![0., 1.], vec![Column::new("bw", vec![100., 200.])]),
        );
        datasets
    }

    #[test]
    fn t_axis_kind() {
        assert_eq!("sensor".parse(), Ok(AxisKind::Sensor));
        assert_eq!("bench".parse(), Ok(AxisKind::BenchmarkData));
        assert_eq!(
            axis("table", "x", "y"),
            Err(ConfigurationError::UnknownAxisKind("table".into()))
        );
    }

    #[test]
    fn t_time_offset_only_applies_to_time() -> anyhow::Result<()> {
        let datasets = datasets();
        let ctx = ResolveContext {
            datasets: &datasets,
            time_offset: 10.,
            window: Window::default(),
        };
        let time = axis("sensor", "powersensor3.csv", "time")?;
        assert_eq!(time.resolve(&ctx)?, [10., 10.5, 11.]);
        assert_eq!(time.as_time().resolve(&ctx)?, [0., 0.5, 1.]);
        let power = axis("sensor", "powersensor3.csv", "Total")?;
        assert_eq!(power.resolve(&ctx)?, [4., 5., 6.]);
        let bw = axis("benchmark-data", "bw", "bw")?;
        assert_eq!(bw.resolve(&ctx)?, [100., 200.]);
        let bw_time = axis("benchmark-data", "bw", "time")?;
        assert_eq!(bw_time.resolve(&ctx)?, [10., 11.]);
        Ok(())
    }

    #[test]
    fn t_missing_data() -> anyhow::Result<()> {
        let datasets = datasets();
        let ctx = ResolveContext {
            datasets: &datasets,
            time_offset: 0.,
            window: Window::default(),
        };
        assert_eq!(
            axis("sensor", "powersensor3.csv", "Nope")?.resolve(&ctx),
            Err(DataError::MissingField {
                dataset: "powersensor3.csv".into(),
                field: "Nope".into()
            })
        );
        assert_eq!(
            axis("sensor", "rapl.csv", "Total")?.resolve(&ctx),
            Err(DataError::MissingDataset {
                kind: "sensor",
                name: "rapl.csv".into()
            })
        );
        Ok(())
    }
}
