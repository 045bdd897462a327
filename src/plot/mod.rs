//! Declarative plots: which dataset fields are drawn against which,
//! resolved against the prepared datasets of a run into concrete
//! lines ready for a renderer.

pub mod axis;
pub mod render;
pub mod spec;

use serde::{Deserialize, Serialize};

use crate::align::Window;
use crate::dataset::Datasets;
use crate::error::{ConfigurationError, DataError};
use crate::phase::Marker;

use self::axis::{Axis, AxisDoc};

/// Colourblind-safe palette, used in sequence: primary lines, then
/// marker lines, then secondary lines.
pub const PALETTE: [&str; 10] = [
    "#0173b2", "#de8f05", "#029e73", "#d55e00", "#cc78bc", "#ca9161", "#fbafe4", "#949494",
    "#ece133", "#56b4e9",
];

/// What axis resolution needs to know about the run.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'t> {
    pub datasets: &'t Datasets,
    /// Seconds added to `time` fields.
    pub time_offset: f64,
    pub window: Window,
}

/// A plot as written in a spec document.
#[derive(Debug, Clone, Deserialize)]
pub struct PlotDoc {
    pub time: AxisDoc,
    #[serde(default)]
    pub x_axis: Option<AxisDoc>,
    #[serde(default)]
    pub y_axis: Vec<AxisDoc>,
    #[serde(default)]
    pub secondary_y_axis: Vec<AxisDoc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub dir: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub time: Axis,
    /// Replaces `time` as the x values of the primary lines.
    pub x_axis: Option<Axis>,
    pub y_axis: Vec<Axis>,
    /// Drawn on a twin scale against their own dataset's time.
    pub secondary_y_axis: Vec<Axis>,
    pub title: String,
    pub file_name: String,
    pub dir: String,
}

impl TryFrom<PlotDoc> for Plot {
    type Error = ConfigurationError;

    fn try_from(doc: PlotDoc) -> Result<Self, Self::Error> {
        let axes = |docs: Vec<AxisDoc>| -> Result<Vec<Axis>, ConfigurationError> {
            docs.into_iter().map(Axis::try_from).collect()
        };
        if doc.y_axis.is_empty() {
            return Err(ConfigurationError::EmptyYAxis {
                plot: doc.file_name,
            });
        }
        Ok(Plot {
            time: doc.time.try_into()?,
            x_axis: doc.x_axis.map(Axis::try_from).transpose()?,
            y_axis: axes(doc.y_axis)?,
            secondary_y_axis: axes(doc.secondary_y_axis)?,
            title: doc.title,
            file_name: doc.file_name,
            dir: doc.dir,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub label: String,
    pub color: &'static str,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// A vertical reference line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerLine {
    pub label: String,
    pub color: &'static str,
    /// Seconds.
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPlot {
    pub title: String,
    pub width: u32,
    pub x_label: String,
    pub y_label: Option<String>,
    pub secondary_y_label: Option<String>,
    pub lines: Vec<Line>,
    pub markers: Vec<MarkerLine>,
    pub secondary_lines: Vec<Line>,
    /// Only plots with more than one line get a legend.
    pub legend: bool,
}

struct Colors(usize);

impl Colors {
    fn next(&mut self) -> &'static str {
        let color = PALETTE[self.0 % PALETTE.len()];
        self.0 += 1;
        color
    }
}

fn line(label: &str, color: &'static str, x: Vec<f64>, y: Vec<f64>) -> Result<Line, DataError> {
    if x.len() != y.len() {
        return Err(DataError::LengthMismatch {
            label: label.into(),
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    Ok(Line {
        label: label.into(),
        color,
        x,
        y,
    })
}

/// The markers that fall into the rendered window, at their position
/// relative to the window start.
pub fn visible_markers<'m>(markers: &'m [Marker], window: &Window) -> impl Iterator<Item = (&'m Marker, f64)> {
    let window = *window;
    markers.iter().filter_map(move |m| {
        let relative = m.time - window.offset as i64;
        let before_trim = !window.is_active() || window.trim.map_or(true, |trim| m.time < trim as i64);
        (relative >= 0 && before_trim).then(|| (m, m.series_time(window.offset)))
    })
}

impl Plot {
    pub fn resolve(&self, ctx: &ResolveContext, width: u32) -> Result<ResolvedPlot, DataError> {
        let mut colors = Colors(0);

        let x = match &self.x_axis {
            Some(x_axis) => x_axis.resolve(ctx)?,
            None => self.time.resolve(ctx)?,
        };
        let lines = self
            .y_axis
            .iter()
            .map(|axis| line(&axis.plot_label, colors.next(), x.clone(), axis.resolve(ctx)?))
            .collect::<Result<Vec<_>, _>>()?;

        let markers: Vec<MarkerLine> = match &ctx.datasets.markers {
            Some(markers) => visible_markers(markers, &ctx.window)
                .map(|(m, position)| MarkerLine {
                    label: m.name.clone(),
                    color: colors.next(),
                    position,
                })
                .collect(),
            None => Vec::new(),
        };

        let secondary_lines = self
            .secondary_y_axis
            .iter()
            .map(|axis| {
                let x = axis.as_time().resolve(ctx)?;
                line(&axis.plot_label, colors.next(), x, axis.resolve(ctx)?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedPlot {
            title: self.title.clone(),
            width,
            x_label: self
                .x_axis
                .as_ref()
                .unwrap_or(&self.time)
                .axis_label
                .clone(),
            y_label: self.y_axis.first().map(|a| a.axis_label.clone()),
            secondary_y_label: self.secondary_y_axis.first().map(|a| a.axis_label.clone()),
            legend: lines.len() + secondary_lines.len() > 1,
            lines,
            markers,
            secondary_lines,
        })
    }
}
