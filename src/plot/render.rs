//! Output of resolved plots. Drawing images is left to an external
//! backend; `PlotDataRenderer` hands it the resolved plot as JSON.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config_file::save_json_file;
use crate::plot::{Plot, ResolvedPlot};

pub trait PlotRenderer {
    /// Write the artifact for `plot` below `plot_dir`, return its
    /// path.
    fn render(&self, plot_dir: &Path, plot: &Plot, resolved: &ResolvedPlot) -> Result<PathBuf>;
}

/// Writes `<plot_dir>/<dir>/<file_name>.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotDataRenderer;

impl PlotRenderer for PlotDataRenderer {
    fn render(&self, plot_dir: &Path, plot: &Plot, resolved: &ResolvedPlot) -> Result<PathBuf> {
        let path = plot_dir
            .join(&plot.dir)
            .join(format!("{}.json", plot.file_name));
        save_json_file(&path, resolved)?;
        Ok(path)
    }
}
