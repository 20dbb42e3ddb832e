use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tempfile::NamedTempFile;

use crate::error::AppError;
use crate::plot::{GraphType, SeriesArtifact};

/// Configuration options for chart rendering
///
/// This structure contains the customizable properties for rendering a
/// series artifact into an image.
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Graph".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl ChartOptions {
    /// Options derived from a series artifact's own naming
    pub fn for_series(series: &SeriesArtifact) -> Self {
        Self {
            title: series.series_name.clone(),
            x_label: series.x_name.clone(),
            y_label: series.y_name.clone(),
            ..Self::default()
        }
    }
}

/// Chart rendering interface
///
/// Decouples the pipeline from how images are actually produced: the series
/// and its options go in, a temporary file holding the rendered image comes
/// out. The caller owns the temp file and decides whether it is read back
/// into memory and discarded, or moved into durable storage.
pub trait ChartRenderer: Send + Sync {
    /// Render one series into a temporary image file
    ///
    /// # Arguments
    /// * `series` - The series to render
    /// * `options` - Chart styling options
    ///
    /// # Returns
    /// * `Result<NamedTempFile, AppError>` - Temp file backing the rendered image
    ///
    /// # Errors
    /// * `RenderFailure` when the series has no numeric points or drawing fails
    fn render(&self, series: &SeriesArtifact, options: &ChartOptions)
    -> Result<NamedTempFile, AppError>;

    /// File extension of the images this renderer produces
    fn extension(&self) -> &'static str;
}

/// Plotters-backed renderer producing PNG images
///
/// Renders into temp files inside `scratch_dir` so that a later move into a
/// user's saved namespace is a same-filesystem rename.
pub struct PlottersRenderer {
    scratch_dir: PathBuf,
}

impl PlottersRenderer {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }
}

impl ChartRenderer for PlottersRenderer {
    fn render(
        &self,
        series: &SeriesArtifact,
        options: &ChartOptions,
    ) -> Result<NamedTempFile, AppError> {
        // Pair up the numeric points; non-numeric entries cannot be plotted
        let data: Vec<(f64, f64)> = series
            .x
            .iter()
            .zip(series.y.iter())
            .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
            .collect();

        if data.is_empty() {
            return Err(AppError::Render(format!(
                "series '{}' has no numeric data points",
                series.series_name
            )));
        }

        let file = tempfile::Builder::new()
            .prefix("plotdash-chart-")
            .suffix(".png")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| AppError::Render(format!("failed to create temp file: {}", e)))?;

        let result = match series.kind {
            GraphType::Line => save_line_chart(&data, options, file.path()),
            GraphType::Scatter => save_scatter_chart(&data, options, file.path()),
            GraphType::Bar => save_bar_chart(&data, options, file.path()),
        };

        result.map_err(|e| {
            AppError::Render(format!(
                "drawing '{}' failed: {}",
                series.series_name, e
            ))
        })?;

        Ok(file)
    }

    fn extension(&self) -> &'static str {
        "png"
    }
}

// Axis bounds over the data, padded so a flat series still gets a range
fn bounds(data: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::MAX;
    let mut max_x = f64::MIN;
    let mut min_y = f64::MAX;
    let mut max_y = f64::MIN;

    for &(x, y) in data {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    (min_x, max_x, min_y, max_y)
}

/// Saves a line chart to a file
///
/// Renders the series with connected lines in row order.
///
/// # Implementation Notes
/// * Automatically scales axes based on data range
/// * Uses blue color for the line series
fn save_line_chart(
    data: &[(f64, f64)],
    options: &ChartOptions,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let (min_x, max_x, min_y, max_y) = bounds(data);
    let x_range = min_x..max_x + 1.0;
    let y_range = min_y..max_y + 1.0;

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    chart.draw_series(LineSeries::new(data.iter().copied(), &BLUE))?;

    root.present()?;

    Ok(())
}

/// Saves a scatter chart to a file
///
/// # Implementation Notes
/// * Uses green circles with 5-pixel radius for data points
fn save_scatter_chart(
    data: &[(f64, f64)],
    options: &ChartOptions,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let (min_x, max_x, min_y, max_y) = bounds(data);
    let x_range = min_x..max_x + 1.0;
    let y_range = min_y..max_y + 1.0;

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    chart.draw_series(
        data.iter()
            .map(|&(x, y)| Circle::new((x, y), 5, GREEN.filled())),
    )?;

    root.present()?;

    Ok(())
}

/// Saves a bar chart to a file
///
/// # Implementation Notes
/// * Bar width is 0.8 units (from x-0.4 to x+0.4) for visual clarity
/// * The Y range always includes 0 so bars have a baseline
fn save_bar_chart(
    data: &[(f64, f64)],
    options: &ChartOptions,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let (min_x, max_x, min_y, max_y) = bounds(data);
    let x_range = min_x - 1.0..max_x + 1.0;
    let y_range = min_y.min(0.0)..max_y + 1.0;

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    chart.draw_series(
        data.iter()
            .map(|&(x, y)| Rectangle::new([(x - 0.4, 0.0), (x + 0.4, y)], BLUE.filled())),
    )?;

    root.present()?;

    Ok(())
}
