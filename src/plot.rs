use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::loader::{CellValue, Dataset};

/// How the generated artifacts are meant to be laid out by the client
///
/// `Single` asks for one combined rendering, `Multiple` for one rendering per
/// artifact. This is a presentation hint consumed downstream; it does not
/// change which artifacts are generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotType {
    Single,
    Multiple,
}

impl PlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotType::Single => "single",
            PlotType::Multiple => "multiple",
        }
    }
}

/// Available graph types supported by the application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
    /// Line graph - data points connected in row order
    Line,

    /// Scatter plot - individual data points without connecting lines
    Scatter,

    /// Bar graph - one vertical bar per data point
    Bar,
}

impl GraphType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::Line => "line",
            GraphType::Scatter => "scatter",
            GraphType::Bar => "bar",
        }
    }
}

/// Plotting options exactly as they arrive off the wire
///
/// The upload form is loosely typed (every field is a string); this struct
/// holds the raw fields until [`PlotRequest::validate`] turns them into a
/// strictly typed [`PlotSpec`]. Handlers never pass raw fields any deeper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlotRequest {
    /// Column to use for the Y axis of every plot
    pub y_axis_key: String,

    /// "single" or "multiple"
    pub plot_type: String,

    /// "line", "scatter" or "bar"
    pub graph_type: String,

    /// Whether generated artifacts should be persisted under the user's
    /// saved namespace
    pub save_plot: bool,
}

/// A validated plotting specification
#[derive(Debug, Clone)]
pub struct PlotSpec {
    pub y_axis_key: String,
    pub plot_type: PlotType,
    pub graph_type: GraphType,
    pub save_plot: bool,
}

impl PlotRequest {
    /// Validate the request against a dataset schema
    ///
    /// Rules are checked in order: the Y-axis key must be non-empty and
    /// present in the schema, then the plot type, then the graph type. The
    /// check is pure (no I/O) and runs strictly before any file write or
    /// artifact generation, so a bad request never touches storage.
    ///
    /// # Arguments
    /// * `schema` - Ordered column names of the parsed dataset
    ///
    /// # Returns
    /// * `Result<PlotSpec, AppError>` - The typed spec or the first rule violation
    ///
    /// # Errors
    /// * `MissingYAxis`, `InvalidPlotType` or `InvalidGraphType`
    pub fn validate(&self, schema: &[String]) -> Result<PlotSpec, AppError> {
        if self.y_axis_key.is_empty() || !schema.iter().any(|c| c == &self.y_axis_key) {
            return Err(AppError::MissingYAxis(self.y_axis_key.clone()));
        }

        let plot_type = match self.plot_type.as_str() {
            "single" => PlotType::Single,
            "multiple" => PlotType::Multiple,
            other => return Err(AppError::InvalidPlotType(other.to_string())),
        };

        let graph_type = match self.graph_type.as_str() {
            "line" => GraphType::Line,
            "scatter" => GraphType::Scatter,
            "bar" => GraphType::Bar,
            other => return Err(AppError::InvalidGraphType(other.to_string())),
        };

        Ok(PlotSpec {
            y_axis_key: self.y_axis_key.clone(),
            plot_type,
            graph_type,
            save_plot: self.save_plot,
        })
    }
}

/// One generated chart as structured series data
///
/// `x` and `y` are index-aligned: entry i of both sequences came from the
/// same data row. Rows where either endpoint was null are skipped as a pair,
/// so the sequences always stay the same length.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesArtifact {
    /// "{y_axis_key} vs {column}"
    pub series_name: String,

    /// Graph type the client should render this series as
    pub kind: GraphType,

    /// Name of the column supplying the X values
    pub x_name: String,

    /// Name of the column supplying the Y values
    pub y_name: String,

    pub x: Vec<CellValue>,
    pub y: Vec<CellValue>,
}

/// Generate one artifact per non-Y column of the dataset
///
/// For every column other than `spec.y_axis_key`, in schema order, pairs that
/// column's values (X) with the Y column's values row by row. Output order is
/// deterministic for the same input. A schema containing only the Y column
/// yields an empty vector, which is not an error.
///
/// # Arguments
/// * `dataset` - Parsed rows sharing one schema
/// * `spec` - Validated plotting options
///
/// # Returns
/// * `Vec<SeriesArtifact>` - One artifact per non-Y column
pub fn generate(dataset: &Dataset, spec: &PlotSpec) -> Vec<SeriesArtifact> {
    let y_idx = match dataset.columns.iter().position(|c| c == &spec.y_axis_key) {
        Some(idx) => idx,
        // Unreachable after validation; generate nothing rather than guess
        None => return Vec::new(),
    };

    let mut artifacts = Vec::new();

    for (x_idx, column) in dataset.columns.iter().enumerate() {
        if x_idx == y_idx {
            continue;
        }

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for row in &dataset.rows {
            let x = &row[x_idx];
            let y = &row[y_idx];
            // Null policy: drop the whole pair so x and y stay aligned
            if x.is_null() || y.is_null() {
                continue;
            }
            xs.push(x.clone());
            ys.push(y.clone());
        }

        artifacts.push(SeriesArtifact {
            series_name: format!("{} vs {}", spec.y_axis_key, column),
            kind: spec.graph_type,
            x_name: column.clone(),
            y_name: spec.y_axis_key.clone(),
            x: xs,
            y: ys,
        });
    }

    artifacts
}
