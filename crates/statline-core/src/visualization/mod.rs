//! Declarative chart specifications.
//!
//! A [`VisualizationSpec`] is plain data (`kind`, `series`, `options`) that
//! any charting front end can render.

mod builder;
mod labels;
mod model;

pub use builder::{ChartBuilder, DefaultChartBuilder, VisualizationError};
pub use labels::{chart_title, humanize_column};
pub use model::{AxisValue, ChartKind, ChartOptions, Series, VisualizationSpec};
