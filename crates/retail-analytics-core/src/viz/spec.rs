use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a chart's values should be formatted by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Percent,
    Count,
    Currency,
}

/// A renderer-agnostic chart description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    Heatmap(HeatmapSpec),
    Line(LineChartSpec),
    Bar(BarChartSpec),
    Scatter3d(ScatterSpec),
    Treemap(TreemapSpec),
    Histogram(HistogramSpec),
}

impl ChartSpec {
    /// True when there is nothing to draw; the shell renders a "no data"
    /// state instead of an empty frame.
    pub fn is_empty(&self) -> bool {
        match self {
            ChartSpec::Heatmap(s) => s.rows.is_empty(),
            ChartSpec::Line(s) => s.series.iter().all(|series| series.points.is_empty()),
            ChartSpec::Bar(s) => s.bars.is_empty(),
            ChartSpec::Scatter3d(s) => s.points.is_empty(),
            ChartSpec::Treemap(s) => s.tiles.is_empty(),
            ChartSpec::Histogram(s) => s.series.iter().all(|series| series.values.is_empty()),
        }
    }
}

/// Matrix heatmap; `None` cells are outside the observation horizon and
/// render blank, not as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapSpec {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    pub rows: Vec<Vec<Option<Decimal>>>,
    pub value_format: ValueFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    /// (x label, y value) pairs in draw order.
    pub points: Vec<(String, Decimal)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineChartSpec {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub series: Vec<Series>,
    pub value_format: ValueFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarDatum {
    pub label: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarChartSpec {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub bars: Vec<BarDatum>,
    pub value_format: ValueFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: Decimal,
    pub y: Decimal,
    pub z: Decimal,
    /// Series/colour grouping, e.g. the segment label.
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterSpec {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub z_title: String,
    pub points: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreemapTile {
    pub label: String,
    /// Tile area.
    pub size: Decimal,
    /// Tile colour scale value.
    pub color_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreemapSpec {
    pub title: String,
    pub tiles: Vec<TreemapTile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSeries {
    pub name: String,
    pub values: Vec<Decimal>,
}

/// Raw-value histogram; the renderer bins with `suggested_bins`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSpec {
    pub title: String,
    pub x_title: String,
    pub series: Vec<HistogramSeries>,
    pub suggested_bins: u32,
}
