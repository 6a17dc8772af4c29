//! Declarative chart rendering.
//!
//! The visualize tool accepts a small chart spec (kind + x column + y
//! column(s)) instead of arbitrary plotting code, and renders it to a
//! self-contained HTML file with an inline SVG. No external assets, so
//! the output endpoint can serve it as-is.

use polars::prelude::*;
use serde_json::Value;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;

/// Series color palette, cycled for multi-trace charts.
const PALETTE: &[&str] = &[
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948",
];

/// Max x-axis tick labels before thinning kicks in.
const MAX_X_LABELS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("chart spec must be a JSON object")]
    NotAnObject,
    #[error("chart spec is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("unknown chart type '{0}'. Use bar, line, scatter or pie")]
    UnknownKind(String),
    #[error("pie charts take exactly one y column")]
    PieSeriesCount,
    #[error("column '{0}' not found in query result")]
    UnknownColumn(String),
    #[error("column '{0}' is not numeric")]
    NotNumeric(String),
    #[error("query result is empty, nothing to plot")]
    EmptyData,
    #[error("pie values must be non-negative, got {0}")]
    NegativePieValue(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Pie,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Pie => "pie",
        }
    }
}

/// Parsed chart specification: what to plot and from which columns.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// Categorical label column.
    pub x: String,
    /// Numeric value column(s); pie takes exactly one.
    pub y: Vec<String>,
}

impl ChartSpec {
    pub fn from_value(value: &Value) -> Result<Self, ChartError> {
        let obj = value.as_object().ok_or(ChartError::NotAnObject)?;

        let kind = match obj
            .get("chart")
            .and_then(|v| v.as_str())
            .ok_or(ChartError::MissingField("chart"))?
        {
            "bar" => ChartKind::Bar,
            "line" => ChartKind::Line,
            "scatter" => ChartKind::Scatter,
            "pie" => ChartKind::Pie,
            other => return Err(ChartError::UnknownKind(other.to_string())),
        };

        let x = obj
            .get("x")
            .and_then(|v| v.as_str())
            .ok_or(ChartError::MissingField("x"))?
            .to_string();

        let y = match obj.get("y") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        };
        if y.is_empty() {
            return Err(ChartError::MissingField("y"));
        }
        if kind == ChartKind::Pie && y.len() != 1 {
            return Err(ChartError::PieSeriesCount);
        }

        Ok(Self { kind, x, y })
    }
}

/// Render `spec` against `df` into a self-contained HTML document.
/// Returns the HTML and the number of traces (y-series) drawn.
pub fn render_chart(df: &DataFrame, spec: &ChartSpec, title: &str) -> Result<(String, usize), ChartError> {
    if df.height() == 0 {
        return Err(ChartError::EmptyData);
    }

    let labels = label_values(df, &spec.x)?;
    let series: Vec<(String, Vec<f64>)> = spec
        .y
        .iter()
        .map(|name| numeric_values(df, name).map(|vals| (name.clone(), vals)))
        .collect::<Result<_, _>>()?;

    let body = match spec.kind {
        ChartKind::Bar => render_bars(&labels, &series),
        ChartKind::Line => render_lines(&labels, &series, false),
        ChartKind::Scatter => render_lines(&labels, &series, true),
        ChartKind::Pie => render_pie(&labels, &series[0].1)?,
    };

    let escaped_title = escape(title);
    let svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif">
<text x="{tx}" y="28" text-anchor="middle" font-size="18">{escaped_title}</text>
{body}
</svg>"#,
        tx = WIDTH / 2.0,
    );

    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{escaped_title}</title>\n</head>\n<body>\n{svg}\n</body>\n</html>\n"
    );
    Ok((html, series.len()))
}

fn label_values(df: &DataFrame, column: &str) -> Result<Vec<String>, ChartError> {
    let series = df
        .column(column)
        .map_err(|_| ChartError::UnknownColumn(column.to_string()))?;
    Ok((0..series.len())
        .map(|i| match series.get(i) {
            Ok(AnyValue::Null) => "null".to_string(),
            Ok(AnyValue::String(s)) => s.to_string(),
            Ok(AnyValue::StringOwned(s)) => s.to_string(),
            Ok(other) => other.to_string(),
            Err(_) => "null".to_string(),
        })
        .collect())
}

fn numeric_values(df: &DataFrame, column: &str) -> Result<Vec<f64>, ChartError> {
    let series = df
        .column(column)
        .map_err(|_| ChartError::UnknownColumn(column.to_string()))?;
    if !series.dtype().is_numeric() {
        return Err(ChartError::NotNumeric(column.to_string()));
    }
    let casted = series
        .cast(&DataType::Float64)
        .map_err(|_| ChartError::NotNumeric(column.to_string()))?;
    let values = casted
        .f64()
        .map_err(|_| ChartError::NotNumeric(column.to_string()))?;
    Ok(values.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

struct Scale {
    min: f64,
    max: f64,
}

impl Scale {
    /// Y range always includes zero so bar heights are honest.
    fn for_values(series: &[(String, Vec<f64>)]) -> Self {
        let mut min = 0.0f64;
        let mut max = 0.0f64;
        for (_, values) in series {
            for &v in values {
                min = min.min(v);
                max = max.max(v);
            }
        }
        if (max - min).abs() < f64::EPSILON {
            max = min + 1.0;
        }
        Self { min, max }
    }

    fn to_y(&self, v: f64) -> f64 {
        let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        MARGIN_TOP + plot_h * (1.0 - (v - self.min) / (self.max - self.min))
    }

    fn ticks(&self) -> Vec<f64> {
        (0..=4)
            .map(|i| self.min + (self.max - self.min) * f64::from(i) / 4.0)
            .collect()
    }
}

fn plot_width() -> f64 {
    WIDTH - MARGIN_LEFT - MARGIN_RIGHT
}

fn x_center(index: usize, count: usize) -> f64 {
    let slot = plot_width() / count as f64;
    MARGIN_LEFT + slot * (index as f64 + 0.5)
}

/// Axis lines, y ticks with values, and (thinned) x category labels.
fn render_axes(labels: &[String], scale: &Scale) -> String {
    let mut out = String::new();
    let bottom = HEIGHT - MARGIN_BOTTOM;
    out.push_str(&format!(
        r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{bottom}" stroke="#333"/>
<line x1="{MARGIN_LEFT}" y1="{bottom}" x2="{right}" y2="{bottom}" stroke="#333"/>
"##,
        right = WIDTH - MARGIN_RIGHT,
    ));

    for tick in scale.ticks() {
        let y = scale.to_y(tick);
        out.push_str(&format!(
            r##"<line x1="{x1}" y1="{y:.1}" x2="{MARGIN_LEFT}" y2="{y:.1}" stroke="#333"/>
<text x="{x2}" y="{ty:.1}" text-anchor="end" font-size="11">{label}</text>
"##,
            x1 = MARGIN_LEFT - 5.0,
            x2 = MARGIN_LEFT - 8.0,
            ty = y + 4.0,
            label = fmt_num(tick),
        ));
    }

    let step = labels.len().div_ceil(MAX_X_LABELS);
    for (i, label) in labels.iter().enumerate() {
        if i % step != 0 {
            continue;
        }
        let x = x_center(i, labels.len());
        out.push_str(&format!(
            r#"<text x="{x:.1}" y="{y}" text-anchor="middle" font-size="11">{text}</text>
"#,
            y = HEIGHT - MARGIN_BOTTOM + 18.0,
            text = escape(label),
        ));
    }
    out
}

/// Color-keyed legend in the top-right corner, only for multi-trace charts.
fn render_legend(series: &[(String, Vec<f64>)]) -> String {
    if series.len() < 2 {
        return String::new();
    }
    let mut out = String::new();
    for (i, (name, _)) in series.iter().enumerate() {
        let y = MARGIN_TOP + 16.0 * i as f64;
        out.push_str(&format!(
            r#"<rect x="{bx}" y="{by:.1}" width="10" height="10" fill="{color}"/>
<text x="{tx}" y="{ty:.1}" font-size="11">{text}</text>
"#,
            bx = WIDTH - MARGIN_RIGHT - 120.0,
            by = y,
            color = PALETTE[i % PALETTE.len()],
            tx = WIDTH - MARGIN_RIGHT - 106.0,
            ty = y + 9.0,
            text = escape(name),
        ));
    }
    out
}

fn render_bars(labels: &[String], series: &[(String, Vec<f64>)]) -> String {
    let scale = Scale::for_values(series);
    let mut out = render_axes(labels, &scale);

    let slot = plot_width() / labels.len() as f64;
    let group = slot * 0.8;
    let bar = group / series.len() as f64;
    let zero_y = scale.to_y(0.0);

    for (s, (_, values)) in series.iter().enumerate() {
        let color = PALETTE[s % PALETTE.len()];
        for (i, &v) in values.iter().enumerate() {
            let x = MARGIN_LEFT + slot * i as f64 + slot * 0.1 + bar * s as f64;
            let vy = scale.to_y(v);
            let (top, height) = if vy <= zero_y {
                (vy, zero_y - vy)
            } else {
                (zero_y, vy - zero_y)
            };
            out.push_str(&format!(
                r#"<rect x="{x:.1}" y="{top:.1}" width="{w:.1}" height="{height:.1}" fill="{color}"/>
"#,
                w = bar.max(1.0),
            ));
        }
    }
    out.push_str(&render_legend(series));
    out
}

fn render_lines(labels: &[String], series: &[(String, Vec<f64>)], points_only: bool) -> String {
    let scale = Scale::for_values(series);
    let mut out = render_axes(labels, &scale);

    for (s, (_, values)) in series.iter().enumerate() {
        let color = PALETTE[s % PALETTE.len()];
        let coords: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (x_center(i, labels.len()), scale.to_y(v)))
            .collect();

        if !points_only {
            let path = coords
                .iter()
                .map(|(x, y)| format!("{x:.1},{y:.1}"))
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&format!(
                r#"<polyline points="{path}" fill="none" stroke="{color}" stroke-width="2"/>
"#,
            ));
        }
        for (x, y) in &coords {
            out.push_str(&format!(
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="4" fill="{color}"/>
"#,
            ));
        }
    }
    out.push_str(&render_legend(series));
    out
}

fn render_pie(labels: &[String], values: &[f64]) -> Result<String, ChartError> {
    if let Some(&v) = values.iter().find(|v| **v < 0.0) {
        return Err(ChartError::NegativePieValue(v));
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return Err(ChartError::EmptyData);
    }

    let cx = MARGIN_LEFT + (plot_width() - 160.0) / 2.0;
    let cy = MARGIN_TOP + (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) / 2.0;
    let r = ((HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) / 2.0).min((plot_width() - 160.0) / 2.0);

    let mut out = String::new();
    let mut angle = -std::f64::consts::FRAC_PI_2;
    for (i, &v) in values.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let fraction = v / total;
        if fraction <= 0.0 {
            continue;
        }
        if fraction >= 0.9999 {
            out.push_str(&format!(
                r#"<circle cx="{cx:.1}" cy="{cy:.1}" r="{r:.1}" fill="{color}"/>
"#,
            ));
            break;
        }
        let end = angle + fraction * std::f64::consts::TAU;
        let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
        let (x2, y2) = (cx + r * end.cos(), cy + r * end.sin());
        let large = i32::from(fraction > 0.5);
        out.push_str(&format!(
            r#"<path d="M {cx:.1} {cy:.1} L {x1:.1} {y1:.1} A {r:.1} {r:.1} 0 {large} 1 {x2:.1} {y2:.1} Z" fill="{color}"/>
"#,
        ));
        angle = end;
    }

    // Side legend: one swatch per wedge with label and value.
    for (i, (label, &v)) in labels.iter().zip(values).enumerate() {
        let y = MARGIN_TOP + 16.0 * i as f64;
        out.push_str(&format!(
            r#"<rect x="{bx}" y="{by:.1}" width="10" height="10" fill="{color}"/>
<text x="{tx}" y="{ty:.1}" font-size="11">{text}: {value}</text>
"#,
            bx = WIDTH - MARGIN_RIGHT - 150.0,
            by = y,
            color = PALETTE[i % PALETTE.len()],
            tx = WIDTH - MARGIN_RIGHT - 136.0,
            ty = y + 9.0,
            text = escape(label),
            value = fmt_num(v),
        ));
    }
    Ok(out)
}

fn fmt_num(v: f64) -> String {
    if v.fract().abs() < 1e-9 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
