//! Static SVG rendering of a run: account value against the rebased
//! benchmark on top, drawdown underneath.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::TurtleError;
use crate::ports::chart_port::{ChartData, ChartPort};

const WIDTH: f64 = 900.0;
const PADDING: f64 = 50.0;
const VALUE_HEIGHT: f64 = 320.0;
const DRAWDOWN_HEIGHT: f64 = 160.0;

pub struct SvgChartAdapter {
    output_dir: PathBuf,
}

impl SvgChartAdapter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

impl ChartPort for SvgChartAdapter {
    fn draw(&self, chart: &ChartData) -> Result<PathBuf, TurtleError> {
        if chart.dates.is_empty() {
            return Err(TurtleError::Chart {
                reason: "nothing to plot".into(),
            });
        }
        let path = self.output_dir.join(format!("{}.svg", chart.title));
        fs::write(&path, render_svg(chart)).map_err(|e| TurtleError::Chart {
            reason: format!("failed to write {}: {}", path.display(), e),
        })?;
        Ok(path)
    }
}

/// Vertical placement of one panel.
struct Panel {
    top: f64,
    height: f64,
    min: f64,
    max: f64,
}

impl Panel {
    fn new(top: f64, height: f64, values: impl Iterator<Item = f64>) -> Self {
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 1.0) };
        Panel {
            top,
            height,
            min,
            max,
        }
    }

    fn y(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        let scale = if range > 0.0 { self.height / range } else { 1.0 };
        self.top + self.height - (value - self.min) * scale
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

fn x_at(i: usize, count: usize) -> f64 {
    let plot_width = WIDTH - 2.0 * PADDING;
    if count > 1 {
        PADDING + i as f64 * plot_width / (count - 1) as f64
    } else {
        PADDING
    }
}

/// Polyline through the points that have a value. A gap starts a new line.
fn polylines(values: &[Option<f64>], panel: &Panel, stroke: &str) -> String {
    let mut out = String::new();
    let mut run: Vec<String> = Vec::new();
    let flush = |run: &mut Vec<String>, out: &mut String| {
        if run.len() > 1 {
            let _ = writeln!(
                out,
                r#"  <polyline fill="none" stroke="{stroke}" stroke-width="1.5" points="{}"/>"#,
                run.join(" ")
            );
        }
        run.clear();
    };
    for (i, value) in values.iter().enumerate() {
        match value {
            Some(v) => run.push(format!(
                "{:.1},{:.1}",
                x_at(i, values.len()),
                panel.y(*v)
            )),
            None => flush(&mut run, &mut out),
        }
    }
    flush(&mut run, &mut out);
    out
}

pub fn render_svg(chart: &ChartData) -> String {
    let n = chart.dates.len();
    let value_panel = Panel::new(
        PADDING,
        VALUE_HEIGHT,
        chart
            .value
            .iter()
            .copied()
            .chain(chart.benchmark.iter().flatten().copied()),
    );
    // Drawdown is plotted downwards from zero.
    let negated: Vec<f64> = chart.drawdown.iter().map(|d| -d).collect();
    let dd_panel = Panel::new(
        value_panel.bottom() + PADDING,
        DRAWDOWN_HEIGHT,
        negated.iter().copied().chain([0.0]),
    );
    let height = dd_panel.bottom() + PADDING;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH:.0}" height="{height:.0}" viewBox="0 0 {WIDTH:.0} {height:.0}">"#
    );
    let _ = writeln!(svg, r#"  <rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"  <text x="{PADDING:.0}" y="{:.0}" font-family="sans-serif" font-size="16">{}</text>"#,
        PADDING / 2.0,
        escape(&chart.title)
    );

    for panel in [&value_panel, &dd_panel] {
        let _ = writeln!(
            svg,
            r#"  <line x1="{PADDING:.0}" y1="{:.1}" x2="{PADDING:.0}" y2="{:.1}" stroke="black"/>"#,
            panel.top,
            panel.bottom()
        );
        let _ = writeln!(
            svg,
            r#"  <line x1="{PADDING:.0}" y1="{:.1}" x2="{:.0}" y2="{:.1}" stroke="black"/>"#,
            panel.bottom(),
            WIDTH - PADDING,
            panel.bottom()
        );
        let _ = writeln!(
            svg,
            r#"  <text x="4" y="{:.1}" font-family="sans-serif" font-size="10">{:.0}</text>"#,
            panel.top + 10.0,
            panel.max
        );
        let _ = writeln!(
            svg,
            r#"  <text x="4" y="{:.1}" font-family="sans-serif" font-size="10">{:.0}</text>"#,
            panel.bottom(),
            panel.min
        );
    }

    let value: Vec<Option<f64>> = chart.value.iter().copied().map(Some).collect();
    svg.push_str(&polylines(&value, &value_panel, "steelblue"));
    svg.push_str(&polylines(&chart.benchmark, &value_panel, "gray"));
    let drawdown: Vec<Option<f64>> = negated.into_iter().map(Some).collect();
    svg.push_str(&polylines(&drawdown, &dd_panel, "firebrick"));

    if let (Some(first), Some(last)) = (chart.dates.first(), chart.dates.last()) {
        let y = dd_panel.bottom() + 16.0;
        let _ = writeln!(
            svg,
            r#"  <text x="{PADDING:.0}" y="{y:.0}" font-family="sans-serif" font-size="10">{first}</text>"#
        );
        let _ = writeln!(
            svg,
            r#"  <text x="{:.0}" y="{y:.0}" font-family="sans-serif" font-size="10" text-anchor="end">{last}</text>"#,
            x_at(n.saturating_sub(1), n)
        );
    }
    svg.push_str("</svg>\n");
    svg
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
