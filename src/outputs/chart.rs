//! Grouped bar chart of sentiment labels per platform.
//!
//! Reads the annotated table and draws one group of bars per sentiment label,
//! one bar per platform, with the record count on the Y axis. The chart is
//! written as a standalone SVG file.

use crate::models::Sentiment;
use crate::outputs::tables::{ScoredRow, read_scored};
use itertools::Itertools;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 500.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 160.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;

/// Seaborn "Set2" palette, cycled per platform.
const PALETTE: [&str; 8] = [
    "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f", "#e5c494", "#b3b3b3",
];

/// Record counts per (label, platform).
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    /// X-axis groups: known labels in positive/neutral/negative order, then any
    /// unexpected labels in order of appearance.
    pub labels: Vec<String>,
    /// Legend entries in order of first appearance.
    pub platforms: Vec<String>,
    counts: HashMap<(String, String), usize>,
}

impl Distribution {
    pub fn from_rows(rows: &[ScoredRow]) -> Self {
        let present: Vec<String> = rows.iter().map(|r| r.label.trim().to_lowercase()).unique().collect();
        let labels = Sentiment::ALL
            .iter()
            .map(|s| s.as_str().to_string())
            .filter(|l| present.contains(l))
            .chain(
                present
                    .iter()
                    .filter(|l| Sentiment::parse(l).is_none())
                    .cloned(),
            )
            .collect();

        let platforms = rows.iter().map(|r| r.platform.clone()).unique().collect();

        let counts = rows
            .iter()
            .map(|r| (r.label.trim().to_lowercase(), r.platform.clone()))
            .counts();

        Self {
            labels,
            platforms,
            counts,
        }
    }

    pub fn count(&self, label: &str, platform: &str) -> usize {
        self.counts
            .get(&(label.to_string(), platform.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_count(&self) -> usize {
        self.counts.values().copied().max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Round the axis top up to a multiple of a step giving about five ticks.
fn axis_ticks(max: usize) -> (usize, usize) {
    let max = max.max(1);
    let step = max.div_ceil(5).max(1);
    (step, step * max.div_ceil(step))
}

/// Render the distribution as an SVG document.
pub fn render_svg(dist: &Distribution) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let base_y = MARGIN_TOP + plot_h;
    let (step, top) = axis_ticks(dist.max_count());
    let y_of = |v: usize| base_y - plot_h * (v as f64 / top as f64);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" font-size="18">Sentiment Distribution by Platform</text>"#,
        MARGIN_LEFT + plot_w / 2.0
    );

    // Grid and Y axis ticks
    for v in (0..=top).step_by(step) {
        let y = y_of(v);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#e5e5e5"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="12">{v}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 4.0
        );
    }
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{base_y}" stroke="black"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{base_y}" x2="{}" y2="{base_y}" stroke="black"/>"#,
        MARGIN_LEFT + plot_w
    );

    // Bars
    if !dist.labels.is_empty() && !dist.platforms.is_empty() {
        let group_w = plot_w / dist.labels.len() as f64;
        let bar_w = group_w * 0.8 / dist.platforms.len() as f64;
        for (gi, label) in dist.labels.iter().enumerate() {
            let group_x = MARGIN_LEFT + group_w * gi as f64 + group_w * 0.1;
            for (pi, platform) in dist.platforms.iter().enumerate() {
                let n = dist.count(label, platform);
                let y = y_of(n);
                let _ = writeln!(
                    svg,
                    r#"<rect x="{:.1}" y="{y:.1}" width="{bar_w:.1}" height="{:.1}" fill="{}"><title>{}: {n}</title></rect>"#,
                    group_x + bar_w * pi as f64,
                    base_y - y,
                    PALETTE[pi % PALETTE.len()],
                    escape_xml(platform)
                );
            }
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="13">{}</text>"#,
                MARGIN_LEFT + group_w * (gi as f64 + 0.5),
                base_y + 20.0,
                escape_xml(label)
            );
        }
    }

    // Axis titles
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">Sentiment Label</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 20.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="20" y="{:.1}" text-anchor="middle" font-size="14" transform="rotate(-90 20 {:.1})">Number of Posts/Articles</text>"#,
        MARGIN_TOP + plot_h / 2.0,
        MARGIN_TOP + plot_h / 2.0
    );

    // Legend
    let legend_x = WIDTH - MARGIN_RIGHT + 20.0;
    let _ = writeln!(
        svg,
        r#"<text x="{legend_x}" y="{}" font-size="13" font-weight="bold">Platform</text>"#,
        MARGIN_TOP + 10.0
    );
    for (pi, platform) in dist.platforms.iter().enumerate() {
        let y = MARGIN_TOP + 25.0 + 20.0 * pi as f64;
        let _ = writeln!(
            svg,
            r#"<rect x="{legend_x}" y="{y}" width="14" height="14" fill="{}"/>"#,
            PALETTE[pi % PALETTE.len()]
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="12">{}</text>"#,
            legend_x + 20.0,
            y + 11.0,
            escape_xml(platform)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// Read the annotated table at `input` and write the chart to `output`.
#[instrument(level = "info", skip_all, fields(input = %input.display(), output = %output.display()))]
pub async fn render_chart(input: &Path, output: &Path) -> Result<Distribution, Box<dyn Error>> {
    let rows = read_scored(input).await?;
    let dist = Distribution::from_rows(&rows);
    if dist.is_empty() {
        warn!("No scored records to chart; writing empty axes");
    }
    for label in &dist.labels {
        for platform in &dist.platforms {
            info!(%label, %platform, count = dist.count(label, platform), "Sentiment count");
        }
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(output, render_svg(&dist)).await?;
    info!("Wrote sentiment distribution chart");
    Ok(dist)
}
