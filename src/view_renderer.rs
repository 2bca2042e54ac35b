// view_renderer.rs
use crate::aggregators::{CountryCount, RiskShare, ScopeCount};
use crate::map_selection::MapSelection;
use crate::project_loader::ProjectRecord;
use std::fmt::Write;

/// 256-colour greens, lightest first.
const GREENS: [u8; 9] = [194, 157, 120, 83, 46, 40, 34, 28, 22];
const GRAY: u8 = 245;
const HEADING: u8 = 208;

pub const TABLE_COLUMNS: [&str; 5] = [
    "Project_ID",
    "Project Name",
    "Scope",
    "Type",
    "Total Credits Issued",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub use_colors: bool,
    pub chart_width: usize,
    pub cell_width: usize,
    pub table_row_limit: usize,
    pub map_show_zero_counts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            use_colors: true,
            chart_width: 40,
            cell_width: 24,
            table_row_limit: 25,
            map_show_zero_counts: false,
        }
    }
}

fn paint(text: &str, colour: u8, opts: &RenderOptions) -> String {
    if opts.use_colors {
        format!("\x1b[38;5;{}m{}\x1b[0m", colour, text)
    } else {
        text.to_string()
    }
}

fn heading(title: &str, opts: &RenderOptions) -> String {
    let line = format!("#### {}", title);
    if opts.use_colors {
        format!("\x1b[1;38;5;{}m{}\x1b[0m\n", HEADING, line)
    } else {
        format!("{}\n", line)
    }
}

fn green_for(value: usize, max: usize) -> u8 {
    if max == 0 || value == 0 {
        return GREENS[0];
    }
    let step = (value as f64 / max as f64 * (GREENS.len() - 1) as f64).round() as usize;
    GREENS[step.min(GREENS.len() - 1)]
}

fn bar_length(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 || value <= 0.0 {
        return 0;
    }
    ((value / max) * width as f64).round().max(1.0) as usize
}

fn risk_colour(level: &str) -> u8 {
    match level {
        "Low" => 120,
        "Moderate" => 34,
        "High" => 22,
        _ => GRAY,
    }
}

pub fn format_credits(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn fit(text: &str, width: usize) -> String {
    let clipped: String = text.chars().take(width).collect();
    format!("{:<width$}", clipped, width = width)
}

/// Choropleth as a ranked list. Only regions with an ISO-3 code are coloured.
pub fn render_map(counts: &[CountryCount], selection: &MapSelection, opts: &RenderOptions) -> String {
    let mut out = heading("Anomalies by Country (Map)", opts);

    let mut mapped: Vec<&CountryCount> = counts
        .iter()
        .filter(|c| c.iso_alpha_3.is_some())
        .filter(|c| opts.map_show_zero_counts || c.anomaly_count > 0)
        .collect();
    mapped.sort_by(|a, b| {
        b.anomaly_count
            .cmp(&a.anomaly_count)
            .then_with(|| a.country.cmp(&b.country))
    });

    let unmapped = counts.iter().filter(|c| c.iso_alpha_3.is_none()).count();
    let max = counts.iter().map(|c| c.anomaly_count).max().unwrap_or(0);

    if max == 0 && !opts.map_show_zero_counts {
        out.push_str("  No anomalies anywhere in the current selection.\n");
    }

    let name_width = mapped
        .iter()
        .map(|c| c.country.chars().count())
        .max()
        .unwrap_or(0)
        .min(opts.cell_width);

    for row in mapped {
        let code = row.iso_alpha_3.as_deref().unwrap_or("");
        let marker = if selection.iso_alpha_3() == Some(code) { ">" } else { " " };
        let bar = "█".repeat(bar_length(row.anomaly_count as f64, max as f64, opts.chart_width));
        let _ = writeln!(
            out,
            " {} {} {} {:>5} {}",
            marker,
            code,
            fit(&row.country, name_width),
            row.anomaly_count,
            paint(&bar, green_for(row.anomaly_count, max), opts),
        );
    }

    if unmapped > 0 {
        let _ = writeln!(out, "  ({} countries without an ISO-3 code are not drawn)", unmapped);
    }
    let _ = writeln!(out, "  Showing: {}. Click a country to filter (or reset).", selection);
    out
}

pub fn render_scope_chart(scopes: &[ScopeCount], opts: &RenderOptions) -> String {
    let mut out = heading("Anomalies by Scope", opts);
    if scopes.is_empty() {
        out.push_str("  No anomalies to chart.\n");
        return out;
    }

    let max = scopes.iter().map(|s| s.anomaly_count).max().unwrap_or(0);
    let label_width = scopes
        .iter()
        .map(|s| s.scope.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(5, opts.cell_width.max(5));

    for scope in scopes {
        let bar = "█".repeat(bar_length(scope.anomaly_count as f64, max as f64, opts.chart_width));
        let _ = writeln!(
            out,
            "  {} | {} {}",
            fit(&scope.scope, label_width),
            paint(&bar, green_for(scope.anomaly_count, max), opts),
            scope.anomaly_count,
        );
    }
    out
}

/// One stacked bar across the full chart width, plus a legend.
pub fn render_risk_bar(shares: &[RiskShare], has_risk_level: bool, opts: &RenderOptions) -> String {
    let mut out = heading("Risk Level Proportion", opts);
    if !has_risk_level {
        out.push_str("  No risk levels in this dataset.\n");
        return out;
    }
    if shares.is_empty() {
        out.push_str("  No anomalies to chart.\n");
        return out;
    }

    let width = opts.chart_width.max(shares.len());
    let mut bar = String::new();
    let mut used = 0usize;
    let mut cumulative = 0.0;
    for share in shares {
        cumulative += share.proportion;
        let end = ((cumulative * width as f64).round() as usize).min(width);
        let segment = "█".repeat(end.saturating_sub(used));
        used = end.max(used);
        bar.push_str(&paint(&segment, risk_colour(&share.risk_level), opts));
    }
    let _ = writeln!(out, "  Risk |{}|", bar);

    let legend: Vec<String> = shares
        .iter()
        .map(|s| {
            format!(
                "{} {}: {}",
                paint("■", risk_colour(&s.risk_level), opts),
                s.risk_level,
                s.percent_label()
            )
        })
        .collect();
    let _ = writeln!(out, "  {}", legend.join("   "));
    out
}

pub fn render_project_table(anomalies: &[&ProjectRecord], opts: &RenderOptions) -> String {
    let mut out = heading("Project Details", opts);

    let rows: Vec<[String; 5]> = anomalies
        .iter()
        .take(opts.table_row_limit)
        .map(|r| {
            [
                r.project_id.clone(),
                r.project_name.clone(),
                r.scope.clone(),
                r.project_type.clone(),
                r.total_credits_issued.map(format_credits).unwrap_or_default(),
            ]
        })
        .collect();

    let widths: Vec<usize> = (0..TABLE_COLUMNS.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(TABLE_COLUMNS[i].chars().count()))
                .max()
                .unwrap_or(0)
                .min(opts.cell_width)
        })
        .collect();

    let header: String = TABLE_COLUMNS
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("|{}", fit(c, *w)))
        .collect();
    let _ = writeln!(out, "{}|", header);
    let _ = writeln!(out, "{}", "-".repeat(header.chars().count() + 1));

    for row in &rows {
        let line: String = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("|{}", fit(cell, *w)))
            .collect();
        let _ = writeln!(out, "{}|", line);
    }

    if anomalies.len() > rows.len() {
        let _ = writeln!(out, "<<+{} rows>>", anomalies.len() - rows.len());
    }
    let _ = writeln!(out, "Total rows: {}", anomalies.len());
    out
}

/// Per-year credits in year order; missing years stay as gaps.
pub fn trend_points(project: &ProjectRecord) -> Vec<(u16, Option<f64>)> {
    project.credits_by_year()
}

/// Nothing at all when no project is picked. Rows sharing a `Project_ID` are
/// drawn one after another against a common scale.
pub fn render_trend(rows: &[&ProjectRecord], opts: &RenderOptions) -> String {
    let first = match rows.first() {
        Some(p) => p,
        None => return String::new(),
    };

    let mut out = heading("Annual Credit Trend", opts);
    let _ = writeln!(out, "  Credits Over Time: {}", first.project_id);

    let series: Vec<Vec<(u16, Option<f64>)>> = rows.iter().map(|r| trend_points(r)).collect();
    let max = series
        .iter()
        .flatten()
        .filter_map(|(_, v)| *v)
        .fold(0.0_f64, f64::max);
    let span = opts.chart_width.max(2) - 1;

    for (row, points) in rows.iter().zip(&series) {
        if rows.len() > 1 {
            let _ = writeln!(out, "  -- {}", row.project_name);
        }
        for (year, value) in points {
            match value {
                Some(v) => {
                    let offset = if max > 0.0 {
                        ((v.max(0.0) / max) * span as f64).round() as usize
                    } else {
                        0
                    };
                    let _ = writeln!(
                        out,
                        "  {} |{}{} {}",
                        year,
                        " ".repeat(offset),
                        paint("●", 34, opts),
                        format_credits(*v)
                    );
                }
                None => {
                    let _ = writeln!(out, "  {} |", year);
                }
            }
        }
    }

    if series.iter().flatten().all(|(_, v)| v.is_none()) {
        out.push_str("  No yearly credits recorded for this project.\n");
    }
    out
}
