//! SVG chart rendering.
//!
//! Two chart kinds are produced:
//! - a horizontal bar chart of the most mentioned entities
//! - a monthly line chart for one entity group, with a red vertical marker at
//!   the reference date

use crate::aggregate::{MonthlySeries, RankedEntity};
use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

const FONT: &str = "sans-serif";

pub const TOP_ENTITIES_TITLE: &str =
    "Top Mentioned Countries/Nationalities/Organizations (Excluding Kazakhstan-related Terms)";

/// Months since year zero, with the day as a fraction of the month.
fn month_axis(date: NaiveDate) -> f64 {
    let whole = (date.year() * 12 + date.month0() as i32) as f64;
    let days = crate::utils::month_end(date).day() as f64;
    whole + (date.day() as f64 - 1.0) / days
}

fn month_label(x: f64) -> String {
    let index = x.round() as i32;
    let (year, month0) = (index.div_euclid(12), index.rem_euclid(12));
    format!("{year}-{:02}", month0 + 1)
}

/// Render the ranking as a horizontal bar chart, highest count on top.
#[instrument(level = "info", skip(ranking), fields(path = %path.display(), entities = ranking.len()))]
pub fn render_top_entities(path: &Path, ranking: &[RankedEntity]) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let rows = ranking.len().max(1);
    let max = ranking.iter().map(|r| r.count).max().unwrap_or(0).max(1);
    // Row 0 is drawn at the bottom, so the ranking is placed in reverse.
    let name_at = |row: usize| -> String {
        ranking
            .len()
            .checked_sub(row + 1)
            .and_then(|i| ranking.get(i))
            .map(|r| r.entity.clone())
            .unwrap_or_default()
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(TOP_ENTITIES_TITLE, (FONT, 20))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(200)
        .build_cartesian_2d(0u64..(max + max / 10 + 1), (0usize..rows).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(rows)
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(row) | SegmentValue::Exact(row) => name_at(*row),
            SegmentValue::Last => String::new(),
        })
        .x_desc("Mentions")
        .y_desc("Entity")
        .draw()?;

    chart.draw_series(
        Histogram::horizontal(&chart)
            .style(RGBColor(49, 130, 189).filled())
            .margin(6)
            .data(
                ranking
                    .iter()
                    .rev()
                    .enumerate()
                    .map(|(row, r)| (row, r.count)),
            ),
    )?;

    root.present()?;
    info!("Wrote top entities chart");
    Ok(())
}

/// Render one monthly series as a line chart with a vertical marker at `marker`.
#[instrument(level = "info", skip(series), fields(path = %path.display(), label = %series.label))]
pub fn render_monthly_series(
    path: &Path,
    title: &str,
    series: &MonthlySeries,
    marker: NaiveDate,
) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let points: Vec<(f64, f64)> = series
        .points
        .iter()
        .map(|(month, count)| (month_axis(*month), *count as f64))
        .collect();
    let marker_x = month_axis(marker);

    let (x_min, x_max) = points
        .iter()
        .map(|(x, _)| *x)
        .chain(std::iter::once(marker_x))
        .fold((f64::MAX, f64::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let y_max = points.iter().map(|(_, y)| *y).fold(0.0, f64::max).max(1.0) * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((x_min - 0.5)..(x_max + 0.5), 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_labels(12)
        .x_label_formatter(&|x| month_label(*x))
        .y_label_formatter(&|y| format!("{y:.0}"))
        .x_desc("Month")
        .y_desc("Number of Mentions")
        .draw()?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))?
        .label(series.label.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))?;

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(marker_x, 0.0), (marker_x, y_max)],
            RED.stroke_width(2),
        )))?
        .label(marker.format("%b %Y").to_string())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    info!(points = points.len(), "Wrote monthly series chart");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_axis_orders_months() {
        assert_eq!(month_axis(ymd(2022, 1, 1)) + 1.0, month_axis(ymd(2022, 2, 1)));
        assert!(month_axis(ymd(2022, 1, 31)) < month_axis(ymd(2022, 2, 1)));
        assert_eq!(month_label(month_axis(ymd(2022, 2, 1))), "2022-02");
        assert_eq!(month_label(month_axis(ymd(2021, 12, 1))), "2021-12");
    }

    #[test]
    fn test_render_top_entities_writes_svg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("TopMentionedCountries.svg");
        let ranking = vec![
            RankedEntity { entity: "UN".into(), count: 48 },
            RankedEntity { entity: "Russia".into(), count: 35 },
        ];
        render_top_entities(&path, &ranking).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Russia"));
    }

    #[test]
    fn test_render_monthly_series_writes_svg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MentionsOfRussiaOverTime.svg");
        let series = MonthlySeries {
            label: "Russia".into(),
            variants: vec!["Russia".into()],
            points: vec![(ymd(2022, 1, 1), 1), (ymd(2022, 2, 1), 0), (ymd(2022, 3, 1), 2)],
        };
        render_monthly_series(&path, "Mentions of Russia Over Time (Monthly)", &series, ymd(2022, 2, 1))
            .unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Feb 2022"));
    }
}
