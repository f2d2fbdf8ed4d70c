//! plot/mod.rs: Shared chart helpers over the `plotters` bitmap backend.

pub mod figures;

use std::error::Error;
use std::ops::Range;

use plotters::coord::Shift;
use plotters::prelude::*;

pub type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// One polyline (or point cloud) with an optional legend entry.
pub struct Line<'a> {
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
    pub label: Option<&'a str>,
    pub scatter: bool,
}

impl<'a> Line<'a> {
    pub fn new(points: Vec<(f64, f64)>, color: RGBColor) -> Self {
        Self {
            points,
            color,
            label: None,
            scatter: false,
        }
    }

    pub fn labelled(points: Vec<(f64, f64)>, color: RGBColor, label: &'a str) -> Self {
        Self {
            points,
            color,
            label: Some(label),
            scatter: false,
        }
    }

    pub fn scatter(points: Vec<(f64, f64)>, color: RGBColor, label: &'a str) -> Self {
        Self {
            points,
            color,
            label: Some(label),
            scatter: true,
        }
    }
}

/// Axis range covering `[lo, hi]` with 5% padding. Degenerate or
/// non-finite input still yields a drawable range.
pub fn padded(lo: f64, hi: f64) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() || hi < lo {
        return 0.0..1.0;
    }
    let span = hi - lo;
    if span <= f64::EPSILON * hi.abs().max(lo.abs()) {
        let half = if lo != 0.0 { lo.abs() * 0.1 } else { 1.0 };
        return (lo - half)..(hi + half);
    }
    let pad = 0.05 * span;
    (lo - pad)..(hi + pad)
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

pub fn line_panel(
    area: &Panel<'_>,
    caption: &str,
    (x_desc, y_desc): (&str, &str),
    lines: &[Line<'_>],
) -> Result<(), Box<dyn Error>> {
    let (x_lo, x_hi) = extent(lines.iter().flat_map(|l| l.points.iter().map(|p| p.0)));
    let (y_lo, y_hi) = extent(lines.iter().flat_map(|l| l.points.iter().map(|p| p.1)));
    let x_range = if x_lo.is_finite() { x_lo..x_hi.max(x_lo + f64::EPSILON) } else { 0.0..1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, padded(y_lo, y_hi))?;

    chart.configure_mesh().x_desc(x_desc).y_desc(y_desc).draw()?;

    let mut any_label = false;
    for line in lines {
        let color = line.color;
        let series = if line.scatter {
            chart.draw_series(line.points.iter().map(|&p| Circle::new(p, 3, color.filled())))?
        } else {
            chart.draw_series(LineSeries::new(line.points.iter().copied(), &color))?
        };
        if let Some(label) = line.label {
            any_label = true;
            series
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }
    if any_label {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Line panel with a logarithmic y axis; non-positive samples are dropped.
pub fn semilogy_panel(
    area: &Panel<'_>,
    caption: &str,
    (x_desc, y_desc): (&str, &str),
    lines: &[Line<'_>],
    markers: &[f64],
) -> Result<(), Box<dyn Error>> {
    let positive = |l: &Line<'_>| -> Vec<(f64, f64)> {
        l.points.iter().copied().filter(|p| p.1 > 0.0 && p.1.is_finite()).collect()
    };
    let kept: Vec<Vec<(f64, f64)>> = lines.iter().map(positive).collect();
    let (x_lo, x_hi) = extent(kept.iter().flatten().map(|p| p.0));
    let (y_lo, y_hi) = extent(kept.iter().flatten().map(|p| p.1));
    let (x_range, y_lo, y_hi) = if y_lo.is_finite() && y_hi > y_lo {
        (x_lo..x_hi, y_lo * 0.5, y_hi * 2.0)
    } else {
        (0.0..1.0, 1e-3, 1.0)
    };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range.clone(), (y_lo..y_hi).log_scale())?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .y_label_formatter(&|v| format!("{v:.0e}"))
        .draw()?;

    for &m in markers {
        if x_range.contains(&m) {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(m, y_lo), (m, y_hi)],
                RED.mix(0.4),
            )))?;
        }
    }

    for (line, points) in lines.iter().zip(kept) {
        let color = line.color;
        let series = chart.draw_series(LineSeries::new(points, &color))?;
        if let Some(label) = line.label {
            series
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }
    if lines.iter().any(|l| l.label.is_some()) {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Vertical bars with categorical labels. `reference` draws a horizontal
/// guide such as a detection threshold.
pub fn bar_panel(
    area: &Panel<'_>,
    caption: &str,
    y_desc: &str,
    bars: &[(String, f64)],
    color: RGBColor,
    reference: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let n = bars.len().max(1) as f64;
    let (lo, hi) = extent(bars.iter().map(|b| b.1).chain(reference));
    let (lo, hi) = if lo.is_finite() { (lo.min(0.0), hi.max(0.0)) } else { (0.0, 1.0) };
    let labels: Vec<String> = bars.iter().map(|b| b.0.clone()).collect();

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5..n - 0.5, padded(lo, hi))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len().max(1))
        .x_label_formatter(&|x| {
            let idx = x.round();
            if (x - idx).abs() < 1e-6 && idx >= 0.0 {
                labels.get(idx as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
        let x = i as f64;
        Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *v)], color.mix(0.7).filled())
    }))?;

    if let Some(r) = reference {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(-0.5, r), (n - 0.5, r)],
            RED.stroke_width(2),
        )))?;
    }
    Ok(())
}

/// Row-major grid drawn as coloured cells, row 0 at the bottom. Colour runs
/// from blue (min) to red (max).
pub fn heatmap_panel(
    area: &Panel<'_>,
    caption: &str,
    (x_desc, y_desc): (&str, &str),
    grid: &[Vec<f64>],
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<(), Box<dyn Error>> {
    let rows = grid.len();
    let cols = grid.first().map_or(0, Vec::len);
    let (lo, hi) = extent(grid.iter().flatten().copied());
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range.clone(), y_range.clone())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()?;

    if rows == 0 || cols == 0 {
        return Ok(());
    }
    let dx = (x_range.end - x_range.start) / cols as f64;
    let dy = (y_range.end - y_range.start) / rows as f64;
    let (x_start, y_start) = (x_range.start, y_range.start);
    chart.draw_series(grid.iter().enumerate().flat_map(|(r, row)| {
        row.iter().enumerate().map(move |(c, &v)| {
            let norm = if v.is_finite() { ((v - lo) / span).clamp(0.0, 1.0) } else { 0.0 };
            let x0 = x_start + c as f64 * dx;
            let y0 = y_start + r as f64 * dy;
            Rectangle::new(
                [(x0, y0), (x0 + dx, y0 + dy)],
                HSLColor(0.66 * (1.0 - norm), 0.85, 0.5).filled(),
            )
        })
    }))?;
    Ok(())
}
