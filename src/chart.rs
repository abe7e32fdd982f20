// src/chart.rs
use plotters::prelude::*;

use crate::{error::AppError, models::Choice};

const SIZE: (u32, u32) = (640, 480);
const BAR_COLOR: RGBColor = RGBColor(226, 74, 51);
const MAX_LABEL_CHARS: usize = 20;

/// Draws one bar per choice (x = choice text, y = votes) and returns the SVG document.
///
/// Expects at least one choice.
pub fn votes_histogram(choices: &[Choice]) -> Result<String, AppError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let bars = choices.len() as u32;
        let max_votes = choices
            .iter()
            .map(|c| c.votes.max(0) as u32)
            .max()
            .unwrap_or(0);

        let mut chart = ChartBuilder::on(&root)
            .caption("Votes Distribution", ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(140)
            .y_label_area_size(50)
            .build_cartesian_2d((0u32..bars).into_segmented(), 0u32..max_votes + 1)
            .map_err(chart_error)?;

        let label = |value: &SegmentValue<u32>| match value {
            SegmentValue::CenterOf(i) => choices
                .get(*i as usize)
                .map(|c| tick_label(&c.choice_text))
                .unwrap_or_default(),
            _ => String::new(),
        };

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(choices.len())
            .x_label_formatter(&label)
            .x_label_style(
                ("sans-serif", 12)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .x_desc("Choices")
            .y_desc("Votes")
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(choices.iter().zip(0u32..).map(|(choice, i)| {
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(i), 0),
                        (SegmentValue::Exact(i + 1), choice.votes.max(0) as u32),
                    ],
                    BAR_COLOR.filled(),
                );
                bar.set_margin(0, 0, 6, 6);
                bar
            }))
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }

    Ok(svg)
}

/// Choice text shortened so rotated ticks fit under the axis.
fn tick_label(text: &str) -> String {
    if text.chars().count() <= MAX_LABEL_CHARS {
        return text.to_string();
    }
    let mut label: String = text.chars().take(MAX_LABEL_CHARS - 1).collect();
    label.push('…');
    label
}

fn chart_error(e: impl std::fmt::Display) -> AppError {
    AppError::Chart(e.to_string())
}
