use std::f64::consts::TAU;

use eframe::egui::{Color32, RichText, Stroke, Ui};
use egui_plot::{Bar, BarChart, Legend, Plot, PlotPoint, PlotPoints, Polygon, Text};

use crate::chart::{ChartKind, wedge_outline};
use crate::color::ColorMap;
use crate::data::aggregate::Distribution;
use crate::state::SessionState;

const PLOT_HEIGHT: f32 = 260.0;

// ---------------------------------------------------------------------------
// Before / after comparison (central panel)
// ---------------------------------------------------------------------------

/// Render the baseline and filtered distributions next to each other using
/// the chart kind of the last applied cycle.
pub fn comparison(ui: &mut Ui, state: &SessionState) {
    let (Some(baseline), Some(colors)) = (state.baseline_distribution(), state.colors()) else {
        return;
    };
    let kind = state.applied_chart();

    ui.columns(2, |cols| {
        cols[0].strong("Raw data");
        draw(&mut cols[0], "chart_raw", baseline, kind, colors);

        cols[1].strong("Filtered data");
        match state.filtered_distribution() {
            Some(dist) => draw(&mut cols[1], "chart_filtered", dist, kind, colors),
            None => {
                cols[1].label(RichText::new("No data for the current filters").italics());
            }
        }
    });
}

fn draw(ui: &mut Ui, id: &str, dist: &Distribution, kind: ChartKind, colors: &ColorMap) {
    match kind {
        ChartKind::Bar => bars(ui, id, dist, colors),
        ChartKind::Pie => pie(ui, id, dist, colors),
    }
}

fn bars(ui: &mut Ui, id: &str, dist: &Distribution, colors: &ColorMap) {
    let labels: Vec<String> = dist.entries().map(|(k, _)| k.to_string()).collect();
    let chart_bars: Vec<Bar> = dist
        .entries()
        .enumerate()
        .map(|(i, (k, v))| {
            Bar::new(i as f64, v)
                .name(k.to_string())
                .fill(colors.color_for(k))
                .width(0.6)
        })
        .collect();
    let chart = BarChart::new(chart_bars).name(dist.column.as_str());
    let top = dist.entries().map(|(_, v)| v).fold(0.0, f64::max).max(1.0) * 1.15;

    Plot::new(id)
        .height(PLOT_HEIGHT)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .include_y(0.0)
        .include_y(top)
        .y_axis_label("percent")
        .x_axis_label(dist.column.as_str())
        .x_axis_formatter(move |mark, _range| {
            let i = mark.value.round();
            if (mark.value - i).abs() > f64::EPSILON || i < 0.0 {
                return String::new();
            }
            labels.get(i as usize).cloned().unwrap_or_default()
        })
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(chart);
            for (i, (_, v)) in dist.entries().enumerate() {
                plot_ui.text(Text::new(
                    PlotPoint::new(i as f64, v + top * 0.04),
                    RichText::new(format!("{v:.2}")).strong(),
                ));
            }
        });
}

/// Wedges are built as polygons; egui_plot has no pie primitive.
fn pie(ui: &mut Ui, id: &str, dist: &Distribution, colors: &ColorMap) {
    let total = dist.total();
    if total <= 0.0 {
        return;
    }

    Plot::new(id)
        .height(PLOT_HEIGHT)
        .data_aspect(1.0)
        .show_axes([false, false])
        .show_grid([false, false])
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            let mut start = 0.0;
            for (k, v) in dist.entries() {
                let sweep = v / total * TAU;
                let name = k.to_string();
                plot_ui.polygon(
                    Polygon::new(wedge(start, sweep))
                        .fill_color(colors.color_for(k))
                        .stroke(Stroke::new(1.0, Color32::WHITE))
                        .name(&name),
                );

                let mid = start + sweep / 2.0;
                plot_ui.text(Text::new(
                    PlotPoint::new(0.6 * mid.cos(), 0.6 * mid.sin()),
                    RichText::new(pie_label(&name, v / total * 100.0)).color(Color32::BLACK),
                ));
                start += sweep;
            }
        });
}

fn wedge(start: f64, sweep: f64) -> PlotPoints<'static> {
    wedge_outline(start, sweep)
        .into_iter()
        .map(|(x, y)| [x, y])
        .collect()
}

/// Category name over its share with two decimals.
fn pie_label(name: &str, percent: f64) -> String {
    format!("{name}\n{percent:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pie_labels_use_two_decimals() {
        assert_eq!(pie_label("yes", 200.0 / 3.0), "yes\n66.67");
        assert_eq!(pie_label("no", 50.0), "no\n50.00");
    }

    #[test]
    fn wedge_follows_the_shared_outline() {
        let points = wedge(0.0, TAU / 3.0);
        let outline = wedge_outline(0.0, TAU / 3.0);
        assert_eq!(points.points().len(), outline.len());
        assert_eq!(points.points()[0].x, 0.0);
    }
}
