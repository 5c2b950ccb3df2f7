use std::f64::consts::TAU;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::color::ColorMap;
use crate::config::ChartConfig;
use crate::data::aggregate::Distribution;

/// How the before/after distributions are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartKind {
    #[default]
    Bar,
    Pie,
}

impl ChartKind {
    pub const ALL: [ChartKind; 2] = [ChartKind::Bar, ChartKind::Pie];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar",
            ChartKind::Pie => "Pie",
        }
    }

    /// Suggested download name.
    pub fn file_name(self) -> String {
        format!("chart_{}.png", self.label().to_ascii_lowercase())
    }
}

type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Rasterise the baseline and filtered distributions side by side as PNG.
///
/// The canvas is `width_in x height_in` inches at `dpi`, drawn edge to edge.
pub fn render_png(
    baseline: &Distribution,
    filtered: &Distribution,
    kind: ChartKind,
    colors: &ColorMap,
    config: &ChartConfig,
) -> Result<Vec<u8>> {
    let (width, height) = config.pixel_size();
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).context("clearing canvas")?;

        let scale = Scale(config.dpi);
        let panels = root.split_evenly((1, 2));
        for (panel, (title, dist)) in panels
            .iter()
            .zip([("Raw data", baseline), ("Filtered data", filtered)])
        {
            let drawn = match kind {
                ChartKind::Bar => draw_bars(panel, title, dist, colors, scale),
                ChartKind::Pie => draw_pie(panel, title, dist, colors, scale),
            };
            drawn.with_context(|| format!("drawing '{title}' panel"))?;
        }
        root.present().context("finishing raster")?;
    }

    log::info!(
        "Rendered {} chart at {width}x{height} ({} dpi)",
        kind.label(),
        config.dpi
    );
    encode_png(&buffer, width, height, config.dpi)
}

/// Converts typographic points to pixels at the configured DPI.
#[derive(Debug, Clone, Copy)]
struct Scale(u32);

impl Scale {
    fn px(self, points: f64) -> u32 {
        (points * self.0 as f64 / 72.0).round().max(1.0) as u32
    }
}

fn rgb(colors: &ColorMap, value: &crate::data::model::Value) -> RGBColor {
    let (r, g, b) = colors.rgb_for(value);
    RGBColor(r, g, b)
}

fn draw_bars(
    panel: &Panel<'_>,
    title: &str,
    dist: &Distribution,
    colors: &ColorMap,
    scale: Scale,
) -> Result<()> {
    let labels: Vec<String> = dist.entries().map(|(k, _)| k.to_string()).collect();
    let n = labels.len() as i32;
    // headroom above the tallest bar for its value label
    let top = dist.entries().map(|(_, v)| v).fold(0.0, f64::max).max(1.0) * 1.15;

    let mut chart = ChartBuilder::on(panel)
        .caption(
            title,
            ("sans-serif", scale.px(14.0))
                .into_font()
                .style(FontStyle::Bold),
        )
        .margin(scale.px(8.0))
        .x_label_area_size(scale.px(28.0))
        .y_label_area_size(scale.px(36.0))
        .build_cartesian_2d((0..n).into_segmented(), 0f64..top)?;

    let format_category = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(RGBColor(211, 211, 211).mix(0.6))
        .x_desc(dist.column.as_str())
        .y_desc("percent")
        .x_label_formatter(&format_category)
        .label_style(("sans-serif", scale.px(10.0)))
        .axis_desc_style(("sans-serif", scale.px(12.0)))
        .draw()?;

    let gap = scale.px(12.0);
    chart.draw_series(dist.entries().enumerate().map(|(i, (k, v))| {
        let i = i as i32;
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), v)],
            rgb(colors, k).filled(),
        );
        bar.set_margin(0, 0, gap, gap);
        bar
    }))?;

    let value_style = TextStyle::from(("sans-serif", scale.px(10.0)).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    chart.draw_series(dist.entries().enumerate().map(|(i, (_, v))| {
        Text::new(
            format!("{v:.2}"),
            (SegmentValue::CenterOf(i as i32), v),
            value_style.clone(),
        )
    }))?;

    Ok(())
}

fn draw_pie(
    panel: &Panel<'_>,
    title: &str,
    dist: &Distribution,
    colors: &ColorMap,
    scale: Scale,
) -> Result<()> {
    let area = panel.titled(
        title,
        ("sans-serif", scale.px(14.0))
            .into_font()
            .style(FontStyle::Bold),
    )?;
    let (w, h) = area.dim_in_pixel();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.38;
    // y grows downwards on the raster, so angles are flipped to run
    // counter-clockwise on screen
    let to_pixel = |(x, y): (f64, f64), r: f64| ((cx + x * r) as i32, (cy - y * r) as i32);

    let total = dist.total();
    if total <= 0.0 {
        return Ok(());
    }

    let name_style = ("sans-serif", scale.px(11.0))
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    let value_style = ("sans-serif", scale.px(10.0))
        .into_font()
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));

    let mut start = 0.0;
    for (category, share) in dist.entries() {
        let sweep = share / total * TAU;
        let outline: Vec<(i32, i32)> = wedge_outline(start, sweep)
            .into_iter()
            .map(|p| to_pixel(p, radius))
            .collect();
        area.draw(&Polygon::new(outline.clone(), rgb(colors, category).filled()))?;
        area.draw(&PathElement::new(outline, WHITE.stroke_width(scale.px(1.0))))?;

        let mid = start + sweep / 2.0;
        let direction = (mid.cos(), mid.sin());
        area.draw(&Text::new(
            category.to_string(),
            to_pixel(direction, radius * 1.15),
            name_style.clone(),
        ))?;
        area.draw(&Text::new(
            format!("{:.2}", share / total * 100.0),
            to_pixel(direction, radius * 0.6),
            value_style.clone(),
        ))?;
        start += sweep;
    }
    Ok(())
}

/// Closed outline of a unit-circle wedge from `start` spanning `sweep`
/// radians: the centre, then one vertex per degree along the arc.
pub fn wedge_outline(start: f64, sweep: f64) -> Vec<(f64, f64)> {
    let steps = (sweep.to_degrees().ceil() as usize).max(2);
    std::iter::once((0.0, 0.0))
        .chain((0..=steps).map(|s| {
            let a = start + sweep * s as f64 / steps as f64;
            (a.cos(), a.sin())
        }))
        .collect()
}

/// Pixels per metre for the PNG `pHYs` chunk.
fn dots_per_metre(dpi: u32) -> u32 {
    (dpi as f64 / 0.0254).round() as u32
}

fn encode_png(buffer: &[u8], width: u32, height: u32, dpi: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let ppm = dots_per_metre(dpi);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header().context("writing PNG header")?;
        writer
            .write_image_data(buffer)
            .context("encoding PNG")?;
        writer.finish().context("finishing PNG")?;
    }
    Ok(out)
}
