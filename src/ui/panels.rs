use std::path::Path;

use anyhow::{Context, Result, anyhow};
use eframe::egui::{self, Color32, RichText, ScrollArea, Slider, Ui};

use super::display_value;
use super::{plot, table};
use crate::chart::ChartKind;
use crate::config::FilterColumn;
use crate::data::export::ExportFormat;
use crate::data::filter::{Choice, is_wildcard};
use crate::state::{Download, Phase, SessionState, Side};

// ---------------------------------------------------------------------------
// Left side panel – filter form
// ---------------------------------------------------------------------------

/// Render the filter form. Edits only touch the pending filters; nothing is
/// recomputed until Apply is pressed.
pub fn side_panel(ui: &mut Ui, state: &mut SessionState) {
    ui.heading("Filters");
    ui.separator();

    if state.baseline().is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Chart type ----
            ui.strong("Chart type");
            ui.horizontal(|ui: &mut Ui| {
                for kind in ChartKind::ALL {
                    ui.radio_value(&mut state.pending_chart, kind, kind.label());
                }
            });
            ui.separator();

            range_slider(ui, state);
            ui.separator();

            // ---- Per-column multi-selects (collapsible) ----
            let columns = state.config.filter_columns.clone();
            for column in &columns {
                multiselect(ui, state, column);
            }
            ui.separator();

            ui.horizontal(|ui: &mut Ui| {
                if ui.button("Apply").clicked() {
                    state.submit();
                }
                if ui.button("Reset").clicked() {
                    state.reset_filters();
                }
            });
        });
}

fn range_slider(ui: &mut Ui, state: &mut SessionState) {
    let Some((lo, hi)) = state.range_bounds() else {
        return;
    };
    let (mut min, mut max) = state
        .pending
        .range
        .as_ref()
        .map(|r| (r.min.round() as i64, r.max.round() as i64))
        .unwrap_or((lo, hi));

    ui.strong(format!("{} range", state.config.range_column));
    let min_changed = ui
        .add(Slider::new(&mut min, lo..=hi).text("min"))
        .changed();
    let max_changed = ui
        .add(Slider::new(&mut max, lo..=hi).text("max"))
        .changed();

    if min_changed || max_changed {
        // dragging one handle past the other pushes it along
        if min_changed && min > max {
            max = min;
        }
        if max_changed && max < min {
            min = max;
        }
        state.set_range(min as f64, max as f64);
    }
}

fn multiselect(ui: &mut Ui, state: &mut SessionState, column: &FilterColumn) {
    let Some(values) = state.options_for(&column.name).cloned() else {
        return;
    };
    let selected = state
        .pending
        .selection(&column.name)
        .cloned()
        .unwrap_or_default();
    let wildcard_label = state.config.wildcard_label.clone();

    let summary = if is_wildcard(&selected) {
        wildcard_label.clone()
    } else {
        format!("{}/{}", selected.len(), values.len())
    };
    let header_text = format!("{}  ({summary})", column.label);

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(&column.name)
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let entries = std::iter::once((Choice::All, wildcard_label))
                .chain(values.iter().map(|v| (Choice::Only(v.clone()), display_value(v))));

            let mut toggled = Vec::new();
            for (choice, label) in entries {
                let mut checked = selected.contains(&choice);
                if ui.checkbox(&mut checked, label).changed() {
                    toggled.push(choice);
                }
            }
            for choice in &toggled {
                state.toggle_choice(&column.name, choice);
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut SessionState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        match (&state.upload, state.baseline()) {
            (Some(upload), Some(ds)) => {
                let after = state.filtered().map_or(0, |f| f.len());
                ui.label(format!(
                    "{} ({:.1} KiB): {} rows loaded, {} after filters",
                    upload.name,
                    upload.size as f64 / 1024.0,
                    ds.len(),
                    after
                ));
            }
            _ => {
                ui.label("No file loaded");
            }
        }

        ui.separator();
        let phase = match state.phase() {
            Phase::Idle => "idle",
            Phase::Loaded => "loaded",
            Phase::Filtered => "filtered",
        };
        ui.label(RichText::new(phase).weak());
    });
}

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Messages, before/after previews, distributions, charts and downloads.
pub fn central_panel(ui: &mut Ui, state: &mut SessionState) {
    ui.heading("Telemarketing analysis");
    ui.separator();

    messages(ui, state);

    let Some(baseline) = state.baseline().cloned() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Waiting for a CSV or XLSX upload  (File → Open… or drop a file)");
        });
        return;
    };
    let preview_rows = state.config.preview_rows;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.strong("Data before filters");
            table::preview(ui, "preview_raw", &baseline, preview_rows);
            ui.add_space(8.0);

            if let Some(filtered) = state.filtered().cloned() {
                ui.strong(format!("Data after filters ({} rows)", filtered.len()));
                if filtered.is_empty() {
                    ui.label(RichText::new("No rows match the current filters.").italics());
                } else {
                    table::preview(ui, "preview_filtered", &filtered, preview_rows);
                }
                if ui.button("📥 Download filtered data (CSV)").clicked() {
                    let download = state.export_data(ExportFormat::Csv);
                    save_download(state, download);
                }
                if ui.button("📥 Download filtered data (XLSX)").clicked() {
                    let download = state.export_data(ExportFormat::Xlsx);
                    save_download(state, download);
                }
            }
            ui.separator();

            ui.columns(2, |cols| {
                cols[0].strong("Original proportion");
                if let Some(dist) = state.baseline_distribution() {
                    table::distribution(&mut cols[0], "dist_raw", dist);
                }
                cols[1].strong("Proportion after filters");
                match state.filtered_distribution() {
                    Some(dist) => table::distribution(&mut cols[1], "dist_filtered", dist),
                    None => {
                        cols[1].label("No data for the current filters.");
                    }
                }
            });
            ui.horizontal(|ui: &mut Ui| {
                if ui.button("📥 Download original proportion").clicked() {
                    let download = state.export_distribution(Side::Baseline);
                    save_download(state, download);
                }
                if ui.button("📥 Download filtered proportion").clicked() {
                    let download = state.export_distribution(Side::Filtered);
                    save_download(state, download);
                }
            });
            ui.separator();

            ui.heading("Acceptance proportion");
            plot::comparison(ui, state);
            if ui.button("📥 Download chart").clicked() {
                let download = state.export_chart();
                save_download(state, download);
            }
        });
}

fn messages(ui: &mut Ui, state: &mut SessionState) {
    if state.messages().is_empty() {
        return;
    }
    for message in state.messages() {
        ui.label(RichText::new(message).color(Color32::RED));
    }
    if ui.small_button("Dismiss").clicked() {
        state.dismiss_messages();
    }
    ui.separator();
}

// ---------------------------------------------------------------------------
// File dialogs and drag-and-drop
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut SessionState) {
    let file = rfd::FileDialog::new()
        .set_title("Open bank marketing data")
        .add_filter("Supported files", &["csv", "txt", "xlsx", "xls", "ods"])
        .add_filter("CSV", &["csv", "txt"])
        .add_filter("Excel", &["xlsx", "xls"])
        .pick_file();

    if let Some(path) = file {
        upload_path(state, &path);
    }
}

/// Read a file from disk and run an upload cycle with its bytes.
pub fn upload_path(state: &mut SessionState, path: &Path) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match std::fs::read(path) {
        Ok(bytes) => state.upload(&name, &bytes),
        Err(e) => {
            log::error!("Failed to read {}: {e}", path.display());
            state.report(format!("Could not read {name}: {e}"));
        }
    }
}

/// Upload the first file dropped onto the window, if any.
pub fn handle_dropped_files(ctx: &egui::Context, state: &mut SessionState) {
    let dropped = ctx.input(|i| i.raw.dropped_files.clone());
    let Some(file) = dropped.into_iter().next() else {
        return;
    };
    if let Some(bytes) = &file.bytes {
        state.upload(&file.name, bytes);
    } else if let Some(path) = &file.path {
        upload_path(state, path);
    } else {
        state.report(format!("Dropped file {} has no readable content", file.name));
    }
}

fn save_download(state: &mut SessionState, download: Option<Download>) {
    let Some(download) = download else {
        return;
    };
    let target = rfd::FileDialog::new()
        .set_title("Save download")
        .set_file_name(&download.file_name)
        .save_file();
    if let Some(path) = target {
        if let Err(e) = write_download(&path, &download) {
            log::error!("{e:#}");
            state.report(format!("{e:#}"));
        }
    }
}

fn write_download(path: &Path, download: &Download) -> Result<()> {
    if download.bytes.is_empty() {
        return Err(anyhow!("{} is empty", download.file_name));
    }
    std::fs::write(path, download.bytes.as_slice())
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!(
        "Saved {} ({}, {} bytes) to {}",
        download.file_name,
        download.mime,
        download.bytes.len(),
        path.display()
    );
    Ok(())
}
