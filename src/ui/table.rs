use eframe::egui::{self, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use super::display_value;
use crate::data::aggregate::{Distribution, PERCENT_COLUMN};
use crate::data::model::RecordSet;

const ROW_HEIGHT: f32 = 18.0;

/// First `rows` rows of a dataset, one column per field.
pub fn preview(ui: &mut Ui, id: &str, dataset: &RecordSet, rows: usize) {
    let head = dataset.head(rows);
    ui.push_id(id, |ui: &mut Ui| {
        ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .vscroll(false)
                .columns(Column::auto().at_least(48.0), dataset.columns.len())
                .header(ROW_HEIGHT + 2.0, |mut header| {
                    for name in &dataset.columns {
                        header.col(|ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(ROW_HEIGHT, head.len(), |mut row| {
                        let record = &head[row.index()];
                        for cell in record {
                            row.col(|ui| {
                                ui.label(display_value(cell));
                            });
                        }
                    });
                });
        });
    });
}

/// Category / percent table for a distribution.
pub fn distribution(ui: &mut Ui, id: &str, dist: &Distribution) {
    egui::Grid::new(id)
        .striped(true)
        .num_columns(2)
        .show(ui, |ui: &mut Ui| {
            ui.strong(dist.column.as_str());
            ui.strong(PERCENT_COLUMN);
            ui.end_row();
            for (category, share) in dist.entries() {
                ui.label(display_value(category));
                ui.label(format!("{share:.2}"));
                ui.end_row();
            }
        });
    ui.label(
        egui::RichText::new(format!("{} rows counted", dist.counted))
            .small()
            .weak(),
    );
}
