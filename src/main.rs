mod app;
mod cache;
mod chart;
mod color;
mod config;
mod data;
mod error;
mod state;
mod ui;

use std::path::PathBuf;

use app::DashboardApp;
use config::DashboardConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = DashboardConfig::load_or_default();
    let mut app = DashboardApp::new(config);

    // optional file to open on start
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        ui::panels::upload_path(&mut app.state, &path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Telemarketing Analysis",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
