mod app;
mod widgets;
mod window;

use anyhow::Context;
use app::RollcallApplication;
use gtk4::glib;
use gtk4::prelude::*;
use libadwaita as adw;
use log::error;
use rollcall_core::{RecognitionController, RollcallConfig};

fn build_controller(config: &RollcallConfig) -> anyhow::Result<RecognitionController> {
    rollcall_core::opencv_controller(config).with_context(|| {
        format!(
            "Failed to load face models ({} and {})",
            config.detection.cascade_path.display(),
            config.recognition.model_path.display()
        )
    })
}

fn main() -> glib::ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let config = RollcallConfig::load_default();

    // Models are required; there is nothing to show without them.
    let controller = match build_controller(&config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("{:#}", e);
            return glib::ExitCode::FAILURE;
        }
    };

    adw::init().expect("Failed to initialize Libadwaita");
    let app = RollcallApplication::new(config, controller);
    app.run()
}
