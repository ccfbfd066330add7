//! Browser entry points of the model viewer.
#![cfg(target_family = "wasm")]

mod error;
mod handle;
mod web_host;

use tracing::info;
use wasm_bindgen::prelude::*;

pub use handle::ModelViewerHandle;

/// Installs the panic hook and the console logger. Safe to call more than once.
#[wasm_bindgen]
pub fn init() {
    viewer_framework::logging::init_logger();
    info!("model viewer initialized");
}

#[wasm_bindgen(start)]
fn start() {
    init();
}
