use tracing::Level;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(debug_assertions)]
const DEFAULT_LEVEL: Level = Level::DEBUG;
#[cfg(not(debug_assertions))]
const DEFAULT_LEVEL: Level = Level::INFO;

fn target_filter() -> filter::Targets {
    filter::Targets::new()
        .with_default(DEFAULT_LEVEL)
        .with_target("wgpu_core", Level::WARN)
        // Workaround for https://github.com/gfx-rs/wgpu/issues/6043
        .with_target("wgpu_core::device::resource", Level::WARN)
        .with_target("wgpu_hal", Level::WARN)
        .with_target("naga", Level::INFO)
        .with_target("gltf", Level::INFO)
        .with_target("lib_geometry::orbit", Level::DEBUG)
}

/// Installs the global subscriber. Calling it a second time has no effect.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logger() {
    // A layer that logs events to stdout using the human-readable "pretty" format.
    let logger = tracing_subscriber::fmt::layer().pretty();

    let result = tracing_subscriber::registry()
        .with(logger)
        .with(target_filter())
        .with(tracing::level_filters::LevelFilter::from_level(DEFAULT_LEVEL))
        .try_init();
    if let Err(error) = result {
        tracing::debug!("logger already installed: {error}");
    }
}

/// Installs the panic hook and the global subscriber writing to the browser console. Calling it a
/// second time has no effect.
#[cfg(target_arch = "wasm32")]
pub fn init_logger() {
    console_error_panic_hook::set_once();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false) // Only partially supported across browsers
        .without_time() // std::time is not available in browsers
        .with_writer(tracing_web::MakeWebConsoleWriter::new()); // write events to the console
    let perf_layer = tracing_web::performance_layer()
        .with_details_from_fields(tracing_subscriber::fmt::format::Pretty::default());

    let result = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(perf_layer)
        .with(target_filter())
        .try_init();
    if let Err(error) = result {
        tracing::debug!("logger already installed: {error}");
    }
}
