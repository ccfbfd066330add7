//! Provides commands to assist with more complex builds and deployments

use std::process::ExitCode;

mod util;
mod wasm;
#[path = "tasks/web.rs"]
mod web;

const HELP: &str = "\
Usage: cargo xtask <command>

Commands:
  web [--release] [--no-serve]   build the viewer for the browser and serve the demo page
";

fn main() -> anyhow::Result<ExitCode> {
    use anyhow::Context;
    use pico_args::Arguments;
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_indent(Some(0))
        .init();

    let mut args = Arguments::from_env();
    let shell = xshell::Shell::new().context("Couldn't create xshell shell")?;
    let root_dir = format!("{}/..", env!("CARGO_MANIFEST_DIR"));
    shell.change_dir(root_dir);

    let Some(subcommand) = args.subcommand()? else {
        log::info!("{HELP}");
        return Ok(ExitCode::FAILURE);
    };

    match subcommand.as_str() {
        "web" => {
            web::run(&shell, args)?;
            Ok(ExitCode::SUCCESS)
        }
        unknown => {
            log::error!("unknown command: {unknown}\n{HELP}");
            Ok(ExitCode::FAILURE)
        }
    }
}
