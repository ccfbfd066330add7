use std::{io, path::Path, process::Command};

use anyhow::Context;
use xshell::Shell;

pub(crate) struct Program {
    pub crate_name: &'static str,
    pub binary_name: &'static str,
}

pub(crate) fn check_all_programs(programs: &[Program]) -> anyhow::Result<()> {
    let mut failed_crates = Vec::new();
    for &Program {
        crate_name,
        binary_name,
    } in programs
    {
        let output = Command::new(binary_name).arg("--help").output();
        match output {
            Ok(_) => log::info!("found {binary_name} in PATH"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::error!("{binary_name} is missing in PATH");
                failed_crates.push(crate_name);
            }
            Err(error) => anyhow::bail!("cannot run {binary_name}: {error}"),
        }
    }

    if !failed_crates.is_empty() {
        log::error!(
            "Please install them with: cargo install {}",
            failed_crates.join(" ")
        );
        anyhow::bail!("Missing required programs");
    }

    Ok(())
}

/// Copies a file or a directory tree into `destination_path`.
pub(crate) fn copy(shell: &Shell, source_path: &Path, destination_path: &Path) -> anyhow::Result<()> {
    if source_path.is_dir() {
        let destination_path = &destination_path.join(
            source_path
                .file_name()
                .with_context(|| format!("invalid source path: {}", source_path.display()))?,
        );
        copy_content(shell, source_path, destination_path)
    } else {
        log::info!(
            "copying \"{}\" → \"{}\"",
            source_path.display(),
            destination_path.display()
        );
        shell
            .copy_file(source_path, destination_path)
            .with_context(|| {
                format!(
                    "Failed to copy file \"{}\" → \"{}\"",
                    source_path.display(),
                    destination_path.display()
                )
            })
    }
}

/// Copies everything inside the directory `source_path` into `destination_path`.
pub(crate) fn copy_content(
    shell: &Shell,
    source_path: &Path,
    destination_path: &Path,
) -> anyhow::Result<()> {
    shell.create_dir(destination_path).with_context(|| {
        format!(
            "failed to create destination path: {}",
            destination_path.display()
        )
    })?;

    let files = shell
        .read_dir(source_path)
        .with_context(|| format!("Failed to enumerate files in {}", source_path.display()))?;
    for file in files {
        copy(shell, &file, destination_path)?;
    }

    Ok(())
}
