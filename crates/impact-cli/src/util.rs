use anyhow::Result;
use clap::ArgMatches;
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use impact_models::PipelinePaths;

pub fn validate_csv_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("csv") => {}
        _ => anyhow::bail!("File must have a .csv extension: {}", path.display()),
    }

    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    Ok(())
}

/// Directory overrides shared by every subcommand, resolved against the
/// installation root.
pub fn paths_from_arguments(matches: &ArgMatches) -> PipelinePaths {
    PipelinePaths::resolve(
        &PipelinePaths::install_root(),
        matches.get_one::<PathBuf>("data_dir").cloned(),
        matches.get_one::<PathBuf>("model_dir").cloned(),
        matches.get_one::<PathBuf>("reports_dir").cloned(),
    )
}

pub fn write_bytes_to_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}
