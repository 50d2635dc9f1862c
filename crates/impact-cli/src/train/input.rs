use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

use impact_models::{PipelinePaths, TrainingConfig};

use crate::util::paths_from_arguments;

#[derive(Debug, Clone)]
pub struct TrainArgs {
    pub paths: PipelinePaths,
    pub config: TrainingConfig,
}

impl TrainArgs {
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(config_path) => TrainingConfig::from_json_file(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?,
            None => TrainingConfig::default(),
        };

        // Apply CLI overrides
        if matches.get_flag("no_report") {
            config.write_report = false;
        }

        Ok(Self {
            paths: paths_from_arguments(matches),
            config,
        })
    }
}
