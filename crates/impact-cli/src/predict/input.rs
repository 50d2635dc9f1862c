use anyhow::Result;
use clap::ArgMatches;
use std::path::PathBuf;

use impact_models::PipelinePaths;

use crate::util::{paths_from_arguments, validate_csv_file};

#[derive(Debug, Clone)]
pub struct PredictArgs {
    pub paths: PipelinePaths,
    /// Feature CSV to score; the built-in sample event is used when absent.
    pub input: Option<PathBuf>,
    /// Where to write the JSON results; stdout when absent.
    pub output: Option<PathBuf>,
}

impl PredictArgs {
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let input = matches.get_one::<PathBuf>("input").cloned();
        if let Some(path) = &input {
            validate_csv_file(path)?;
        }
        Ok(Self {
            paths: paths_from_arguments(matches),
            input,
            output: matches.get_one::<PathBuf>("output").cloned(),
        })
    }
}
