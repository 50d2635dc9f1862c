use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use impact_cli::predict::{self, input::PredictArgs};
use impact_cli::train::{self, input::TrainArgs};

fn directory_args() -> [Arg; 3] {
    [
        Arg::new("data_dir")
            .short('d')
            .long("data-dir")
            .help("Directory holding features.csv and targets.csv. Defaults to <root>/data/input.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("model_dir")
            .short('m')
            .long("model-dir")
            .help("Directory for model artifacts. Defaults to <root>/models.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("reports_dir")
            .short('r')
            .long("reports-dir")
            .help("Directory for metrics, figures and the HTML report. Defaults to <root>/reports.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
    ]
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("IMPACT_LOG", "error,impact=info"))
        .init();

    let matches = Command::new("impact")
        .version(clap::crate_version!())
        .about("Disaster impact severity and loss prediction with per-prediction explanations")
        .after_help("<root> is $IMPACT_HOME when set, otherwise the current directory.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train the severity classifier and the four outcome regressors")
                .args(directory_args())
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Path to a JSON training configuration. Unset fields take their defaults.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict severity, outcomes and top factors with the trained models")
                .args(directory_args())
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("Feature CSV to predict for. Defaults to a built-in sample event.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Path to write the JSON predictions. Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let args = TrainArgs::from_arguments(matches)?;
    log::info!("[Impact::Train] Data directory: {:?}", args.paths.data_dir);

    match train::run(&args) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let args = PredictArgs::from_arguments(matches)?;
    log::info!("[Impact::Predict] Model directory: {:?}", args.paths.model_dir);
    predict::run(&args)?;
    Ok(())
}
