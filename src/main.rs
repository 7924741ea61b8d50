use clap::Parser;
use comment_removal::cli::{Cli, Command};
use comment_removal::config::Config;
use comment_removal::{logging, pipeline};
use std::error::Error;
use tracing::{error, warn};

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::load(&cli.config).unwrap_or_else(|e| {
        warn!("Could not load {}: {}", cli.config.display(), e);
        warn!("Using default configuration");
        Config::default()
    });
    cli.apply(&mut config);

    let outcome = match cli.command() {
        Command::Train => pipeline::run_train(&config).map(|report| {
            println!("\nTest accuracy: {:.2}%", report.score * 100.0);
            println!("ROC AUC: {:.4}", report.roc_auc);
        }),
        Command::Encode => pipeline::run_encode(&config).map(|(train, test)| {
            println!("Train inputs: {:?}", train.x.dim());
            println!("Test inputs:  {:?}", test.x.dim());
        }),
        Command::Evaluate => pipeline::run_evaluate(&config).map(|report| {
            println!("\nTest accuracy: {:.2}%", report.score * 100.0);
            println!("ROC AUC: {:.4}", report.roc_auc);
        }),
    };

    if let Err(e) = &outcome {
        error!("{}", e);
    }
    Ok(outcome?)
}
