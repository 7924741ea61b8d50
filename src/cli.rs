//! Command line arguments.

use crate::config::{ClassifierType, Config, EncoderType};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Predict which comments moderators removed from sentence or LSI encodings
#[derive(Parser, Debug, Clone)]
#[command(name = "comment-removal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Directory for cached encodings, models and plots
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "CSV")]
    pub train_file: Option<PathBuf>,

    #[arg(long, global = true, value_name = "CSV")]
    pub test_file: Option<PathBuf>,

    #[arg(long, global = true, value_name = "TSV")]
    pub predictions_file: Option<PathBuf>,

    /// Text encoder (LASER or LSI)
    #[arg(short, long, global = true)]
    pub encoder: Option<EncoderType>,

    /// Classifier (randomforest, svc or mlp)
    #[arg(long, global = true, env = "COMMENT_CLASSIFIER")]
    pub classifier: Option<ClassifierType>,

    /// Base name of the saved model file
    #[arg(long, global = true)]
    pub clf_save_name: Option<String>,

    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Encode in batches instead of one comment at a time
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Encode (or load cached encodings), fit, save and evaluate
    Train,
    /// Only populate the encoding cache
    Encode,
    /// Evaluate the saved model on the test split
    Evaluate,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Train)
    }

    /// Overlay command line values onto a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(workdir) = &self.workdir {
            config.output.workdir = workdir.clone();
        }
        if let Some(path) = &self.train_file {
            config.data.train_file = path.clone();
        }
        if let Some(path) = &self.test_file {
            config.data.test_file = path.clone();
        }
        if let Some(path) = &self.predictions_file {
            config.output.predictions_file = path.clone();
        }
        if let Some(encoder) = self.encoder {
            config.encoder.encoder_type = encoder;
        }
        if let Some(classifier) = self.classifier {
            config.classifier.clf_type = classifier;
        }
        if let Some(name) = &self.clf_save_name {
            config.output.clf_save_name = name.clone();
        }
        if let Some(seed) = self.seed {
            config.classifier.random_seed = seed;
        }
        if self.parallel {
            config.encoder.parallel = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_train() {
        let cli = Cli::parse_from(["comment-removal"]);
        assert_eq!(cli.command(), Command::Train);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "comment-removal",
            "evaluate",
            "--encoder",
            "lsi",
            "--classifier",
            "svc",
            "--workdir",
            "/tmp/work",
            "--seed",
            "7",
            "-vv",
        ]);
        assert_eq!(cli.command(), Command::Evaluate);
        assert_eq!(cli.verbose, 2);

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.encoder.encoder_type, EncoderType::Lsi);
        assert_eq!(config.classifier.clf_type, ClassifierType::Svc);
        assert_eq!(config.output.workdir, PathBuf::from("/tmp/work"));
        assert_eq!(config.classifier.random_seed, 7);
        assert!(!config.encoder.parallel);
    }

    #[test]
    fn test_rejects_unknown_classifier() {
        assert!(Cli::try_parse_from(["comment-removal", "--classifier", "knn"]).is_err());
    }
}
