use comment_removal::cache::CachePaths;
use comment_removal::classifiers::load_model;
use comment_removal::config::{ClassifierType, Config, EncoderType};
use comment_removal::pipeline::{run_encode, run_evaluate, run_train};
use comment_removal::Classifier;
use std::fmt::Write as _;
use std::path::Path;

const SPAM: &[&str] = &[
    "buy cheap pills online now",
    "click this link for free money",
    "cheap pills discount click now",
    "free money click link today",
    "discount pills buy cheap today",
];

const KEPT: &[&str] = &[
    "great article thanks for sharing",
    "interesting discussion about the election results",
    "thanks for the thoughtful article",
    "the election discussion was interesting",
    "sharing this great discussion with friends",
];

fn write_csv(path: &Path, rows: &[(&str, u8)]) {
    let mut body = String::from("BODY,REMOVED\n");
    for (text, label) in rows {
        writeln!(body, "{},{}", text, label).unwrap();
    }
    std::fs::write(path, body).unwrap();
}

fn setup(dir: &Path) -> Config {
    let mut train = Vec::new();
    for _ in 0..4 {
        train.extend(SPAM.iter().map(|t| (*t, 1)));
        train.extend(KEPT.iter().map(|t| (*t, 0)));
    }
    let test: Vec<(&str, u8)> = SPAM
        .iter()
        .map(|t| (*t, 1))
        .chain(KEPT.iter().map(|t| (*t, 0)))
        .collect();

    let train_file = dir.join("train.csv");
    let test_file = dir.join("test.csv");
    write_csv(&train_file, &train);
    write_csv(&test_file, &test);

    let mut config = Config::default();
    config.data.train_file = train_file;
    config.data.test_file = test_file;
    config.encoder.encoder_type = EncoderType::Lsi;
    config.encoder.num_topics = 4;
    config.classifier.n_estimators = 20;
    config.classifier.n_jobs = 2;
    config.classifier.hidden_layers = vec![16];
    config.classifier.max_epochs = 100;
    config.classifier.batch_size = 8;
    config.classifier.learning_rate = 0.01;
    config.classifier.early_stopping = false;
    config.output.workdir = dir.join("work");
    config.output.predictions_file = dir.join("work/predictions.tsv");
    config
}

#[test]
fn test_train_writes_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    let report = run_train(&config).unwrap();
    assert_eq!(report.predictions.len(), 10);
    assert!(report.score >= 0.9, "score was {}", report.score);
    assert!(report.roc_auc >= 0.9, "auc was {}", report.roc_auc);
    assert_eq!(report.roc_curves.len(), 3);

    let paths = CachePaths::new(&config.output.workdir, EncoderType::Lsi);
    assert!(paths.train.exists());
    assert!(paths.test.exists());
    assert!(config.output.workdir.join("lsi_model.json").exists());
    assert!(config.model_path().exists());
    assert!(config.roc_plot_path().exists());

    let tsv = std::fs::read_to_string(&config.output.predictions_file).unwrap();
    let lines: Vec<&str> = tsv.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[0], "ID\tBODY\tREMOVED\tPrediction");
    assert!(lines[1].starts_with("0\tbuy cheap pills online now\t1\t"));
}

#[test]
fn test_evaluate_reuses_saved_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    let trained = run_train(&config).unwrap();
    let evaluated = run_evaluate(&config).unwrap();
    assert_eq!(trained.predictions, evaluated.predictions);

    let model = load_model(&config.model_path()).unwrap();
    assert_eq!(model.kind(), ClassifierType::RandomForest);
}

#[test]
fn test_every_classifier_runs() {
    for kind in [ClassifierType::Svc, ClassifierType::Mlp] {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path());
        config.classifier.clf_type = kind;

        let report = run_train(&config).unwrap();
        assert_eq!(report.predictions.len(), 10);
        assert!(report.score >= 0.8, "{} scored {}", kind, report.score);
        assert!(config.model_path().ends_with(format!("comment_clf_{}.json", kind)));
    }
}

#[test]
fn test_encode_only_populates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    let (train, test) = run_encode(&config).unwrap();
    assert_eq!(train.x.dim(), (40, 4));
    assert_eq!(test.x.dim(), (10, 4));
    assert!(!config.model_path().exists());
    assert!(load_model(&config.model_path()).is_err());
    assert!(CachePaths::new(&config.output.workdir, EncoderType::Lsi).test.exists());
}

#[cfg(not(feature = "bert"))]
#[test]
fn test_sentence_encoder_requires_bert_feature() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path());
    config.encoder.encoder_type = EncoderType::Laser;

    let err = run_train(&config).unwrap_err();
    assert!(matches!(
        err,
        comment_removal::Error::EncoderUnavailable { .. }
    ));
}

#[test]
fn test_model_scores_cached_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run_train(&config).unwrap();

    let (_, test) = run_encode(&config).unwrap();
    let model = load_model(&config.model_path()).unwrap();
    assert!(model.score(&test.x, &test.y).unwrap() >= 0.9);
}
