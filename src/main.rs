//! Binary classifier CLI
//!
//! Train, evaluate and run the feed-forward classifier on CSV feature files.

use clap::{Parser, Subcommand};
use encoder_classifier::{Config, Result};

#[derive(Parser)]
#[command(name = "classifier")]
#[command(about = "Binary classification with a feed-forward network", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Train the classifier on the configured train/val files
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override learning rate
        #[arg(long)]
        lr: Option<f64>,
        /// Override batch size
        #[arg(long)]
        batch_size: Option<usize>,
        /// Optimizer: adam or sgd
        #[arg(long)]
        optimizer: Option<String>,
    },
    /// Report loss and accuracy of the saved model on a labelled CSV
    Evaluate {
        /// Labelled CSV (defaults to the validation file)
        data: Option<String>,
    },
    /// Score an unlabelled CSV with the saved model
    Predict {
        /// Feature CSV
        data: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Train {
            epochs,
            lr,
            batch_size,
            optimizer,
        } => commands::train(&config, epochs, lr, batch_size, optimizer),
        Commands::Evaluate { data } => commands::evaluate(&config, data),
        Commands::Predict { data, format } => commands::predict(&config, &data, format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use std::path::Path;

    use burn::backend::Autodiff;
    use burn::module::AutodiffModule;
    use burn::optim::{AdamConfig, Optimizer, SgdConfig};
    use encoder_classifier::data::csv;
    use encoder_classifier::data::{ClassificationDataset, FeatureTransform, Standardize};
    use encoder_classifier::model::{Classifier, ClassifierConfig};
    use encoder_classifier::predict::{ModelArtifact, Predictor};
    use encoder_classifier::training::metrics::THRESHOLD;
    use encoder_classifier::training::{
        ClassWeights, EpochMetrics, FitOptions, Trainer, TrainingHistory,
    };
    use encoder_classifier::ClassifierError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[cfg(feature = "wgpu")]
    type MyBackend = burn::backend::Wgpu<f32, i32>;
    #[cfg(not(feature = "wgpu"))]
    type MyBackend = burn::backend::NdArray<f32>;
    type MyAutodiffBackend = Autodiff<MyBackend>;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Put train.csv and val.csv in data/ (last column is the 0/1 label)");
        println!("  2. Edit {} to customize settings", config_path);
        println!("  3. Run 'classifier train' to train the model");
        println!("  4. Run 'classifier predict <features.csv>' to score new rows");

        Ok(())
    }

    pub fn train(
        config: &Config,
        epochs: Option<usize>,
        lr: Option<f64>,
        batch_size: Option<usize>,
        optimizer: Option<String>,
    ) -> Result<()> {
        let mut config = config.clone();
        if let Some(e) = epochs {
            config.training.epochs = e;
        }
        if let Some(lr) = lr {
            config.training.learning_rate = lr;
        }
        if let Some(b) = batch_size {
            config.training.batch_size = b;
        }
        if let Some(o) = optimizer {
            config.training.optimizer = o;
        }

        println!("Loading training data from {}...", config.data.train_path);
        let train = csv::load_labelled(&config.data.train_path)?;
        println!("  {} training samples", train.samples().len());
        println!("Loading validation data from {}...", config.data.val_path);
        let val = csv::load_labelled(&config.data.val_path)?;
        println!("  {} validation samples", val.samples().len());

        let standardize = config
            .training
            .standardize
            .then(|| Standardize::from_dataset(&train));
        let transform = match &standardize {
            Some(s) => FeatureTransform::Standardize(s.clone()),
            None => FeatureTransform::Identity,
        };

        let device = Default::default();
        let model_config = ClassifierConfig::new(train.feature_dim())
            .with_leaky_slope(config.model.leaky_slope);
        let mut rng = StdRng::seed_from_u64(config.training.seed);

        println!("Creating model ({} input features)...", model_config.input_size);
        let model = Classifier::<MyAutodiffBackend>::new(&device, &model_config, &mut rng)?;
        let options = FitOptions::from_config(&config);

        println!("\nStarting training...\n");
        let (result, history, model) = match config.training.optimizer.to_lowercase().as_str() {
            "adam" => {
                let optimizer = AdamConfig::new().init();
                fit_with(model, optimizer, options, device, train, val, &transform)?
            }
            "sgd" => {
                let optimizer = SgdConfig::new().init();
                fit_with(model, optimizer, options, device, train, val, &transform)?
            }
            other => {
                return Err(ClassifierError::Config(format!(
                    "Unknown optimizer: {}. Use adam or sgd.",
                    other
                )))
            }
        };

        // Save model (Burn adds .mpk extension)
        let model_path = &config.data.model_path;
        if let Some(parent) = Path::new(model_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        println!("\nSaving model to {}...", model_path);
        model.valid().save(model_path)?;
        ModelArtifact::new(model_config, standardize).save(model_path)?;

        if let Some(path) = &config.data.history_path {
            let json = serde_json::to_string_pretty(&history).map_err(|e| {
                ClassifierError::Parse(format!("Failed to serialize history: {}", e))
            })?;
            std::fs::write(path, json)?;
            println!("Saved training history to {}", path);
        }

        println!("\nTraining complete!");
        println!("  Epochs run:     {}", history.len());
        if let Some(best) = history.best_epoch() {
            println!(
                "  Best epoch:     {} (val loss {:.4})",
                best + 1,
                history.val_losses[best]
            );
        }
        println!("  Final:          {}", result);

        Ok(())
    }

    fn fit_with<O>(
        model: Classifier<MyAutodiffBackend>,
        optimizer: O,
        options: FitOptions,
        device: <MyAutodiffBackend as burn::tensor::backend::Backend>::Device,
        train: ClassificationDataset,
        val: ClassificationDataset,
        transform: &FeatureTransform,
    ) -> Result<(EpochMetrics, TrainingHistory, Classifier<MyAutodiffBackend>)>
    where
        O: Optimizer<Classifier<MyAutodiffBackend>, MyAutodiffBackend>,
    {
        let mut trainer = Trainer::new(model, optimizer, options, device);
        let result = trainer.fit(train, val, transform)?;
        let history = trainer.history().clone();
        Ok((result, history, trainer.into_model()))
    }

    fn load_predictor(config: &Config) -> Result<Predictor<MyBackend>> {
        let model_file = format!("{}.mpk", config.data.model_path);
        if !Path::new(&model_file).exists() {
            return Err(ClassifierError::Config(format!(
                "No trained model at {}. Run 'classifier train' first.",
                model_file
            )));
        }
        Predictor::load(&config.data.model_path, Default::default())
    }

    pub fn evaluate(config: &Config, data: Option<String>) -> Result<()> {
        let path = data.unwrap_or_else(|| config.data.val_path.clone());
        let predictor = load_predictor(config)?;
        let dataset = csv::load_labelled(&path)?;
        let count = dataset.samples().len();

        let weights = ClassWeights::new(config.loss.weight_negative, config.loss.weight_positive);
        let metrics = predictor.evaluate(dataset, weights, config.training.batch_size)?;

        println!("Evaluation on {} ({} samples)", path, count);
        println!("───────────────────────────────");
        println!("  Loss:     {:.4}", metrics.avg_loss());
        println!("  Accuracy: {:.1}%", metrics.accuracy() * 100.0);

        Ok(())
    }

    pub fn predict(config: &Config, data: &str, format: OutputFormat) -> Result<()> {
        let predictor = load_predictor(config)?;
        let rows = csv::load_features(data)?;
        let probs = predictor.predict_proba(&rows)?;
        let labels: Vec<u8> = probs.iter().map(|p| u8::from(*p >= THRESHOLD)).collect();

        match format {
            OutputFormat::Table => {
                println!("{:>6}  {:>11}  {:>5}", "row", "probability", "class");
                for (i, (p, c)) in probs.iter().zip(labels.iter()).enumerate() {
                    println!("{:>6}  {:>11.4}  {:>5}", i, p, c);
                }
            }
            OutputFormat::Json => {
                let json: Vec<_> = probs
                    .iter()
                    .zip(labels.iter())
                    .enumerate()
                    .map(|(i, (p, c))| {
                        serde_json::json!({ "row": i, "probability": p, "class": c })
                    })
                    .collect();
                let text = serde_json::to_string_pretty(&json)
                    .map_err(|e| ClassifierError::Parse(e.to_string()))?;
                println!("{}", text);
            }
            OutputFormat::Csv => {
                println!("row,probability,class");
                for (i, (p, c)) in probs.iter().zip(labels.iter()).enumerate() {
                    println!("{},{:.6},{}", i, p, c);
                }
            }
        }

        Ok(())
    }
}
