use anyhow::{Context, Result};
use asclepius::{
    config::Config,
    image::ResultFormatter,
    models::{ClassifierHelper, TensorLayout},
    web::serve,
    AnalysisController, ResultView,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "asclepius")]
#[command(about = "Classify images with an on-device ONNX model")]
struct Args {
    /// Model directory path
    #[arg(long, default_value = "models", global = true)]
    models_dir: String,

    /// Model file, relative to the models directory
    #[arg(long, default_value = asclepius::config::DEFAULT_MODEL_FILE, global = true)]
    model: String,

    /// Labels file, relative to the models directory
    #[arg(long, default_value = asclepius::config::DEFAULT_LABELS_FILE, global = true)]
    labels: String,

    /// Minimum score for a label to be reported
    #[arg(long, default_value_t = asclepius::config::DEFAULT_THRESHOLD, global = true)]
    threshold: f32,

    /// Maximum number of labels to report
    #[arg(long, global = true)]
    max_results: Option<usize>,

    /// Inference threads
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Tensor layout expected by the model
    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc, global = true)]
    layout: TensorLayout,

    /// Apply softmax to raw model outputs
    #[arg(long, global = true)]
    softmax: bool,

    /// Scale float inputs to [0, 1]
    #[arg(long, global = true)]
    normalize: bool,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify one image and print the result
    Classify {
        /// Image path or file:// URI
        image: String,

        /// Print every category above the threshold
        #[arg(long)]
        all: bool,

        /// Print the result message as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP API
    Serve {
        /// Server bind address
        #[arg(long, default_value = "0.0.0.0:5005")]
        bind: String,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Enable development mode
        #[arg(long)]
        dev: bool,
    },
}

impl Args {
    fn config(&self, bind: String, workers: Option<usize>, dev: bool) -> Result<Config> {
        Ok(Config::new(bind, self.models_dir.clone(), workers, dev)?
            .with_model_file(&self.model)
            .with_labels_file(&self.labels)
            .with_threshold(self.threshold)?
            .with_max_results(self.max_results)
            .with_intra_threads(self.threads)
            .with_layout(self.layout)
            .with_softmax(self.softmax)
            .with_normalize(self.normalize))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &args.command {
        Command::Classify { image, all, json } => {
            let config = args.config("127.0.0.1:0".to_string(), None, false)?;
            classify(config, image, *all, *json)
        }
        Command::Serve { bind, workers, dev } => {
            let config = args.config(bind.clone(), *workers, *dev)?;
            run_server(config)
        }
    }
}

fn classify(config: Config, image: &str, all: bool, json: bool) -> Result<()> {
    tracing::info!("Models directory: {}", config.models_dir.display());

    let mut controller = AnalysisController::new(ClassifierHelper::new(&config));
    controller.select_image(image);

    let message = match controller.analyze() {
        Ok(message) => message,
        Err(e) => {
            let text = AnalysisController::user_message(&e);
            return Err(anyhow::Error::new(e).context(text));
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        println!("{}", ResultView::from_message(message));
    }

    if all {
        if let Some(classifications) = controller.last_classifications() {
            println!("{}", ResultFormatter::format_plain_text(classifications));
        }
    }

    Ok(())
}

fn run_server(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers.max(1))
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    tracing::info!("Starting classification service...");
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Model: {}", config.model_path().display());

    runtime.block_on(serve(config))?;
    Ok(())
}
