//! tender-extract: structured extraction from tender PDFs

use anyhow::Context;
use clap::Parser;
use tender_extract::source::{expand_inputs, resolve_path};
use tender_extract::{
    DocumentInput, ExtractionCoordinator, HttpExtractionModel, ModelConfig, PipelineConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tender-extract", version, about = "Extract structured data from tender PDFs")]
struct Cli {
    /// Document language (defaults to TENDER_DEFAULT_LANGUAGE or nl)
    #[arg(long, short)]
    language: Option<String>,

    /// Merge all documents into one tender record
    #[arg(long)]
    merge: bool,

    /// Skip document relationship inference when merging
    #[arg(long)]
    no_relationships: bool,

    /// Extraction model endpoint
    #[arg(long, env = "TENDER_MODEL_URL")]
    model_url: String,

    #[arg(long, env = "TENDER_MODEL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// PDF files or glob patterns
    #[arg(required = true)]
    files: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tender_extract=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("reading TENDER_* configuration")?;
    let language = cli
        .language
        .clone()
        .unwrap_or_else(|| config.default_language.clone());

    let mut model_config = ModelConfig::new(&cli.model_url)?;
    model_config.request_timeout = config.model_timeout;
    if let Some(key) = &cli.api_key {
        model_config = model_config.with_api_key(key);
    }
    let model = HttpExtractionModel::new(model_config)?;

    let paths = expand_inputs(&cli.files)?;
    let inputs = paths
        .iter()
        .map(|path| {
            let resolved =
                resolve_path(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(DocumentInput::new(resolved.filename, resolved.data))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    tracing::info!(documents = inputs.len(), language = %language, "Starting extraction");

    let coordinator = ExtractionCoordinator::with_pdf_backend(model, config);

    let output = match inputs.as_slice() {
        [single] if !cli.merge => {
            let result = coordinator
                .process(&single.content, &single.filename, &language)
                .await?;
            serde_json::to_string_pretty(&result)?
        }
        _ => {
            let batch = coordinator
                .process_batch(&inputs, &language, cli.merge, !cli.no_relationships)
                .await?;
            serde_json::to_string_pretty(&batch)?
        }
    };

    println!("{}", output);
    Ok(())
}
