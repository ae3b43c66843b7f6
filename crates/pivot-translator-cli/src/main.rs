//! Pivot Translator CLI - Command line tool for translating text and files.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pivot_translator_core::{
    AppConfig, BatchOptions, CancelToken, Engine, FileFormat, FileOptions, FileTranslator,
    clear_translation_cache,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatOption {
    Txt,
    Json,
    Csv,
}

impl From<FormatOption> for FileFormat {
    fn from(opt: FormatOption) -> Self {
        match opt {
            FormatOption::Txt => Self::Txt,
            FormatOption::Json => Self::Json,
            FormatOption::Csv => Self::Csv,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pivot-translate")]
#[command(author, version, about = "Translate text and files between languages", long_about = None)]
struct Args {
    /// Text to translate
    text: Option<String>,

    /// Source language (code, alias or name, e.g. "en", "hin_Deva", "urdu")
    #[arg(short = 's', long = "src")]
    source: Option<String>,

    /// Target language
    #[arg(short = 't', long = "tgt")]
    target: Option<String>,

    /// Translate a .txt, .json or .csv file instead of text
    #[arg(short = 'f', long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Output file (default: <stem>_translated_<target><ext>)
    #[arg(short, long, requires = "file")]
    output: Option<PathBuf>,

    /// Force the file format instead of using the extension
    #[arg(long, value_enum, requires = "file")]
    format: Option<FormatOption>,

    /// JSON keys to translate (default: all string values)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    fields: Option<Vec<String>>,

    /// CSV columns to translate (default: all columns)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    columns: Option<Vec<String>>,

    /// Translate text files as one block instead of line by line
    #[arg(long)]
    no_preserve_formatting: bool,

    /// Show languages, models and reachable targets, then exit
    #[arg(long)]
    info: bool,

    /// Units translated at once (default: from config)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inference server base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Inference server API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Disable result caching
    #[arg(long)]
    no_cache: bool,

    /// Clear the on-disk result cache before doing anything else
    #[arg(long)]
    clear_cache: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn languages(&self) -> Result<(&str, &str)> {
        match (&self.source, &self.target) {
            (Some(source), Some(target)) => Ok((source.as_str(), target.as_str())),
            _ => anyhow::bail!("Both --src and --tgt are required to translate"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if args.clear_cache {
        let count = clear_translation_cache().context("Failed to clear translation cache")?;
        // CLI output is intentional
        #[allow(clippy::print_stdout)]
        {
            println!("Cleared {count} cached translations");
        }
        if args.text.is_none() && args.file.is_none() && !args.info {
            return Ok(());
        }
    }

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(api_base) = &args.api_base {
        config.backend.api_base.clone_from(api_base);
    }
    if args.api_key.is_some() {
        config.backend.api_key.clone_from(&args.api_key);
    }

    if let Some(concurrency) = args.concurrency {
        config.batch.concurrency = concurrency;
    }

    if args.no_cache {
        config.cache.memory_enabled = false;
        config.cache.disk_enabled = false;
    }

    let engine = Arc::new(Engine::new(&config).context("Failed to initialize translator")?);

    if args.info {
        return show_info(&engine, &args);
    }

    if let Some(input) = &args.file {
        return translate_file(engine, &args, input.clone()).await;
    }

    let Some(text) = &args.text else {
        anyhow::bail!("Nothing to translate: pass TEXT, --file or --info");
    };
    translate_text(&engine, &args, text).await
}

fn show_info(engine: &Engine, args: &Args) -> Result<()> {
    let info = engine.info();
    let targets = match &args.source {
        Some(source) => Some(
            engine
                .available_targets(source, true)
                .context(format!("Cannot list targets for '{source}'"))?,
        ),
        None => None,
    };

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        if args.json {
            let mut value = serde_json::to_value(&info)?;
            if let Some(targets) = &targets {
                value["targets"] = serde_json::to_value(targets)?;
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        println!("Backend: {}", info.backend);
        println!("Pivot:   {}", info.pivot);
        println!("\nLanguages:");
        for language in &info.languages {
            println!("  {:<10} {}", language.code.as_str(), language.name);
        }
        println!("\nModels:");
        for model in &info.models {
            let loaded = if info.loaded_models.contains(model) { " (loaded)" } else { "" };
            println!("  {model}{loaded}");
        }
        if let (Some(source), Some(targets)) = (&args.source, &targets) {
            let targets: Vec<_> = targets.iter().map(ToString::to_string).collect();
            println!("\nReachable from {source}: {}", targets.join(", "));
        }
    }

    Ok(())
}

async fn translate_text(engine: &Engine, args: &Args, text: &str) -> Result<()> {
    let (source, target) = args.languages()?;

    let plan = engine
        .plan(source, target)
        .context(format!("Cannot translate {source} -> {target}"))?;
    info!("Route: {}", plan);

    let result = engine.translate_one(text, source, target).await?;
    engine.flush_cache();

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        if args.json {
            let value = serde_json::json!({
                "source": plan.source(),
                "target": plan.target(),
                "method": plan.kind(),
                "models": plan.handles(),
                "result": &result,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else if result.succeeded {
            println!("Method: {} ({})", plan.kind(), plan);
            println!("{}", result.text);
        }
    }

    match result.error {
        Some(failure) if !result.succeeded => {
            anyhow::bail!("Translation failed ({:?}): {}", failure.kind, failure.message)
        }
        _ => Ok(()),
    }
}

async fn translate_file(engine: Arc<Engine>, args: &Args, input: PathBuf) -> Result<()> {
    let (source, target) = args.languages()?;

    // Setup progress bar; length is set once units are known
    let pb = ProgressBar::new(0);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    // Ctrl-C stops new units from starting; finished ones are still written
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let bar = pb.clone();
    let options = FileOptions {
        format: args.format.map(Into::into),
        preserve_formatting: !args.no_preserve_formatting,
        fields: args.fields.clone(),
        columns: args.columns.clone(),
        batch: BatchOptions {
            concurrency: engine.concurrency(),
            cancel: Some(cancel.clone()),
            progress: Some(Arc::new(move |done, total| {
                bar.set_length(u64::try_from(total).unwrap_or(u64::MAX));
                bar.set_position(u64::try_from(done).unwrap_or(u64::MAX));
            })),
        },
    };

    let translator = FileTranslator::new(Arc::clone(&engine));
    let stats = translator
        .translate_file(&input, args.output.as_deref(), source, target, &options)
        .await
        .context(format!("Failed to translate {}", input.display()))?;
    engine.flush_cache();

    pb.finish_with_message("Translation complete");

    if stats.batch.failed > 0 {
        warn!("{} units failed and were left untranslated", stats.batch.failed);
    }

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Translated {} units ({} failed, {} skipped) via {}",
                stats.units, stats.batch.failed, stats.batch.skipped, stats.route
            );
            println!("Saved to: {}", stats.output.display());
        }
    }

    if cancel.is_cancelled() {
        anyhow::bail!("Interrupted: {} units were not translated", stats.batch.skipped);
    }

    Ok(())
}
