use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use genview::download::{DownloadRequest, DownloadSink};
use genview::generator::ids;
use genview::{FsDownloadSink, GenerationApi, HttpApi, PageConfig, SubmitOutcome, ToastMessage};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "genview", version, about = "Drive the image generator pages headlessly")]
struct Cli {
    /// Origin of the image generation server
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    base_url: String,

    /// Request timeout in milliseconds (no timeout by default)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the models the server offers
    Models,
    /// Submit the generator form
    Generate {
        #[arg(long)]
        prompt: String,
        /// Model id; defaults to the first model the page loads
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        quality: Option<String>,
        /// Save generated images into this directory
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
    /// List the gallery, optionally saving every image
    Gallery {
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
    /// Show where the server stores images
    Storage,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(e) = genview::logger::init(genview::logger::filter_for_verbosity(cli.verbose)) {
        eprintln!("{}", e);
    }

    let config = PageConfig {
        base_url: cli.base_url.clone(),
        timeout_ms: cli.timeout_ms,
        ..Default::default()
    };

    match cli.command {
        Command::Models => list_models(&config).await,
        Command::Generate {
            prompt,
            model,
            size,
            quality,
            download_dir,
        } => generate(&config, prompt, model, size, quality, download_dir).await,
        Command::Gallery { download_dir } => gallery(&config, download_dir).await,
        Command::Storage => storage(&config).await,
    }
}

async fn list_models(config: &PageConfig) -> anyhow::Result<()> {
    let api = HttpApi::new(config)?;
    let models = api.list_models().await.context("listing models")?;
    if models.data.is_empty() {
        println!("{}", "No models available".yellow());
    }
    for model in &models.data {
        println!("{}", model.label());
    }
    Ok(())
}

async fn generate(
    config: &PageConfig,
    prompt: String,
    model: Option<String>,
    size: Option<String>,
    quality: Option<String>,
    download_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let generator = genview::open_generator(config, None).await?;
    generator.page().with(|doc| -> genview::Result<()> {
        let prompt_el = doc.require(ids::PROMPT)?;
        doc.set_value(prompt_el, &prompt);
        if let Some(model) = &model {
            let el = doc.require(ids::MODEL)?;
            doc.set_value(el, model);
        }
        if let Some(size) = &size {
            let el = doc.require(ids::SIZE)?;
            doc.set_value(el, size);
        }
        if let Some(quality) = &quality {
            let el = doc.require(ids::QUALITY)?;
            doc.set_value(el, quality);
        }
        Ok(())
    })?;
    if let Some(model) = &model {
        if &generator.read_form().model != model {
            bail!("model {} is not offered by the server", model);
        }
    }

    let outcome = generator.submit_form().await;
    print_toasts(&generator.toaster().messages());

    let images = match outcome {
        SubmitOutcome::Generated { images } => images,
        SubmitOutcome::Rejected(e) => bail!("{}", e),
        SubmitOutcome::Failed { reason } => bail!("generation failed: {}", reason),
        SubmitOutcome::NetworkError => bail!("network error"),
    };
    for image in &images {
        println!("{}  {}", image.filename.bold(), image.url);
    }

    if let Some(dir) = download_dir {
        let requests = images
            .iter()
            .map(|i| DownloadRequest {
                url: i.url.clone(),
                filename: i.filename.clone(),
            })
            .collect();
        save_all(config, dir, requests).await?;
    }
    Ok(())
}

async fn gallery(config: &PageConfig, download_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let gallery = genview::open_gallery(config, None).await?;
    let entries = gallery.entries();
    if entries.is_empty() {
        println!("{}", "Gallery is empty".yellow());
    }
    for entry in &entries {
        let size = entry
            .size
            .map(|s| format!("{} bytes", s))
            .unwrap_or_default();
        println!("{}  {}  {}", entry.filename.bold(), entry.timestamp, size);
    }

    if let Some(dir) = download_dir {
        let requests = entries
            .into_iter()
            .map(|e| DownloadRequest {
                url: e.url,
                filename: e.filename,
            })
            .collect();
        save_all(config, dir, requests).await?;
    }
    Ok(())
}

async fn storage(config: &PageConfig) -> anyhow::Result<()> {
    let api = HttpApi::new(config)?;
    let info = api.storage_info().await.context("fetching storage info")?;
    println!("storage: {}", info.storage_type);
    if info.use_s3 {
        println!("bucket:  {}", info.bucket_name.as_deref().unwrap_or("-"));
        println!("region:  {}", info.region.as_deref().unwrap_or("-"));
    }
    if !info.s3_configured {
        println!("{}", "S3 is not configured".bright_black());
    }
    Ok(())
}

async fn save_all(
    config: &PageConfig,
    dir: PathBuf,
    requests: Vec<DownloadRequest>,
) -> anyhow::Result<()> {
    let sink = Arc::new(FsDownloadSink::new(HttpApi::new(config)?, dir));
    let saves = requests.into_iter().map(|r| {
        let sink = sink.clone();
        async move { sink.save(r).await }
    });
    let mut failed = 0;
    for result in futures::future::join_all(saves).await {
        match result {
            Ok(path) => println!("{} {}", "saved".green(), path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("{} {}", "failed".red(), e);
            }
        }
    }
    if failed > 0 {
        bail!("{} download(s) failed", failed);
    }
    Ok(())
}

fn print_toasts(toasts: &[ToastMessage]) {
    for toast in toasts {
        let line = format!("[{}] {}", toast.severity.as_str(), toast.text);
        let styled = match toast.severity {
            genview::Severity::Success => line.green(),
            genview::Severity::Error => line.red(),
            genview::Severity::Warning => line.yellow(),
            genview::Severity::Info => line.normal(),
        };
        eprintln!("{}", styled);
    }
}
