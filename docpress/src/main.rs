mod settings;

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use publish_core::{
    archive::{stylesheet_text, ExportArchive},
    code::plain_text,
    config::{generate_slug, ImageMode, MissingImagePolicy},
    images::ImageUpload,
    transform, transform_with_uploader, ExportInput,
};
use tracing::info;

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "docpress", version, about = "Turn a word-processor HTML export into a blog post body")]
struct Cli {
    /// Exported zip: one .html page plus images/.
    archive: PathBuf,

    /// Plain-text export of the same document, used to find code regions.
    #[arg(long)]
    text: Option<PathBuf>,

    /// Write the result here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the whole payload (html, tags, post id) as JSON.
    #[arg(long)]
    json: bool,

    /// Post title; its slug becomes the upload folder.
    #[arg(long)]
    title: Option<String>,

    /// Store images under this directory instead of inlining them.
    #[arg(long, requires = "base_url")]
    upload_dir: Option<PathBuf>,

    /// Public URL that `--upload-dir` is served from.
    #[arg(long, requires = "upload_dir")]
    base_url: Option<String>,

    /// Language for code blocks that cannot be detected.
    #[arg(long)]
    default_language: Option<String>,

    /// Leave unknown image references untouched instead of failing.
    #[arg(long)]
    keep_missing_images: bool,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    apply_overrides(&cli, &mut settings);
    let options = settings.transform;

    let archive = ExportArchive::open(&cli.archive)
        .with_context(|| format!("opening {}", cli.archive.display()))?;
    let document = archive.document();
    let stylesheet = stylesheet_text(&document);
    let text = match &cli.text {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading plain text {}", path.display()))?,
        None => plain_text(&document),
    };
    let input = ExportInput {
        stylesheet: &stylesheet,
        plain_text: &text,
        images: &archive.images,
    };

    let payload = match (&cli.upload_dir, &cli.base_url) {
        (Some(dir), Some(base_url)) => {
            transform_with_uploader(&document, &input, &options, |img| {
                store_image(dir, base_url, img)
            })?
        }
        _ => transform(&document, &input, &options)?,
    };
    info!(tags = ?payload.tags, post_id = ?payload.post_id, "payload ready");

    let rendered = if cli.json {
        serde_json::to_string_pretty(&payload)?
    } else {
        payload.html
    };
    match &cli.out {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn apply_overrides(cli: &Cli, settings: &mut Settings) {
    let options = &mut settings.transform;
    if cli.upload_dir.is_some() {
        options.image_mode = ImageMode::Uploaded;
    }
    if cli.keep_missing_images {
        options.missing_images = MissingImagePolicy::KeepSource;
    }
    if let Some(lang) = &cli.default_language {
        options.default_language = lang.clone();
    }
    if options.upload_prefix.is_none() {
        options.upload_prefix = cli.title.as_deref().map(generate_slug);
    }
}

/// Local media sink: writes `dir/<name>` and reports where it will be served.
fn store_image(dir: &Path, base_url: &str, img: ImageUpload<'_>) -> Result<String, String> {
    let path = dir.join(img.name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::write(&path, img.bytes).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(format!("{}/{}", base_url.trim_end_matches('/'), img.name))
}
