use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use easel_contracts::{Catalog, GenerateRequest, ReferenceImage};
use easel_engine::{ImageEngine, PicuiImageHost};

#[derive(Debug, Parser)]
#[command(name = "easel", version, about = "Multi-provider image generation dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the models configured in a catalog file.
    Models(ModelsArgs),
    /// Dispatch one generation request and write the artifact to disk.
    Generate(GenerateArgs),
}

#[derive(Debug, Parser)]
struct ModelsArgs {
    #[arg(long)]
    catalog: PathBuf,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    catalog: PathBuf,
    #[arg(long)]
    model: String,
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long)]
    aspect_ratio: Option<String>,
    #[arg(long)]
    image_size: Option<String>,
    /// Reference image files, attached in order.
    #[arg(long)]
    reference: Vec<PathBuf>,
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("easel error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Models(args) => run_models(args),
        Command::Generate(args) => run_generate(args),
    }
}

fn run_models(args: ModelsArgs) -> Result<i32> {
    let catalog = load_catalog(&args.catalog)?;
    for channel in &catalog.channels {
        let state = if channel.enabled { "enabled" } else { "disabled" };
        println!(
            "channel {} [{}] {} ({state})",
            channel.id,
            channel.kind.as_str(),
            channel.name
        );
        for model in catalog.models.iter().filter(|m| m.channel_id == channel.id) {
            let state = if model.enabled { "enabled" } else { "disabled" };
            println!(
                "  model {} -> {} (cost {}, {state})",
                model.id, model.api_model, model.cost_per_generation
            );
        }
    }
    Ok(0)
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let catalog = load_catalog(&args.catalog)?;

    let mut engine = ImageEngine::new();
    if let (Some(endpoint), Some(token)) = (
        non_empty_env("EASEL_IMAGE_HOST_URL"),
        non_empty_env("EASEL_IMAGE_HOST_TOKEN"),
    ) {
        engine = engine.with_image_host(Box::new(PicuiImageHost::new(endpoint, token)));
    }

    let mut images = Vec::new();
    for path in &args.reference {
        images.push(reference_from_path(path)?);
    }

    let request = GenerateRequest {
        model_id: args.model.clone(),
        prompt: args.prompt.clone(),
        aspect_ratio: args.aspect_ratio.clone(),
        image_size: args.image_size.clone(),
        images,
    };

    let result = engine.generate(&catalog, &request)?;
    write_artifact(&result.url, &args.out)?;
    println!("wrote {} (cost {})", args.out.display(), result.cost);
    Ok(0)
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading catalog {}", path.display()))?;
    Catalog::from_json(&raw)
        .with_context(|| format!("failed parsing catalog {}", path.display()))
}

fn reference_from_path(path: &Path) -> Result<ReferenceImage> {
    let bytes =
        fs::read(path).with_context(|| format!("failed reading reference {}", path.display()))?;
    let mime = mime_for_path(path).unwrap_or("image/jpeg");
    Ok(ReferenceImage {
        mime_type: mime.to_string(),
        data: format!("data:{mime};base64,{}", BASE64.encode(&bytes)),
    })
}

fn write_artifact(url: &str, out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
    }
    let bytes = if let Some(payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
    {
        BASE64
            .decode(payload.as_bytes())
            .context("artifact data URL is not valid base64")?
    } else if url.starts_with("http") {
        let response = reqwest::blocking::get(url)
            .with_context(|| format!("failed downloading artifact ({url})"))?;
        if !response.status().is_success() {
            bail!("artifact download failed ({})", response.status().as_u16());
        }
        response.bytes().context("failed reading artifact bytes")?.to_vec()
    } else {
        bail!("unrecognized artifact URL");
    };
    fs::write(out, bytes).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Some("image/png"),
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("gif") => Some("image/gif"),
        _ => None,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_is_derived_from_extension() {
        assert_eq!(mime_for_path(Path::new("a/b/ref.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("ref.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("ref")), None);
    }

    #[test]
    fn data_url_artifacts_are_decoded_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("artifact.png");
        write_artifact("data:image/png;base64,Zm9v", &out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"foo");
    }

    #[test]
    fn unrecognized_artifact_urls_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("artifact.png");
        assert!(write_artifact("ftp://nope", &out).is_err());
    }
}
