use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use image::ImageReader;

use snapdetect::core::{PhotoCache, SourceSelection};
use snapdetect::detection::{DetectOutcome, Detector, ModelAsset, RtenEngineFactory};
use snapdetect::overlay::{LabelFont, render_overlay};
use snapdetect::{AppConfig, InferenceRuntime, OverlayState, ReviewSession, ViewportSize};

#[derive(Parser)]
#[command(name = "snapdetect")]
#[command(about = "Detect objects in a photo and map the boxes onto a display viewport")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run detection on a photo
    Detect(DetectArgs),
    /// Inspect or fill the photo cache slot
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Args)]
struct DetectArgs {
    /// Use the photo in the cache slot
    #[arg(long, conflicts_with_all = ["reference", "bytes"])]
    taken_photo: bool,

    /// Path or file:// URL of the photo
    #[arg(long, value_name = "REF", conflicts_with = "bytes")]
    reference: Option<String>,

    /// Read encoded image bytes from a file
    #[arg(long, value_name = "FILE")]
    bytes: Option<PathBuf>,

    /// Display viewport as WIDTHxHEIGHT
    #[arg(long, value_name = "WxH")]
    viewport: Option<ViewportSize>,

    /// Write the rendered overlay to this PNG (requires --viewport)
    #[arg(long, value_name = "PNG", requires = "viewport")]
    overlay_out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Store an image in the cache slot
    Save {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,
    },
    /// Write the cached photo out to a file
    Load {
        #[arg(value_name = "OUT")]
        out_path: PathBuf,
    },
    /// Clear the slot and print the path a capture should write to
    Reserve,
    /// Show the slot path and whether it holds a photo
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = AppConfig::load(args.config.as_deref())?;
    let cache = PhotoCache::new(&config.cache_root);

    match args.command {
        Command::Detect(detect_args) => run_detect(config, cache, detect_args).await,
        Command::Cache(cache_command) => run_cache(cache, cache_command),
    }
}

fn selection_from_args(args: &DetectArgs) -> anyhow::Result<SourceSelection> {
    if let Some(path) = &args.bytes {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        return Ok(SourceSelection::bytes(bytes));
    }
    if let Some(reference) = &args.reference {
        return Ok(SourceSelection::reference(reference.clone()));
    }
    Ok(SourceSelection {
        taken_photo: args.taken_photo.then_some(true),
        ..SourceSelection::default()
    })
}

async fn run_detect(
    config: AppConfig,
    cache: PhotoCache,
    args: DetectArgs,
) -> anyhow::Result<()> {
    let source = selection_from_args(&args)?.resolve(&cache)?;

    let runtime = InferenceRuntime::global();
    runtime.initialize();

    let detector = Detector::new(
        config.detector.clone(),
        ModelAsset::new(&config.assets_dir),
        runtime,
        Box::new(RtenEngineFactory),
    )
    .into_shared();
    let (session, results) = ReviewSession::new(detector, config.display_max_dimension);

    let photo = session.load(source).await?;
    log::info!("photo loaded: {}x{}", photo.width(), photo.height());
    let display = session.prepare_display(photo.clone());

    let result = match session.submit(photo).await {
        DetectOutcome::Ready(result) => result,
        DetectOutcome::NotReady => anyhow::bail!("inference runtime is not initialized"),
        DetectOutcome::Failed(e) => return Err(e.into()),
    };

    let mut overlay = OverlayState::new();
    if let Some(latest) = results.borrow().clone() {
        overlay.apply_result(latest);
    }

    println!(
        "=== {} objects on {}x{} inference input ===",
        overlay.objects().len(),
        result.image_width,
        result.image_height
    );
    for (i, object) in overlay.objects().iter().enumerate() {
        let b = object.bounds;
        println!(
            "  {}. {} at ({:.1}, {:.1}, {:.1}, {:.1})",
            i + 1,
            object.category,
            b.left,
            b.top,
            b.right,
            b.bottom
        );
    }

    let Some(viewport) = args.viewport else {
        return Ok(());
    };
    overlay.set_viewport(viewport);
    let Some(boxes) = overlay.boxes() else {
        anyhow::bail!(
            "viewport {}x{} cannot display a {}x{} image",
            viewport.width,
            viewport.height,
            result.image_width,
            result.image_height
        );
    };

    if let Some(transform) = overlay.transform() {
        println!(
            "\nViewport {}x{}: scale ({:.4}, {:.4}), offset ({}, {})",
            viewport.width,
            viewport.height,
            transform.scale_x,
            transform.scale_y,
            transform.offset_x,
            transform.offset_y
        );
    }
    for overlay_box in &boxes {
        let b = overlay_box.screen_bounds;
        println!(
            "  {} on screen at ({:.1}, {:.1}, {:.1}, {:.1})",
            overlay_box.category, b.left, b.top, b.right, b.bottom
        );
    }

    if let Some(out_path) = args.overlay_out {
        let font_path = config.label_font_path();
        let font = match LabelFont::load(&font_path) {
            Ok(font) => Some(font),
            Err(e) => {
                log::warn!("drawing labels without text: {:#}", e);
                None
            }
        };
        let rendered = render_overlay(
            &display,
            result.image_size(),
            viewport,
            &boxes,
            font.as_ref(),
        );
        rendered
            .save(&out_path)
            .map_err(|e| anyhow::anyhow!("Failed to save overlay: {}", e))?;
        println!("\nOverlay written to {}", out_path.display());
    }

    Ok(())
}

fn run_cache(cache: PhotoCache, command: CacheCommand) -> anyhow::Result<()> {
    match command {
        CacheCommand::Save { image_path } => {
            let image = ImageReader::open(&image_path)?
                .decode()
                .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
            cache.save(&image)?;
            println!("Cached {}", image_path.display());
        }
        CacheCommand::Load { out_path } => match cache.load()? {
            Some(image) => {
                image
                    .save(&out_path)
                    .map_err(|e| anyhow::anyhow!("Failed to save image: {}", e))?;
                println!("Wrote cached photo to {}", out_path.display());
            }
            None => anyhow::bail!("photo cache is empty"),
        },
        CacheCommand::Reserve => {
            let handle = cache.reserve_writable_slot()?;
            println!("{}", handle.path().display());
        }
        CacheCommand::Status => {
            let slot = cache.slot()?;
            let state = if slot.present { "present" } else { "empty" };
            println!("{} ({})", slot.path.display(), state);
        }
    }
    Ok(())
}
