//! Annoconv: object-detection annotation conversion.
//!
//! Annoconv converts between COCO JSON, Pascal VOC XML and polygon-text
//! (the plain-text box format used by OpenCV tooling). Every format decodes
//! into one canonical model and encodes back out of it, so N formats need N
//! adapters rather than N×(N-1) converters.
//!
//! # Modules
//!
//! - [`ir`]: canonical model, category registry and the format adapters
//! - [`conversion`]: single-document and batch conversion plus lossiness reports
//! - [`render`]: drawing boxes onto images (feature `render`)
//! - [`error`]: error types for annoconv operations

pub mod conversion;
pub mod error;
pub mod ir;
#[cfg(feature = "render")]
pub mod render;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use conversion::{ConvertOptions, EncodedFile, Format};
use ir::{CategoryCreation, CategoryRegistry, DecodeOptions, ImagesizeProbe};

pub use error::AnnoconvError;

/// The annoconv CLI application.
#[derive(Parser)]
#[command(name = "annoconv")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log debug details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert annotations from one format to another.
    Convert(ConvertArgs),
    /// List supported formats and what each one preserves.
    Formats,
    /// Draw the boxes of an annotation file onto its image.
    #[cfg(feature = "render")]
    Render(RenderArgs),
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Annotation file, or a directory searched recursively for the source format.
    input: PathBuf,

    /// Source format ('coco', 'voc' or 'polytext').
    #[arg(long)]
    from: Format,

    /// Target format ('coco', 'voc' or 'polytext').
    #[arg(long)]
    to: Format,

    /// Output file, or directory for per-image targets.
    #[arg(short, long)]
    output: PathBuf,

    /// Directory holding the images, used to fill in missing sizes and names.
    #[arg(long)]
    images: Option<PathBuf>,

    /// Category ledger to start from, keeping its ids.
    #[arg(long)]
    categories: Option<PathBuf>,

    /// Write the final category ledger here.
    #[arg(long)]
    save_categories: Option<PathBuf>,

    /// Fail on category names missing from the ledger instead of adding them.
    #[arg(long)]
    strict_categories: bool,

    /// Check every declared image size against the image file.
    #[arg(long)]
    verify_sizes: bool,

    /// Proceed even when the target cannot represent everything.
    #[arg(long)]
    allow_lossy: bool,

    /// Output format for the conversion report.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

/// Arguments for the render subcommand.
#[cfg(feature = "render")]
#[derive(clap::Args)]
struct RenderArgs {
    /// Annotation file to draw.
    annotation: PathBuf,

    /// Format of the annotation file.
    #[arg(long)]
    format: Format,

    /// Image the annotations belong to.
    #[arg(long)]
    image: PathBuf,

    /// Where to write the rendered image.
    #[arg(short, long)]
    output: PathBuf,

    /// TrueType font for category labels; defaults to a system font when one is found.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Draw boxes only, without category labels.
    #[arg(long, conflicts_with = "font")]
    no_labels: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Run the annoconv CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnnoconvError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Formats) => {
            run_formats();
            Ok(())
        }
        #[cfg(feature = "render")]
        Some(Commands::Render(args)) => run_render(args),
        None => {
            println!("annoconv {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!(
                "Convert object-detection annotations between COCO, Pascal VOC and polygon-text."
            );
            println!();
            println!("Run 'annoconv --help' for usage information.");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), AnnoconvError> {
    let registry = match &args.categories {
        Some(path) => conversion::load_category_ledger(path)?,
        None => CategoryRegistry::new(),
    };
    let creation = if args.strict_categories {
        CategoryCreation::Deny
    } else {
        CategoryCreation::Allow
    };

    let probe = ImagesizeProbe;
    let options = ConvertOptions {
        decode: DecodeOptions {
            creation,
            image_dir: args.images.as_deref(),
            probe: Some(&probe),
            ..Default::default()
        },
        registry,
        verify_image_sizes: args.verify_sizes,
    };

    let items = conversion::collect_sources(&args.input, args.from, args.images.as_deref())?;
    if items.is_empty() {
        tracing::warn!(
            input = %args.input.display(),
            extension = args.from.extension(),
            "no annotation files found"
        );
    }

    let dataset = conversion::decode_dataset(args.from, &items, &options)?;
    let report = conversion::build_conversion_report(&dataset, args.from, args.to);
    if report.is_lossy() && !args.allow_lossy {
        eprint!("{report}");
        return Err(AnnoconvError::LossyConversion {
            report: Box::new(report),
        });
    }

    let files = conversion::encode_dataset(args.to, &dataset)?;
    write_outputs(&args.output, args.to, &files)?;

    if let Some(path) = &args.save_categories {
        conversion::save_category_ledger(path, dataset.registry())?;
    }

    match args.report {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|source| AnnoconvError::JsonWrite { source })?;
            println!("{json}");
        }
        ReportFormat::Text => print!("{report}"),
    }

    Ok(())
}

/// Writes encoded files to `output`.
///
/// COCO output, and a single per-image file whose `output` has an extension,
/// go to `output` itself; anything else goes into `output` as a directory.
fn write_outputs(output: &Path, to: Format, files: &[EncodedFile]) -> Result<(), AnnoconvError> {
    let as_file = files.len() == 1
        && !output.is_dir()
        && (to.capabilities().multi_image || output.extension().is_some());

    if as_file {
        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| AnnoconvError::from(err).in_file(parent))?;
        }
        return fs::write(output, &files[0].content)
            .map_err(|err| AnnoconvError::from(err).in_file(output));
    }

    fs::create_dir_all(output).map_err(|err| AnnoconvError::from(err).in_file(output))?;
    for file in files {
        let path = output.join(&file.name);
        fs::write(&path, &file.content).map_err(|err| AnnoconvError::from(err).in_file(&path))?;
    }
    tracing::debug!(output = %output.display(), files = files.len(), "wrote output directory");
    Ok(())
}

/// Execute the formats subcommand.
fn run_formats() {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };

    println!(
        "{:<10} {:<5} {:<11} {:<16} {:<10} {:<6} {}",
        "FORMAT", "EXT", "CATEGORIES", "SUPERCATEGORIES", "FILE NAME", "CROWD", "MULTI-IMAGE"
    );
    for format in Format::ALL {
        let caps = format.capabilities();
        println!(
            "{:<10} {:<5} {:<11} {:<16} {:<10} {:<6} {}",
            format.name(),
            format.extension(),
            yes_no(caps.preserves_categories),
            yes_no(caps.preserves_supercategories),
            yes_no(caps.preserves_file_name),
            yes_no(caps.preserves_crowd),
            yes_no(caps.multi_image),
        );
    }
}

/// Execute the render subcommand.
#[cfg(feature = "render")]
fn run_render(args: RenderArgs) -> Result<(), AnnoconvError> {
    let raw = fs::read_to_string(&args.annotation)
        .map_err(|err| AnnoconvError::from(err).in_file(&args.annotation))?;

    let image_name = args
        .image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let probe = ImagesizeProbe;
    let options = DecodeOptions {
        file_name: Some(image_name.as_str()),
        image_path: Some(args.image.as_path()),
        probe: Some(&probe),
        ..Default::default()
    };

    let mut registry = CategoryRegistry::new();
    let images = args
        .format
        .adapter()
        .decode(&raw, &mut registry, &options)
        .map_err(|err| err.in_file(&args.annotation))?;

    let annotated = match images.as_slice() {
        [only] => only,
        _ => images
            .iter()
            .find(|image| Path::new(&image.meta().file_name).file_name() == args.image.file_name())
            .ok_or_else(|| {
                AnnoconvError::malformed(
                    args.format.name(),
                    format!("no image named '{image_name}' in {}", args.annotation.display()),
                )
            })?,
    };

    let font = match (&args.font, args.no_labels) {
        (_, true) => None,
        (Some(path), false) => Some(render::LabelFont::from_file(path)?),
        (None, false) => {
            let font = render::LabelFont::system_default();
            if font.is_none() {
                tracing::warn!("no system font found; drawing boxes without labels (use --font)");
            }
            font
        }
    };

    render::render_file(annotated, &registry, &args.image, &args.output, font.as_ref())
}
