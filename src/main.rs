use clap::{ArgAction, Parser, Subcommand};
use imgbatch::config::{self, ToolConfig};
use imgbatch::imaging::{self, CropMargins, EnhanceFactors, ResizeParams, RotateConvertParams};
use imgbatch::process::{self, BatchError, BatchEvent, BatchJob, BatchOutcome, CancelToken};
use imgbatch::scan::ExtensionSet;
use imgbatch::output;
use imgbatch::transform::TransformSpec;
use std::path::PathBuf;
use std::process::ExitCode;

/// Shared flags for commands that process a folder.
#[derive(clap::Args, Clone)]
struct BatchArgs {
    /// Folder containing the images
    dir: PathBuf,

    /// Accepted extension (repeatable); replaces the command's default set
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Prepend this to every output file name
    #[arg(long)]
    prefix: Option<String>,

    /// Append this to every output file stem
    #[arg(long)]
    suffix: Option<String>,

    /// Write outputs into this folder, relative to DIR
    #[arg(long)]
    subfolder: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "imgbatch")]
#[command(version)]
#[command(about = "Batch image processing for a folder")]
#[command(long_about = "\
Batch image processing for a folder

Every command scans one folder (not recursively) for images, applies one
transform to each, and writes the results next to or below the folder.
Files that fail are listed in the summary; they never stop the batch.

  photos/
  ├── a.png
  ├── b.jpg
  ├── resized/a.png            # imgbatch resize photos --width 800 --height 600
  ├── cropped/b.jpg            # imgbatch crop photos --left 10 --right 10
  ├── output/a.jpg             # imgbatch convert photos --format jpg --rotate 90
  ├── enhanced_images/         # imgbatch enhance photos
  │   └── enhanced_b.jpg
  └── b_nobg.png               # imgbatch remove-bg photos

Run 'imgbatch gen-config' to generate a documented imgbatch.toml.")]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Read settings from this TOML file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the final summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize every image to exact dimensions (aspect ratio is not kept)
    Resize {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Trim margins from every image
    Crop {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, default_value_t = 0)]
        left: u32,
        #[arg(long, default_value_t = 0)]
        top: u32,
        #[arg(long, default_value_t = 0)]
        right: u32,
        #[arg(long, default_value_t = 0)]
        bottom: u32,
    },
    /// Rotate, optionally resize, and convert to another format
    Convert {
        #[command(flatten)]
        batch: BatchArgs,
        /// Target format: jpeg, jpg, png, bmp or gif (anything else means jpg)
        #[arg(long)]
        format: String,
        /// Counter-clockwise rotation in degrees; the canvas grows to fit
        #[arg(long, allow_negative_numbers = true)]
        rotate: Option<f32>,
        #[arg(long, requires = "height")]
        width: Option<u32>,
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },
    /// Adjust brightness, contrast, sharpness and color (1.0 = unchanged)
    Enhance {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, default_value_t = 1.2, allow_negative_numbers = true)]
        brightness: f32,
        #[arg(long, default_value_t = 1.5, allow_negative_numbers = true)]
        contrast: f32,
        #[arg(long, default_value_t = 2.0, allow_negative_numbers = true)]
        sharpness: f32,
        #[arg(long, default_value_t = 1.5, allow_negative_numbers = true)]
        color: f32,
        /// Output folder, relative to the current directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cut out the foreground with a segmentation model
    ///
    /// Needs a build with the `onnx` feature (`cargo install imgbatch
    /// --features onnx`) and `<model>.onnx` in the models folder. Without
    /// the feature every file fails with an inference error.
    RemoveBg {
        #[command(flatten)]
        batch: BatchArgs,
        /// Model name, e.g. u2net, u2netp, u2net_human_seg, silueta
        #[arg(long)]
        model: Option<String>,
        /// High-precision edges
        #[arg(long)]
        alpha_matting: bool,
        #[arg(long)]
        foreground_threshold: Option<u8>,
        #[arg(long)]
        background_threshold: Option<u8>,
        #[arg(long)]
        erode_size: Option<u8>,
        /// Folder holding <model>.onnx files
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },
    /// Print a stock imgbatch.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let tool_config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(1));
        }
    };
    init_thread_pool(&tool_config.processing);

    let (job, models_dir) = build_job(cli.command, &tool_config)?;
    let engine = match &job.spec {
        TransformSpec::BackgroundRemoval(_) => {
            let engine = imaging::default_engine(&models_dir);
            if engine.is_none() {
                log::warn!("built without the `onnx` feature; background removal is unavailable");
            }
            engine
        }
        _ => None,
    };

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("Stopping after the current file...");
        on_interrupt.cancel();
    })?;

    let batch = process::spawn(job, engine, cancel);
    for event in batch.events.iter() {
        match (&event, cli.json) {
            (BatchEvent::Finished(_), true) => {}
            (_, true) => {
                for line in output::format_event(&event) {
                    eprintln!("{}", line);
                }
            }
            (_, false) => output::print_event(&event),
        }
    }
    let result = batch.join();

    match result {
        Ok(summary) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(match summary.outcome {
                BatchOutcome::Completed => ExitCode::SUCCESS,
                BatchOutcome::Aborted => ExitCode::from(130),
            })
        }
        Err(BatchError::DirectoryNotFound(path)) => {
            eprintln!("Error: input folder not found: {}", path.display());
            Ok(ExitCode::from(1))
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(ExitCode::from(1))
        }
    }
}

/// Turn the parsed command into a batch job. CLI flags win over config.
fn build_job(
    command: Command,
    config: &ToolConfig,
) -> Result<(BatchJob, PathBuf), Box<dyn std::error::Error>> {
    let standard = config.extensions.default_set();
    let extended = config.extensions.extended_set();
    let mut models_dir = config.background_removal.models_dir.clone();

    let (batch, spec, extensions, output_dir) = match command {
        Command::Resize {
            batch,
            width,
            height,
        } => (
            batch,
            TransformSpec::Resize(ResizeParams::new(width, height)),
            ExtensionSet::png_only(),
            None,
        ),
        Command::Crop {
            batch,
            left,
            top,
            right,
            bottom,
        } => (
            batch,
            TransformSpec::Crop(CropMargins {
                left,
                top,
                right,
                bottom,
            }),
            extended,
            None,
        ),
        Command::Convert {
            batch,
            format,
            rotate,
            width,
            height,
        } => {
            let mut params = RotateConvertParams::new(&format);
            params.rotate_degrees = rotate;
            params.resize = width.zip(height).map(|(w, h)| ResizeParams::new(w, h));
            (batch, TransformSpec::RotateConvert(params), extended, None)
        }
        Command::Enhance {
            batch,
            brightness,
            contrast,
            sharpness,
            color,
            output,
        } => {
            let factors = EnhanceFactors {
                brightness,
                contrast,
                sharpness,
                color,
            };
            let output_dir = match output {
                Some(dir) => Some(std::env::current_dir()?.join(dir)),
                None => None,
            };
            (batch, TransformSpec::Enhance(factors), extended, output_dir)
        }
        Command::RemoveBg {
            batch,
            model,
            alpha_matting,
            foreground_threshold,
            background_threshold,
            erode_size,
            models_dir: dir,
        } => {
            let mut options = config.background_removal.removal_options();
            if let Some(model) = model {
                options.model = model;
            }
            options.alpha_matting |= alpha_matting;
            if let Some(t) = foreground_threshold {
                options.foreground_threshold = t;
            }
            if let Some(t) = background_threshold {
                options.background_threshold = t;
            }
            if let Some(e) = erode_size {
                options.erode_size = e;
            }
            if let Some(dir) = dir {
                models_dir = dir;
            }
            (batch, TransformSpec::BackgroundRemoval(options), standard, None)
        }
        Command::GenConfig => return Err("gen-config does not run a batch".into()),
    };

    let mut job = BatchJob::new(batch.dir, spec);
    job.jpeg_quality = config.jpeg_quality();
    job.extensions = if batch.extensions.is_empty() {
        extensions
    } else {
        ExtensionSet::new(&batch.extensions)
    };
    if let Some(dir) = output_dir.or(batch.subfolder) {
        job.naming = job.naming.with_subfolder(dir);
    }
    if let Some(prefix) = batch.prefix {
        job.naming = job.naming.with_prefix(&prefix);
    }
    if let Some(suffix) = batch.suffix {
        job.naming = job.naming.with_suffix(&suffix);
    }
    Ok((job, models_dir))
}

/// `warn` by default, `-v` for info, `-vv` for debug. `RUST_LOG` wins.
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
