use cardstock::config::{self, CliOverrides, ConfigError};
use cardstock::document::DocumentError;
use cardstock::output;
use cardstock::pipeline::{self, PipelineError, RenderJob};
use cardstock::surface::ChromeSurface;
use cardstock::theme::Theme;
use cardstock::types::PagingMode;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "cardstock")]
#[command(about = "Render a markdown note into themed PNG cards")]
#[command(long_about = "\
Render a markdown note into themed PNG cards

The optional YAML front matter drives the cover; the body becomes one or
more cards at a fixed width:

  ---
  emoji: 🚀
  title: Launch notes
  subtitle: Week one
  ---
  First card
  ---
  Second card

  #tags #on_the_last_line

Paging modes:
  separator   split on --- lines, each card grows to fit (default)
  auto-fit    one card at the base height, content scaled down to fit
  auto-split  split between blocks by rendered height
  dynamic     one card whose height follows the content, up to --max-height

Output: cover.png (when the front matter has an emoji or title) and
card_1.png .. card_N.png. Requires Chrome or Chromium.

Set RUST_LOG=debug to see layout measurements.
Run 'cardstock --gen-config' to print a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Markdown file to render
    #[arg(required_unless_present = "gen_config")]
    file: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Visual theme
    #[arg(short, long, value_enum)]
    theme: Option<Theme>,

    /// Paging mode
    #[arg(short, long, value_enum)]
    mode: Option<PagingMode>,

    /// Card width in CSS pixels
    #[arg(short, long)]
    width: Option<u32>,

    /// Base card height in CSS pixels
    #[arg(long)]
    height: Option<u32>,

    /// Maximum card height in dynamic mode
    #[arg(long)]
    max_height: Option<u32>,

    /// Device pixel ratio of the output images
    #[arg(long)]
    dpr: Option<u32>,

    /// Body cards to render in parallel
    #[arg(long)]
    jobs: Option<usize>,

    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a stock config file with all options documented
    #[arg(long)]
    gen_config: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            theme: self.theme,
            mode: self.mode,
            width: self.width,
            height: self.height,
            max_height: self.max_height,
            device_pixel_ratio: self.dpr,
            jobs: self.jobs,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("render failed: {0}")]
    Render(PipelineError),
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Document(DocumentError::NotFound(path)) => CliError::NotFound(path),
            other => CliError::Render(other),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }
    let Some(input) = cli.file.as_deref() else {
        return ExitCode::FAILURE;
    };

    match run(&cli, input) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, input: &Path) -> Result<(), CliError> {
    if !input.is_file() {
        return Err(CliError::NotFound(input.to_path_buf()));
    }

    let mut render_config = config::load_config(cli.config.as_deref())?;
    render_config.apply_overrides(&cli.overrides());
    render_config.validate()?;

    let spec = render_config.render_spec();
    let job = RenderJob {
        spec,
        style: render_config.theme_table().resolve(spec.theme),
        settle: render_config.settle_timings(),
        jobs: config::effective_jobs(render_config.jobs),
    };
    let surface = ChromeSurface::new()
        .with_executable(render_config.browser.path.clone())
        .with_sandbox(render_config.browser.sandbox);

    output::print_header(input, &spec);
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });
    let result = pipeline::render_file(input, &job, &surface, &cli.output_dir, Some(tx));
    // The sender is dropped with the pipeline call, so the printer drains and exits.
    printer.join().ok();

    let report = result?;
    output::print_summary(&report);
    Ok(())
}
