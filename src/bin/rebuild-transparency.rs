use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rebuild_transparency::{
    default_output_path, AlphaStrategy, Background, ProcessResult, UnblendEngine, UnblendOptions,
};

#[derive(Parser)]
#[command(
    name = "rebuild-transparency",
    about = "Restore the transparency of edges anti-aliased against a solid white background",
    version,
    after_help = "Cut the flat background away first (leave the anti-aliased fringe in place),\n\
                  then run this tool on the result and layer its output back over the image."
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_transparent.png)
    #[arg(short, long)]
    output: Option<String>,

    /// Backdrop the image was flattened against (#rrggbb, #rgb, white, black)
    #[arg(short, long, default_value_t = Background::WHITE)]
    background: Background,

    /// How channel coverage becomes alpha (max, average, luminance)
    #[arg(short, long, default_value_t = AlphaStrategy::Max)]
    strategy: AlphaStrategy,

    /// Discard any transparency already present in the input
    #[arg(long)]
    ignore_alpha: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let options = UnblendOptions {
        background: cli.background,
        strategy: cli.strategy,
        ignore_input_alpha: cli.ignore_alpha,
    };
    let engine = UnblendEngine::new(options);

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    tracing::info!(
        background = %options.background,
        strategy = %options.strategy,
        ignore_alpha = options.ignore_input_alpha,
        "restoring transparency"
    );

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: rebuild-transparency <input_dir> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![engine.process_file(input_path, &output_path)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &cli);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if !result.success {
        eprintln!("[FAIL] {filename}: {}", result.message);
        return;
    }
    if cli.quiet {
        return;
    }

    eprintln!("[OK] {filename} -> {}", result.output.display());
    if let (true, Some(stats)) = (cli.verbose, result.stats) {
        eprintln!(
            "  -> {} transparent, {} partial, {} opaque (of {})",
            stats.transparent,
            stats.partial,
            stats.opaque,
            stats.total()
        );
    }
}
