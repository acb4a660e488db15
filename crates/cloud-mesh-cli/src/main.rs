//! cloudmesh: Command-line batch completion of point clouds into meshes.
//!
//! Every input file is processed independently and written next to the
//! input as `<stem><suffix>.ply`. The process exits with status 1 when any
//! file fails.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=cloud_mesh=info` - Per-file summaries
//! - `RUST_LOG=cloud_mesh=debug` - Grid placement and stage detail
//! - `RUST_LOG=cloud_mesh::timing=info` - Stage timing only
//!
//! # Example
//!
//! ```bash
//! # Voxel completion with a 40³ grid
//! cloudmesh partial scans/*.pcd --patch-size 40
//!
//! # Convex hulls as binary PLY, JSON report
//! cloudmesh --format json hull scans/*.pcd --binary
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use cloud_mesh::{CompletionMethod, PlyEncoding};
use commands::{complete, info};

/// cloudmesh - Turn point clouds into triangle meshes.
#[derive(Parser)]
#[command(name = "cloudmesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Options shared by every completion command.
#[derive(Args, Clone)]
pub struct BatchArgs {
    /// Input point clouds (PCD, PLY, XYZ)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Appended to each input stem to form the output name
    #[arg(long)]
    suffix: Option<String>,

    /// Write binary little-endian PLY instead of ASCII
    #[arg(long)]
    binary: bool,

    /// Process files in parallel
    #[arg(long)]
    parallel: bool,
}

impl BatchArgs {
    fn encoding(&self) -> PlyEncoding {
        if self.binary {
            PlyEncoding::BinaryLittleEndian
        } else {
            PlyEncoding::Ascii
        }
    }
}

/// Voxel grid overrides for `partial`.
#[derive(Args, Clone, Default)]
pub struct GridArgs {
    /// TOML file with completion parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Voxels per grid axis
    #[arg(long)]
    patch_size: Option<usize>,

    /// Grid position of the cloud center along x, as a fraction of the grid
    #[arg(long)]
    percent_x: Option<f64>,

    /// Grid position of the cloud center along y, as a fraction of the grid
    #[arg(long)]
    percent_y: Option<f64>,

    /// Grid position of the cloud center along z, as a fraction of the grid
    #[arg(long)]
    percent_z: Option<f64>,

    /// Fraction of the grid spanned by the cloud's largest axis
    #[arg(long)]
    percent_patch_size: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Voxelize, extract the 0.5 isosurface, rescale to world space
    Partial {
        #[command(flatten)]
        batch: BatchArgs,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Delaunay-triangulate the (x, y) projection, keeping z
    Triangulate {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Convex hull of each cloud
    Hull {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Gaussian-process surface fit (not implemented, every file fails)
    Gp {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Display statistics of a PLY mesh
    Info {
        /// Input PLY mesh
        input: PathBuf,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "cloud_mesh=info",
            2 => "cloud_mesh=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Partial { batch, grid } => {
            complete::run(CompletionMethod::Partial, batch, Some(grid), &cli)
        }
        Commands::Triangulate { batch } => {
            complete::run(CompletionMethod::FastTriangulation, batch, None, &cli)
        }
        Commands::Hull { batch } => complete::run(CompletionMethod::ConvexHull, batch, None, &cli),
        Commands::Gp { batch } => {
            complete::run(CompletionMethod::GaussianProcess, batch, None, &cli)
        }
        Commands::Info { input } => info::run(input, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(cloud_err) = e.downcast_ref::<cloud_mesh::CloudError>() {
                output::cloud_error(cloud_err);
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_partial_flags() {
        let cli = Cli::try_parse_from([
            "cloudmesh",
            "-vv",
            "partial",
            "a.pcd",
            "b.pcd",
            "--patch-size",
            "40",
            "--percent-z",
            "0.5",
            "--suffix",
            "_p",
            "--binary",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Partial { batch, grid } => {
                assert_eq!(batch.inputs.len(), 2);
                assert_eq!(batch.suffix.as_deref(), Some("_p"));
                assert_eq!(batch.encoding(), PlyEncoding::BinaryLittleEndian);
                assert!(!batch.parallel);
                assert_eq!(grid.patch_size, Some(40));
                assert_eq!(grid.percent_z, Some(0.5));
                assert!(grid.percent_x.is_none());
            }
            _ => panic!("expected partial"),
        }
    }

    #[test]
    fn test_inputs_required() {
        assert!(Cli::try_parse_from(["cloudmesh", "hull"]).is_err());
        assert!(Cli::try_parse_from(["cloudmesh", "hull", "--patch-size", "3", "a.pcd"]).is_err());
    }

    #[test]
    fn test_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["cloudmesh", "gp", "a.pcd", "--format", "json", "-q"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(cli.quiet);
    }
}
