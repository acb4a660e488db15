//! cloudmesh partial/triangulate/hull/gp - batch completion commands.

use anyhow::{Context, Result, bail};
use cloud_mesh::{
    BatchConfig, BatchReport, CompletionMethod, CompletionParams, CompletionStats, run_batch,
};
use colored::Colorize;
use serde::Serialize;

use crate::{BatchArgs, Cli, GridArgs, OutputFormat, output};

#[derive(Serialize)]
struct BatchSummary {
    method: CompletionMethod,
    succeeded: usize,
    failed: usize,
    files: Vec<FileSummary>,
}

#[derive(Serialize)]
struct FileSummary {
    input: String,
    output: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<CompletionStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: String,
    message: String,
    suggestion: String,
}

/// Output suffix used when `--suffix` is not given.
fn default_suffix(method: CompletionMethod) -> &'static str {
    match method {
        CompletionMethod::Partial => "_partial",
        CompletionMethod::FastTriangulation => "_triangulation",
        CompletionMethod::ConvexHull => "_qhull",
        CompletionMethod::GaussianProcess => "_gp",
    }
}

/// Completion parameters from the config file, then flag overrides.
fn resolve_params(grid: Option<&GridArgs>) -> Result<CompletionParams> {
    let Some(grid) = grid else {
        return Ok(CompletionParams::default());
    };

    let mut params = match &grid.config {
        Some(path) => CompletionParams::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => CompletionParams::default(),
    };

    if let Some(v) = grid.patch_size {
        params.patch_size = v;
    }
    if let Some(v) = grid.percent_x {
        params.percent_x = v;
    }
    if let Some(v) = grid.percent_y {
        params.percent_y = v;
    }
    if let Some(v) = grid.percent_z {
        params.percent_z = v;
    }
    if let Some(v) = grid.percent_patch_size {
        params.percent_patch_size = v;
    }

    params.validate().context("Invalid completion parameters")?;
    Ok(params)
}

fn summarize(report: &BatchReport) -> BatchSummary {
    let files = report
        .outcomes
        .iter()
        .map(|outcome| FileSummary {
            input: outcome.input.display().to_string(),
            output: outcome.output.display().to_string(),
            success: outcome.is_success(),
            stats: outcome.stats().cloned(),
            error: outcome.error().map(|e| ErrorInfo {
                code: e.code().to_string(),
                message: e.to_string(),
                suggestion: e.recovery_suggestion().to_string(),
            }),
        })
        .collect();

    BatchSummary {
        method: report.method,
        succeeded: report.succeeded(),
        failed: report.failed(),
        files,
    }
}

pub fn run(
    method: CompletionMethod,
    batch: &BatchArgs,
    grid: Option<&GridArgs>,
    cli: &Cli,
) -> Result<()> {
    let params = resolve_params(grid)?;
    let suffix = batch
        .suffix
        .clone()
        .unwrap_or_else(|| default_suffix(method).to_string());

    let config = BatchConfig::new(method)
        .with_params(params)
        .with_suffix(suffix)
        .with_encoding(batch.encoding())
        .with_parallel(batch.parallel);

    output::info(
        &format!(
            "Running {} completion on {} file(s)",
            method,
            batch.inputs.len()
        ),
        cli.format,
        cli.quiet,
    );

    let report = run_batch(&batch.inputs, &config);
    let summary = summarize(&report);

    match cli.format {
        OutputFormat::Json => {
            output::print(&summary, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                print_text(&summary, &config);
            }
        }
    }

    if summary.failed > 0 {
        bail!(
            "{} of {} file(s) failed",
            summary.failed,
            summary.files.len()
        );
    }
    Ok(())
}

fn print_text(summary: &BatchSummary, config: &BatchConfig) {
    for file in &summary.files {
        match (&file.stats, &file.error) {
            (Some(stats), _) if stats.is_empty_result() => {
                output::warning(
                    &format!("{} → {} (empty mesh)", file.input, file.output),
                    OutputFormat::Text,
                    false,
                );
                if stats.discarded_points() > 0 {
                    println!(
                        "  {}: all {} points fell outside the {}³ grid",
                        "Discarded".yellow(),
                        stats.input_points,
                        config.params.patch_size
                    );
                }
            }
            (Some(stats), _) => {
                output::success(
                    &format!("{} → {}", file.input, file.output),
                    OutputFormat::Text,
                    false,
                );
                println!(
                    "  {}: {} vertices, {} faces",
                    "Mesh".cyan(),
                    stats.output_vertices,
                    stats.output_faces
                );
                if let Some(resolution) = stats.resolution {
                    println!("  {}: {:.6}", "Resolution".cyan(), resolution);
                }
                if stats.discarded_points() > 0 {
                    println!(
                        "  {}: {} of {} points outside the grid",
                        "Discarded".yellow(),
                        stats.discarded_points(),
                        stats.input_points
                    );
                }
            }
            (None, Some(error)) => {
                eprintln!("{} {}", "✗".red().bold(), file.input);
                eprintln!("  {}: {}", "Error".red(), error.message);
                eprintln!("  {}: {}", "Code".cyan(), error.code);
                eprintln!("  {}: {}", "Suggestion".green(), error.suggestion);
            }
            (None, None) => {}
        }
    }

    println!(
        "{}: {} succeeded, {} failed",
        "Summary".bold(),
        summary.succeeded.to_string().green(),
        if summary.failed > 0 {
            summary.failed.to_string().red()
        } else {
            summary.failed.to_string().normal()
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::ffi::OsString;
    use std::fs;
    use tempfile::TempDir;

    fn write_cube(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
        let mut text = String::new();
        for i in 0..=4 {
            for j in 0..=4 {
                for k in 0..=4 {
                    text.push_str(&format!("{} {} {}\n", i, j, k));
                }
            }
        }
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_default_suffixes_set() {
        let methods = [
            CompletionMethod::Partial,
            CompletionMethod::FastTriangulation,
            CompletionMethod::ConvexHull,
            CompletionMethod::GaussianProcess,
        ];
        for m in methods {
            assert!(!default_suffix(m).is_empty());
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("grid.toml");
        fs::write(&config, "patch_size = 64\npercent_z = 0.3\n").unwrap();

        let grid = GridArgs {
            config: Some(config),
            patch_size: Some(32),
            ..Default::default()
        };
        let params = resolve_params(Some(&grid)).unwrap();
        assert_eq!(params.patch_size, 32);
        assert_eq!(params.percent_z, 0.3);
        assert_eq!(params.percent_x, 0.5);
    }

    #[test]
    fn test_invalid_params_rejected_before_batch() {
        let grid = GridArgs {
            percent_patch_size: Some(0.0),
            ..Default::default()
        };
        let err = resolve_params(Some(&grid)).unwrap_err();
        assert!(err.downcast_ref::<cloud_mesh::CloudError>().is_some());
    }

    #[test]
    fn test_run_writes_outputs_and_reports_failures() {
        let dir = TempDir::new().unwrap();
        let good = write_cube(dir.path(), "good.xyz");
        let missing = dir.path().join("missing.xyz");

        let args: Vec<OsString> = vec![
            "cloudmesh".into(),
            "-q".into(),
            "partial".into(),
            good.into(),
            missing.into(),
            "--patch-size".into(),
            "12".into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let crate::Commands::Partial { batch, grid } = &cli.command else {
            panic!("expected partial");
        };

        let result = run(CompletionMethod::Partial, batch, Some(grid), &cli);
        assert!(result.is_err());
        assert!(dir.path().join("good_partial.ply").exists());
    }
}
