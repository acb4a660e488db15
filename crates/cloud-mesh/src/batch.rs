//! Batch completion over many files.
//!
//! Each input path is an independent unit of work: load the cloud, complete
//! it, write `<stem><suffix>.ply` next to the input. A failure in one file is
//! recorded in its [`FileOutcome`] and the batch moves on.
//!
//! ```ignore
//! use cloud_mesh::batch::partial_completion;
//! use cloud_mesh::CompletionParams;
//!
//! let report = partial_completion(&["a.pcd", "b.pcd"], &CompletionParams::default(), "_partial");
//! for outcome in report.failures() {
//!     eprintln!("{}: {}", outcome.input.display(), outcome.error().unwrap());
//! }
//! ```

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::completion::{CompletionMethod, CompletionParams, CompletionStats, complete};
use crate::error::{CloudError, CloudResult};
use crate::io::{PlyEncoding, load_point_cloud, save_ply};
use crate::tracing_ext::OperationTimer;

/// How a batch is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Completion method applied to every file.
    pub method: CompletionMethod,

    /// Inserted between the input stem and `.ply`. Default: empty
    pub suffix: String,

    /// PLY output encoding. Default: ASCII
    pub encoding: PlyEncoding,

    /// Process files on the rayon pool. Default: false
    pub parallel: bool,

    /// Voxel completion parameters.
    pub params: CompletionParams,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            method: CompletionMethod::Partial,
            suffix: String::new(),
            encoding: PlyEncoding::Ascii,
            parallel: false,
            params: CompletionParams::default(),
        }
    }
}

impl BatchConfig {
    /// Batch with the given method and default settings.
    pub fn new(method: CompletionMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Set completion parameters.
    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    /// Set the output suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the PLY encoding.
    pub fn with_encoding(mut self, encoding: PlyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Output mesh path for `input`: same directory, extension replaced by
/// `.ply`, `suffix` appended to the stem.
///
/// `scans/cloud.pcd` with `_partial` becomes `scans/cloud_partial.ply`.
pub fn output_path_for(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}.ply", stem, suffix))
}

/// Result of processing one input file.
#[derive(Debug)]
pub struct FileOutcome {
    /// Input path as given.
    pub input: PathBuf,
    /// Where the mesh was (or would have been) written.
    pub output: PathBuf,
    /// Completion statistics, or why the file failed.
    pub result: CloudResult<CompletionStats>,
}

impl FileOutcome {
    /// True if a mesh was written.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Statistics if the file succeeded.
    pub fn stats(&self) -> Option<&CompletionStats> {
        self.result.as_ref().ok()
    }

    /// Error if the file failed.
    pub fn error(&self) -> Option<&CloudError> {
        self.result.as_ref().err()
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    /// Method the batch ran.
    pub method: CompletionMethod,
    /// One outcome per input path.
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    /// Number of files that produced a mesh.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of files that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when every file succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Outcomes of failed files.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Process every path with `config`. Never fails as a whole.
pub fn run_batch<P: AsRef<Path> + Sync>(paths: &[P], config: &BatchConfig) -> BatchReport {
    let _timer = OperationTimer::new("batch");
    info!(
        method = %config.method,
        files = paths.len(),
        parallel = config.parallel,
        "Starting batch"
    );

    let outcomes: Vec<FileOutcome> = if config.parallel {
        // collect() on an indexed parallel iterator keeps input order
        paths
            .par_iter()
            .map(|p| process_file(p.as_ref(), config))
            .collect()
    } else {
        paths
            .iter()
            .map(|p| process_file(p.as_ref(), config))
            .collect()
    };

    let report = BatchReport {
        method: config.method,
        outcomes,
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Batch finished"
    );
    report
}

fn process_file(input: &Path, config: &BatchConfig) -> FileOutcome {
    let output = output_path_for(input, &config.suffix);
    let result = complete_file(input, &output, config);

    match &result {
        Ok(stats) if stats.is_empty_result() => warn!(
            input = %input.display(),
            output = %output.display(),
            "Wrote empty mesh"
        ),
        Ok(stats) => info!(
            input = %input.display(),
            output = %output.display(),
            vertices = stats.output_vertices,
            faces = stats.output_faces,
            "Completed"
        ),
        Err(e) => error!(input = %input.display(), code = %e.code(), "{}", e),
    }

    FileOutcome {
        input: input.to_path_buf(),
        output,
        result,
    }
}

fn complete_file(input: &Path, output: &Path, config: &BatchConfig) -> CloudResult<CompletionStats> {
    if input == output {
        return Err(CloudError::invalid_parameter(
            "suffix",
            format!("{:?}", config.suffix),
            "output would overwrite the input file",
        ));
    }

    let cloud = load_point_cloud(input)?;
    let completed = complete(&cloud, config.method, &config.params)?;
    save_ply(&completed.mesh, output, config.encoding)?;
    Ok(completed.stats)
}

fn run_method<P: AsRef<Path> + Sync>(
    paths: &[P],
    method: CompletionMethod,
    params: &CompletionParams,
    suffix: &str,
) -> BatchReport {
    let config = BatchConfig::new(method)
        .with_params(params.clone())
        .with_suffix(suffix);
    run_batch(paths, &config)
}

/// Voxel completion of each file.
pub fn partial_completion<P: AsRef<Path> + Sync>(
    paths: &[P],
    params: &CompletionParams,
    suffix: &str,
) -> BatchReport {
    run_method(paths, CompletionMethod::Partial, params, suffix)
}

/// 2-D Delaunay triangulation of each file.
pub fn fast_triangulation<P: AsRef<Path> + Sync>(paths: &[P], suffix: &str) -> BatchReport {
    run_method(
        paths,
        CompletionMethod::FastTriangulation,
        &CompletionParams::default(),
        suffix,
    )
}

/// Convex hull of each file.
pub fn qhull_completion<P: AsRef<Path> + Sync>(paths: &[P], suffix: &str) -> BatchReport {
    run_method(
        paths,
        CompletionMethod::ConvexHull,
        &CompletionParams::default(),
        suffix,
    )
}

/// Gaussian-process completion of each file. Every file currently fails
/// with [`CloudError::NotImplemented`].
pub fn gaussian_process_completion<P: AsRef<Path> + Sync>(
    paths: &[P],
    suffix: &str,
) -> BatchReport {
    run_method(
        paths,
        CompletionMethod::GaussianProcess,
        &CompletionParams::default(),
        suffix,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_cube_xyz(dir: &Path, name: &str) -> PathBuf {
        let mut text = String::new();
        for i in 0..=6 {
            for j in 0..=6 {
                for k in 0..=6 {
                    let (x, y, z) = (i as f64 * 0.5, j as f64 * 0.5, k as f64 * 0.5);
                    text.push_str(&format!("{} {} {}\n", x, y, z));
                }
            }
        }
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("cloud.pcd"), "_partial"),
            PathBuf::from("cloud_partial.ply")
        );
        assert_eq!(
            output_path_for(Path::new("/data/scans/bun0.pcd"), ""),
            PathBuf::from("/data/scans/bun0.ply")
        );
        assert_eq!(
            output_path_for(Path::new("a.b.xyz"), "_hull"),
            PathBuf::from("a.b_hull.ply")
        );
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let good = write_cube_xyz(dir.path(), "good.xyz");
        let missing = dir.path().join("missing.pcd");
        let also_good = write_cube_xyz(dir.path(), "also_good.xyz");

        let params = CompletionParams::default().with_patch_size(16);
        let report = partial_completion(&[&good, &missing, &also_good], &params, "_partial");

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_succeeded());

        assert_eq!(report.outcomes[0].input, good);
        assert!(report.outcomes[0].output.exists());
        assert!(matches!(
            report.outcomes[1].error(),
            Some(CloudError::IoRead { .. })
        ));
        assert!(!report.outcomes[1].output.exists());
        assert!(dir.path().join("also_good_partial.ply").exists());
    }

    #[test]
    fn test_parallel_keeps_input_order() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| write_cube_xyz(dir.path(), &format!("cloud{}.xyz", i)))
            .collect();

        let config = BatchConfig::new(CompletionMethod::Partial)
            .with_params(CompletionParams::preview())
            .with_suffix("_partial")
            .with_parallel(true);
        let report = run_batch(&paths, &config);

        assert!(report.all_succeeded());
        for (outcome, path) in report.outcomes.iter().zip(&paths) {
            assert_eq!(&outcome.input, path);
            assert!(!outcome.stats().unwrap().is_empty_result());
            assert!(outcome.output.exists());
        }
    }

    #[test]
    fn test_gaussian_process_fails_each_file() {
        let dir = TempDir::new().unwrap();
        let a = write_cube_xyz(dir.path(), "a.xyz");
        let b = write_cube_xyz(dir.path(), "b.xyz");

        let report = gaussian_process_completion(&[a, b], "_gp");
        assert_eq!(report.failed(), 2);
        for outcome in report.failures() {
            assert!(matches!(
                outcome.error(),
                Some(CloudError::NotImplemented { .. })
            ));
            assert!(!outcome.output.exists());
        }
    }

    #[test]
    fn test_refuses_to_overwrite_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("cloud.ply");
        fs::write(
            &input,
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n",
        )
        .unwrap();

        let report = qhull_completion(&[&input], "");
        assert!(matches!(
            report.outcomes[0].error(),
            Some(CloudError::InvalidParameter { parameter: "suffix", .. })
        ));
        assert!(fs::read_to_string(&input).unwrap().contains("element vertex 1"));
    }

    #[test]
    fn test_batch_config_toml() {
        let config = BatchConfig::new(CompletionMethod::FastTriangulation)
            .with_suffix("_tri")
            .with_encoding(PlyEncoding::BinaryLittleEndian);
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("method = \"fast_triangulation\""));

        let parsed: BatchConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);

        let parsed: BatchConfig = toml::from_str("suffix = \"_x\"\n[params]\npatch_size = 30\n").unwrap();
        assert_eq!(parsed.method, CompletionMethod::Partial);
        assert_eq!(parsed.params.patch_size, 30);
        assert_eq!(parsed.params.percent_z, 0.45);
    }
}
