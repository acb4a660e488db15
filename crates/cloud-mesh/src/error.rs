//! Error types for point cloud completion with rich diagnostics.
//!
//! Every failure in the crate is a [`CloudError`]. Each variant carries:
//! - A machine-readable error code
//! - The offending file or parameter, when there is one
//! - A recovery suggestion
//! - A [`miette`] diagnostic for terminal display
//!
//! # Error Codes
//!
//! Codes follow the format `CLOUD-XXXX`:
//! - `CLOUD-1xxx`: Load errors (file reading, parsing, unsupported formats)
//! - `CLOUD-2xxx`: Invalid input (empty or degenerate clouds, bad rows)
//! - `CLOUD-3xxx`: Configuration errors (parameters, config files)
//! - `CLOUD-4xxx`: Processing errors (triangulation, hull, output)
//!
//! An all-empty occupancy grid is *not* an error; see
//! [`CompletionStats::is_empty_result`](crate::CompletionStats::is_empty_result).

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for completion operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Load errors (1xxx)
    /// CLOUD-1001: Failed to read file
    IoRead = 1001,
    /// CLOUD-1002: Failed to parse file contents
    ParseError = 1002,
    /// CLOUD-1003: File extension not recognized
    UnsupportedFormat = 1003,

    // Invalid input (2xxx)
    /// CLOUD-2001: Point cloud has no points
    EmptyCloud = 2001,
    /// CLOUD-2002: Bounding box has zero extent
    DegenerateCloud = 2002,
    /// CLOUD-2003: Data row does not have three coordinates
    InvalidDimensionality = 2003,
    /// CLOUD-2004: Point has a NaN or infinite coordinate
    InvalidCoordinate = 2004,

    // Configuration (3xxx)
    /// CLOUD-3001: Parameter out of range
    InvalidParameter = 3001,
    /// CLOUD-3002: Occupancy grid exceeds voxel budget
    GridTooLarge = 3002,
    /// CLOUD-3003: Config file could not be read or parsed
    ConfigError = 3003,

    // Processing (4xxx)
    /// CLOUD-4001: Failed to write output file
    IoWrite = 4001,
    /// CLOUD-4002: 2-D triangulation failed
    TriangulationFailed = 4002,
    /// CLOUD-4003: Convex hull computation failed
    HullFailed = 4003,
    /// CLOUD-4004: Completion method is not implemented
    NotImplemented = 4004,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `CLOUD-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "CLOUD-1001",
            ErrorCode::ParseError => "CLOUD-1002",
            ErrorCode::UnsupportedFormat => "CLOUD-1003",
            ErrorCode::EmptyCloud => "CLOUD-2001",
            ErrorCode::DegenerateCloud => "CLOUD-2002",
            ErrorCode::InvalidDimensionality => "CLOUD-2003",
            ErrorCode::InvalidCoordinate => "CLOUD-2004",
            ErrorCode::InvalidParameter => "CLOUD-3001",
            ErrorCode::GridTooLarge => "CLOUD-3002",
            ErrorCode::ConfigError => "CLOUD-3003",
            ErrorCode::IoWrite => "CLOUD-4001",
            ErrorCode::TriangulationFailed => "CLOUD-4002",
            ErrorCode::HullFailed => "CLOUD-4003",
            ErrorCode::NotImplemented => "CLOUD-4004",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad classes of failure, used for reporting and batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The input file could not be loaded.
    Load,
    /// The loaded cloud cannot be processed (empty, degenerate, malformed).
    InvalidInput,
    /// Parameters make the computation undefined.
    Configuration,
    /// A processing stage or the output writer failed.
    Processing,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Load => "load error",
            ErrorCategory::InvalidInput => "invalid input",
            ErrorCategory::Configuration => "configuration error",
            ErrorCategory::Processing => "processing error",
        };
        f.write_str(name)
    }
}

/// Recovery suggestions for completion errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Check the input file.
    CheckSourceFile { checks: Vec<String> },
    /// Convert the input to another supported format.
    UseDifferentFormat { suggested: Vec<String> },
    /// Adjust one or more parameters.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Use a different completion method.
    UseDifferentMethod { suggested: Vec<String> },
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::CheckSourceFile { checks } => {
                write!(f, "Check the input file for: {}", checks.join(", "))
            }
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Try using a different format: {}", suggested.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::UseDifferentMethod { suggested } => {
                write!(f, "Try a different method: {}", suggested.join(", "))
            }
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

/// Errors that can occur while loading, completing, or writing.
#[derive(Debug, Error, Diagnostic)]
pub enum CloudError {
    /// Error reading from a file.
    #[error("failed to read {path}")]
    #[diagnostic(
        code(cloud::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing file contents.
    #[error("failed to parse {path}: {details}")]
    #[diagnostic(
        code(cloud::parse::error),
        help("The file may be corrupted or use an unsupported variant of its format.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unrecognized file extension.
    #[error("unsupported point cloud format: {extension:?}")]
    #[diagnostic(
        code(cloud::format::unsupported),
        help("Supported point cloud formats: PCD, PLY, XYZ (also .txt, .asc, .pts)")
    )]
    UnsupportedFormat { extension: Option<String> },

    /// The cloud has no points.
    #[error("point cloud is empty: {details}")]
    #[diagnostic(
        code(cloud::input::empty),
        help("Completion needs at least one point. Check that the file contains data rows.")
    )]
    EmptyCloud { details: String },

    /// Every axis of the bounding box has zero span.
    #[error("point cloud is degenerate: largest extent is {max_extent}")]
    #[diagnostic(
        code(cloud::input::degenerate),
        help("All points coincide, so no voxel resolution can be derived.")
    )]
    DegenerateCloud { max_extent: f64 },

    /// A data row has fewer than three coordinates.
    #[error("{path}: row {row} has {found} columns, expected at least 3 (x y z)")]
    #[diagnostic(
        code(cloud::input::dimensionality),
        help("Every point must have exactly three coordinates.")
    )]
    InvalidDimensionality {
        path: PathBuf,
        row: usize,
        found: usize,
    },

    /// A point has a NaN or infinite coordinate.
    #[error("invalid coordinate at point {point_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(cloud::input::coordinate),
        help("Remove non-finite points from the cloud before completion.")
    )]
    InvalidCoordinate {
        point_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// A parameter is out of its valid range.
    #[error("invalid parameter {parameter} = {value}: {reason}")]
    #[diagnostic(code(cloud::config::parameter))]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The occupancy grid would exceed the voxel budget.
    #[error("occupancy grid too large: patch_size {patch_size} gives {total} voxels, limit is {max}")]
    #[diagnostic(
        code(cloud::config::grid_too_large),
        help("Lower patch_size or raise max_voxels.")
    )]
    GridTooLarge {
        patch_size: usize,
        total: usize,
        max: usize,
    },

    /// A config file could not be read or parsed.
    #[error("invalid config {path}: {details}")]
    #[diagnostic(code(cloud::config::file))]
    ConfigError { path: PathBuf, details: String },

    /// Error writing an output file.
    #[error("failed to write {path}")]
    #[diagnostic(
        code(cloud::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 2-D Delaunay triangulation failed.
    #[error("triangulation failed: {details}")]
    #[diagnostic(
        code(cloud::triangulation::failed),
        help("Fast triangulation needs at least three points that are not collinear in (x, y).")
    )]
    TriangulationFailed { details: String },

    /// Convex hull computation failed.
    #[error("convex hull failed: {details}")]
    #[diagnostic(
        code(cloud::hull::failed),
        help("The hull needs at least four points that are not coplanar.")
    )]
    HullFailed { details: String },

    /// The requested completion method has no implementation.
    #[error("{method} completion is not implemented: {details}")]
    #[diagnostic(code(cloud::method::not_implemented))]
    NotImplemented {
        method: &'static str,
        details: &'static str,
    },
}

impl CloudError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CloudError::IoRead { .. } => ErrorCode::IoRead,
            CloudError::ParseError { .. } => ErrorCode::ParseError,
            CloudError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            CloudError::EmptyCloud { .. } => ErrorCode::EmptyCloud,
            CloudError::DegenerateCloud { .. } => ErrorCode::DegenerateCloud,
            CloudError::InvalidDimensionality { .. } => ErrorCode::InvalidDimensionality,
            CloudError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            CloudError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            CloudError::GridTooLarge { .. } => ErrorCode::GridTooLarge,
            CloudError::ConfigError { .. } => ErrorCode::ConfigError,
            CloudError::IoWrite { .. } => ErrorCode::IoWrite,
            CloudError::TriangulationFailed { .. } => ErrorCode::TriangulationFailed,
            CloudError::HullFailed { .. } => ErrorCode::HullFailed,
            CloudError::NotImplemented { .. } => ErrorCode::NotImplemented,
        }
    }

    /// Returns the broad failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CloudError::IoRead { .. }
            | CloudError::ParseError { .. }
            | CloudError::UnsupportedFormat { .. } => ErrorCategory::Load,
            CloudError::EmptyCloud { .. }
            | CloudError::DegenerateCloud { .. }
            | CloudError::InvalidDimensionality { .. }
            | CloudError::InvalidCoordinate { .. } => ErrorCategory::InvalidInput,
            CloudError::InvalidParameter { .. }
            | CloudError::GridTooLarge { .. }
            | CloudError::ConfigError { .. } => ErrorCategory::Configuration,
            CloudError::IoWrite { .. }
            | CloudError::TriangulationFailed { .. }
            | CloudError::HullFailed { .. }
            | CloudError::NotImplemented { .. } => ErrorCategory::Processing,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            CloudError::IoRead { .. } => RecoverySuggestion::CheckSourceFile {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            CloudError::ParseError { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["ASCII PCD".into(), "PLY".into(), "XYZ".into()],
            },
            CloudError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["PCD".into(), "PLY".into(), "XYZ".into()],
            },
            CloudError::EmptyCloud { .. } | CloudError::InvalidDimensionality { .. } => {
                RecoverySuggestion::CheckSourceFile {
                    checks: vec!["data rows".into(), "FIELDS header".into()],
                }
            }
            CloudError::DegenerateCloud { .. } => RecoverySuggestion::UseDifferentMethod {
                suggested: vec!["a cloud with spatial extent".into()],
            },
            CloudError::InvalidCoordinate { .. } => RecoverySuggestion::CheckSourceFile {
                checks: vec!["NaN rows".into(), "export precision".into()],
            },
            CloudError::InvalidParameter { parameter, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![((*parameter).into(), "a positive, finite value".into())],
                }
            }
            CloudError::GridTooLarge { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![
                    ("patch_size".into(), "a smaller value".into()),
                    ("max_voxels".into(), "a larger value".into()),
                ],
            },
            CloudError::ConfigError { .. } => RecoverySuggestion::CheckSourceFile {
                checks: vec!["TOML syntax".into(), "parameter names".into()],
            },
            CloudError::IoWrite { .. } => RecoverySuggestion::CheckSourceFile {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            CloudError::TriangulationFailed { .. } => RecoverySuggestion::UseDifferentMethod {
                suggested: vec!["partial".into(), "hull".into()],
            },
            CloudError::HullFailed { .. } => RecoverySuggestion::UseDifferentMethod {
                suggested: vec!["partial".into(), "triangulate".into()],
            },
            CloudError::NotImplemented { .. } => RecoverySuggestion::UseDifferentMethod {
                suggested: vec!["partial".into(), "triangulate".into(), "hull".into()],
            },
        }
    }

    /// Returns the file this error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            CloudError::IoRead { path, .. }
            | CloudError::ParseError { path, .. }
            | CloudError::InvalidDimensionality { path, .. }
            | CloudError::ConfigError { path, .. }
            | CloudError::IoWrite { path, .. } => Some(path),
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CloudError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CloudError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        CloudError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an EmptyCloud error.
    pub fn empty_cloud(details: impl Into<String>) -> Self {
        CloudError::EmptyCloud {
            details: details.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(
        parameter: &'static str,
        value: impl std::fmt::Display,
        reason: &'static str,
    ) -> Self {
        CloudError::InvalidParameter {
            parameter,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a TriangulationFailed error.
    pub fn triangulation_failed(details: impl Into<String>) -> Self {
        CloudError::TriangulationFailed {
            details: details.into(),
        }
    }

    /// Create a HullFailed error.
    pub fn hull_failed(details: impl Into<String>) -> Self {
        CloudError::HullFailed {
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = CloudError::invalid_parameter("patch_size", 0, "must be positive");
        assert_eq!(err.code(), ErrorCode::InvalidParameter);
        assert_eq!(err.code().as_str(), "CLOUD-3001");
    }

    #[test]
    fn test_categories() {
        let err = CloudError::parse_error("a.pcd", "bad header");
        assert_eq!(err.category(), ErrorCategory::Load);

        let err = CloudError::DegenerateCloud { max_extent: 0.0 };
        assert_eq!(err.category(), ErrorCategory::InvalidInput);

        let err = CloudError::invalid_parameter("percent_patch_size", 0.0, "must be positive");
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = CloudError::NotImplemented {
            method: "gaussian process",
            details: "measurement model unspecified",
        };
        assert_eq!(err.category(), ErrorCategory::Processing);
    }

    #[test]
    fn test_recovery_names_parameter() {
        let err = CloudError::invalid_parameter("percent_patch_size", -1.0, "must be positive");
        match err.recovery_suggestion() {
            RecoverySuggestion::AdjustParameters { parameters } => {
                assert_eq!(parameters[0].0, "percent_patch_size");
            }
            other => panic!("Expected AdjustParameters, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let err = CloudError::InvalidDimensionality {
            path: PathBuf::from("scan.xyz"),
            row: 7,
            found: 2,
        };
        let display = format!("{}", err);
        assert!(display.contains("scan.xyz"));
        assert!(display.contains("row 7"));
        assert!(display.contains("2 columns"));
        assert_eq!(err.path(), Some(std::path::Path::new("scan.xyz")));
    }
}
