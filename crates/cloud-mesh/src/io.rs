//! Point cloud loading and PLY mesh output.
//!
//! Inputs are detected by extension:
//! - PCD (Point Cloud Library), `DATA ascii` and `DATA binary`
//! - PLY, any encoding `ply-rs` reads
//! - XYZ text (`.xyz`, `.txt`, `.asc`, `.pts`): whitespace-separated `x y z`
//!   rows, extra columns ignored
//!
//! Meshes are written as PLY with float vertices and `vertex_indices` face
//! lists, ASCII by default.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ply_rs::ply::Property;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CloudError, CloudResult};
use crate::pointcloud::PointCloud;
use crate::{Mesh, Vertex};

// ============================================================================
// Point cloud formats
// ============================================================================

/// Supported point cloud file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointCloudFormat {
    /// PCD (Point Cloud Data - PCL format)
    Pcd,
    /// PLY (Stanford Polygon File Format)
    Ply,
    /// XYZ (simple ASCII x y z format)
    Xyz,
}

impl PointCloudFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "pcd" => Some(PointCloudFormat::Pcd),
                "ply" => Some(PointCloudFormat::Ply),
                "xyz" | "txt" | "asc" | "pts" => Some(PointCloudFormat::Xyz),
                _ => None,
            })
    }
}

/// Load a point cloud, auto-detecting the format.
///
/// A file that parses but holds no points is an error, never an empty cloud.
pub fn load_point_cloud(path: impl AsRef<Path>) -> CloudResult<PointCloud> {
    let path = path.as_ref();
    let format = PointCloudFormat::from_path(path).ok_or_else(|| CloudError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    })?;

    info!("Loading point cloud from {:?} (format: {:?})", path, format);

    let cloud = match format {
        PointCloudFormat::Pcd => load_pcd(path)?,
        PointCloudFormat::Ply => load_ply_cloud(path)?,
        PointCloudFormat::Xyz => load_xyz(path)?,
    };

    if cloud.is_empty() {
        return Err(CloudError::empty_cloud(format!(
            "{} contains no points",
            path.display()
        )));
    }

    info!("Loaded {} points", cloud.len());
    Ok(cloud)
}

/// Load point cloud from XYZ file.
fn load_xyz(path: &Path) -> CloudResult<PointCloud> {
    let file = File::open(path).map_err(|e| CloudError::io_read(path, e))?;
    let reader = BufReader::new(file);

    let mut cloud = PointCloud::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| CloudError::io_read(path, e))?;

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(CloudError::InvalidDimensionality {
                path: path.to_path_buf(),
                row: line_num + 1,
                found: parts.len(),
            });
        }

        let mut xyz = [0.0f64; 3];
        for (axis, (value, token)) in xyz.iter_mut().zip(&parts).enumerate() {
            *value = token.parse().map_err(|_| {
                CloudError::parse_error(
                    path,
                    format!(
                        "invalid {} coordinate {:?} on line {}",
                        ["x", "y", "z"][axis],
                        token,
                        line_num + 1
                    ),
                )
            })?;
        }

        cloud.push_coords(xyz[0], xyz[1], xyz[2]);
    }

    Ok(cloud)
}

/// Load the vertex element of a PLY file as a point cloud.
fn load_ply_cloud(path: &Path) -> CloudResult<PointCloud> {
    let ply = read_ply(path)?;

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| CloudError::parse_error(path, "PLY file has no vertex element"))?;

    let mut cloud = PointCloud::with_capacity(vertices.len());
    for vertex_element in vertices {
        let x = get_ply_float(vertex_element.get("x"), "x", path)?;
        let y = get_ply_float(vertex_element.get("y"), "y", path)?;
        let z = get_ply_float(vertex_element.get("z"), "z", path)?;
        cloud.push_coords(x, y, z);
    }

    Ok(cloud)
}

// ============================================================================
// PCD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PcdData {
    Ascii,
    Binary,
}

#[derive(Debug)]
struct PcdHeader {
    fields: Vec<String>,
    sizes: Vec<usize>,
    types: Vec<char>,
    counts: Vec<usize>,
    points: usize,
    data: PcdData,
}

impl PcdHeader {
    fn field_index(&self, name: &str, path: &Path) -> CloudResult<usize> {
        self.fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| CloudError::parse_error(path, format!("PCD has no {} field", name)))
    }

    /// Column of the first value of field `i` in an ASCII row.
    ///
    /// Saturates on absurd COUNT values, which then fail the row-length check.
    fn column(&self, i: usize) -> usize {
        self.counts[..i]
            .iter()
            .fold(0usize, |acc, &c| acc.saturating_add(c))
    }

    /// Byte offset of field `i` within a binary record, `None` on overflow.
    fn byte_offset(&self, i: usize) -> Option<usize> {
        (0..i).try_fold(0usize, |acc, j| {
            acc.checked_add(self.sizes[j].checked_mul(self.counts[j])?)
        })
    }

    fn record_size(&self) -> Option<usize> {
        self.byte_offset(self.fields.len())
    }
}

/// Upper bound on up-front allocation for a cloud whose size comes from a
/// file header. Larger clouds still load; the vector grows as rows arrive.
const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

fn parse_pcd_header(reader: &mut impl BufRead, path: &Path) -> CloudResult<PcdHeader> {
    let mut fields: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut types: Vec<char> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width: usize = 0;
    let mut height: usize = 1;
    let mut points: Option<usize> = None;

    let parse_usize = |token: &str, key: &str| -> CloudResult<usize> {
        token
            .parse()
            .map_err(|_| CloudError::parse_error(path, format!("invalid {} value {:?}", key, token)))
    };

    let data = loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| CloudError::io_read(path, e))?;
        if read == 0 {
            return Err(CloudError::parse_error(path, "PCD header has no DATA line"));
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let key = tokens.next().unwrap_or_default().to_ascii_uppercase();
        let values: Vec<&str> = tokens.collect();

        match key.as_str() {
            "FIELDS" => fields = values.iter().map(|s| s.to_lowercase()).collect(),
            "SIZE" => {
                sizes = values
                    .iter()
                    .map(|s| parse_usize(s, "SIZE"))
                    .collect::<CloudResult<_>>()?
            }
            "TYPE" => types = values.iter().filter_map(|s| s.chars().next()).collect(),
            "COUNT" => {
                counts = values
                    .iter()
                    .map(|s| parse_usize(s, "COUNT"))
                    .collect::<CloudResult<_>>()?
            }
            "WIDTH" => width = parse_usize(values.first().copied().unwrap_or(""), "WIDTH")?,
            "HEIGHT" => height = parse_usize(values.first().copied().unwrap_or(""), "HEIGHT")?,
            "POINTS" => points = Some(parse_usize(values.first().copied().unwrap_or(""), "POINTS")?),
            "DATA" => match values.first().map(|s| s.to_ascii_lowercase()).as_deref() {
                Some("ascii") => break PcdData::Ascii,
                Some("binary") => break PcdData::Binary,
                other => {
                    return Err(CloudError::parse_error(
                        path,
                        format!("unsupported PCD DATA encoding {:?}", other.unwrap_or("")),
                    ));
                }
            },
            _ => {}
        }
    };

    if fields.is_empty() {
        return Err(CloudError::parse_error(path, "PCD header has no FIELDS line"));
    }
    if counts.is_empty() {
        counts = vec![1; fields.len()];
    }
    if counts.len() != fields.len() {
        return Err(CloudError::parse_error(
            path,
            format!("COUNT lists {} values for {} fields", counts.len(), fields.len()),
        ));
    }
    if data == PcdData::Binary && (sizes.len() != fields.len() || types.len() != fields.len()) {
        return Err(CloudError::parse_error(
            path,
            "binary PCD needs SIZE and TYPE for every field",
        ));
    }

    let organized = width.checked_mul(height).ok_or_else(|| {
        CloudError::parse_error(
            path,
            format!("WIDTH {} x HEIGHT {} overflows the point count", width, height),
        )
    })?;

    Ok(PcdHeader {
        fields,
        sizes,
        types,
        counts,
        points: points.unwrap_or(organized),
        data,
    })
}

/// Load point cloud from PCD file (Point Cloud Library format).
///
/// Points with a NaN coordinate mark invalid samples in organized clouds
/// and are skipped.
fn load_pcd(path: &Path) -> CloudResult<PointCloud> {
    let file = File::open(path).map_err(|e| CloudError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    let header = parse_pcd_header(&mut reader, path)?;
    let axes = [
        header.field_index("x", path)?,
        header.field_index("y", path)?,
        header.field_index("z", path)?,
    ];
    debug!(
        fields = ?header.fields,
        points = header.points,
        data = ?header.data,
        "PCD header"
    );

    let (cloud, skipped) = match header.data {
        PcdData::Ascii => read_pcd_ascii(reader, &header, axes, path)?,
        PcdData::Binary => read_pcd_binary(reader, &header, axes, path)?,
    };

    if skipped > 0 {
        warn!(skipped, "Skipped PCD points with NaN coordinates");
    }
    Ok(cloud)
}

fn read_pcd_ascii(
    reader: impl BufRead,
    header: &PcdHeader,
    axes: [usize; 3],
    path: &Path,
) -> CloudResult<(PointCloud, usize)> {
    let columns = axes.map(|i| header.column(i));
    let needed = columns.iter().max().map_or(0, |&c| c.saturating_add(1));

    let mut cloud = PointCloud::with_capacity(header.points.min(MAX_PREALLOCATED_POINTS));
    let mut skipped = 0;

    for (row, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| CloudError::io_read(path, e))?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() < needed {
            return Err(CloudError::InvalidDimensionality {
                path: path.to_path_buf(),
                row: row + 1,
                found: parts.len(),
            });
        }

        let mut xyz = [0.0f64; 3];
        for (value, &col) in xyz.iter_mut().zip(&columns) {
            *value = parse_pcd_value(parts[col], path, row + 1)?;
        }

        if xyz.iter().any(|v| v.is_nan()) {
            skipped += 1;
            continue;
        }
        cloud.push_coords(xyz[0], xyz[1], xyz[2]);
    }

    Ok((cloud, skipped))
}

fn parse_pcd_value(token: &str, path: &Path, row: usize) -> CloudResult<f64> {
    if token.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    token.parse().map_err(|_| {
        CloudError::parse_error(path, format!("invalid value {:?} in data row {}", token, row))
    })
}

fn read_pcd_binary(
    mut reader: impl Read,
    header: &PcdHeader,
    axes: [usize; 3],
    path: &Path,
) -> CloudResult<(PointCloud, usize)> {
    for &i in &axes {
        let ok = header.types[i].eq_ignore_ascii_case(&'F') && matches!(header.sizes[i], 4 | 8);
        if !ok {
            return Err(CloudError::parse_error(
                path,
                format!(
                    "field {} has TYPE {} SIZE {}, expected a 4 or 8 byte float",
                    header.fields[i], header.types[i], header.sizes[i]
                ),
            ));
        }
    }

    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| CloudError::io_read(path, e))?;

    let record = header
        .record_size()
        .filter(|&r| r > 0)
        .ok_or_else(|| {
            CloudError::parse_error(path, "PCD SIZE x COUNT gives no usable record size")
        })?;
    let expected = record.checked_mul(header.points).ok_or_else(|| {
        CloudError::parse_error(
            path,
            format!("POINTS {} of {} bytes overflows", header.points, record),
        )
    })?;
    if bytes.len() < expected {
        return Err(CloudError::parse_error(
            path,
            format!(
                "binary data holds {} bytes, expected {} points of {} bytes",
                bytes.len(),
                header.points,
                record
            ),
        ));
    }

    // Every prefix of a record fits in `record`, so these cannot overflow
    let offsets = axes.map(|i| (header.byte_offset(i).unwrap_or(0), header.sizes[i]));
    let mut cloud = PointCloud::with_capacity(header.points);
    let mut skipped = 0;

    for chunk in bytes.chunks_exact(record).take(header.points) {
        let xyz = offsets.map(|(offset, size)| read_le_float(&chunk[offset..offset + size]));
        if xyz.iter().any(|v| v.is_nan()) {
            skipped += 1;
            continue;
        }
        cloud.push_coords(xyz[0], xyz[1], xyz[2]);
    }

    Ok((cloud, skipped))
}

fn read_le_float(bytes: &[u8]) -> f64 {
    match bytes.len() {
        4 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        _ => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            f64::from_le_bytes(buf)
        }
    }
}

// ============================================================================
// PLY meshes
// ============================================================================

/// PLY output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlyEncoding {
    /// Human-readable text.
    #[default]
    Ascii,
    /// Binary little-endian.
    BinaryLittleEndian,
}

/// Save a mesh as PLY.
///
/// Vertices are written as `float` x/y/z, faces as `vertex_indices` lists
/// of `int`.
pub fn save_ply(mesh: &Mesh, path: impl AsRef<Path>, encoding: PlyEncoding) -> CloudResult<()> {
    use ply_rs::ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, PropertyDef, PropertyType, ScalarType,
    };
    use ply_rs::writer::Writer;

    let path = path.as_ref();
    info!("Saving mesh to {:?} (PLY {:?})", path, encoding);

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = match encoding {
        PlyEncoding::Ascii => Encoding::Ascii,
        PlyEncoding::BinaryLittleEndian => Encoding::BinaryLittleEndian,
    };

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for name in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
    vertex_def.count = mesh.vertices.len();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.faces.len();
    ply.header.elements.add(face_def);

    let mut vertices_payload: Vec<DefaultElement> = Vec::with_capacity(mesh.vertices.len());
    for v in &mesh.vertices {
        let mut element = DefaultElement::new();
        element.insert("x".to_string(), Property::Float(v.position.x as f32));
        element.insert("y".to_string(), Property::Float(v.position.y as f32));
        element.insert("z".to_string(), Property::Float(v.position.z as f32));
        vertices_payload.push(element);
    }
    ply.payload.insert("vertex".to_string(), vertices_payload);

    let mut faces_payload: Vec<DefaultElement> = Vec::with_capacity(mesh.faces.len());
    for face in &mesh.faces {
        let mut element = DefaultElement::new();
        element.insert(
            "vertex_indices".to_string(),
            Property::ListInt(face.iter().map(|&i| i as i32).collect()),
        );
        faces_payload.push(element);
    }
    ply.payload.insert("face".to_string(), faces_payload);

    // Header counts must match payload for ply-rs
    ply.make_consistent().map_err(|e| {
        CloudError::io_write(
            path,
            std::io::Error::other(format!("PLY consistency error: {:?}", e)),
        )
    })?;

    let file = File::create(path).map_err(|e| CloudError::io_write(path, e))?;
    let mut writer = BufWriter::new(file);

    Writer::new()
        .write_ply(&mut writer, &mut ply)
        .map_err(|e| CloudError::io_write(path, e))?;
    writer.flush().map_err(|e| CloudError::io_write(path, e))?;

    info!(
        "Saved {} vertices and {} faces to {:?}",
        mesh.vertices.len(),
        mesh.faces.len(),
        path
    );
    Ok(())
}

/// Load a PLY mesh. Polygons with more than three corners are fan-triangulated.
pub fn load_ply_mesh(path: impl AsRef<Path>) -> CloudResult<Mesh> {
    let path = path.as_ref();
    let ply = read_ply(path)?;

    let mut mesh = Mesh::new();

    if let Some(vertices) = ply.payload.get("vertex") {
        for vertex_element in vertices {
            let x = get_ply_float(vertex_element.get("x"), "x", path)?;
            let y = get_ply_float(vertex_element.get("y"), "y", path)?;
            let z = get_ply_float(vertex_element.get("z"), "z", path)?;
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
    }

    if let Some(faces) = ply.payload.get("face") {
        for face_element in faces {
            let indices: Vec<u32> = match face_element
                .get("vertex_indices")
                .or_else(|| face_element.get("vertex_index"))
            {
                Some(Property::ListInt(v)) => v.iter().map(|&i| i as u32).collect(),
                Some(Property::ListUInt(v)) => v.clone(),
                Some(Property::ListUChar(v)) => v.iter().map(|&i| i as u32).collect(),
                _ => {
                    return Err(CloudError::parse_error(
                        path,
                        "face element has no vertex_indices list",
                    ));
                }
            };

            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
                return Err(CloudError::parse_error(
                    path,
                    format!(
                        "face references vertex {} but the mesh has {} vertices",
                        bad,
                        mesh.vertices.len()
                    ),
                ));
            }

            for i in 1..indices.len().saturating_sub(1) {
                mesh.faces.push([indices[0], indices[i], indices[i + 1]]);
            }
        }
    }

    debug!(
        "PLY loaded: {} vertices, {} faces",
        mesh.vertices.len(),
        mesh.faces.len()
    );
    Ok(mesh)
}

fn read_ply(path: &Path) -> CloudResult<ply_rs::ply::Ply<ply_rs::ply::DefaultElement>> {
    use ply_rs::parser::Parser;

    let file = File::open(path).map_err(|e| CloudError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    Parser::<ply_rs::ply::DefaultElement>::new()
        .read_ply(&mut reader)
        .map_err(|e| CloudError::parse_error(path, format!("PLY parse error: {:?}", e)))
}

/// Helper to extract a float value from a PLY property.
fn get_ply_float(prop: Option<&Property>, name: &str, path: &Path) -> CloudResult<f64> {
    match prop {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        _ => Err(CloudError::parse_error(
            path,
            format!("Missing or invalid PLY property: {}", name),
        )),
    }
}
