//! cloudmesh info command - display statistics of a completed mesh.

use std::path::Path;

use anyhow::{Context, Result};
use cloud_mesh::Mesh;
use colored::Colorize;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct MeshInfo {
    path: String,
    vertices: usize,
    faces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<BoundsInfo>,
    signed_volume: f64,
    watertight: bool,
    boundary_edges: usize,
    non_manifold_edges: usize,
}

#[derive(Serialize)]
struct BoundsInfo {
    min: [f64; 3],
    max: [f64; 3],
    dimensions: [f64; 3],
}

pub fn run(input: &Path, cli: &Cli) -> Result<()> {
    let mesh =
        Mesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let bounds = mesh.bounds().map(|(min, max)| {
        let dims = max - min;
        BoundsInfo {
            min: [min.x, min.y, min.z],
            max: [max.x, max.y, max.z],
            dimensions: [dims.x, dims.y, dims.z],
        }
    });
    let edges = mesh.edge_report();

    let info = MeshInfo {
        path: input.display().to_string(),
        vertices: mesh.vertex_count(),
        faces: mesh.face_count(),
        bounds,
        signed_volume: mesh.signed_volume(),
        watertight: edges.is_watertight(),
        boundary_edges: edges.boundary_edge_count,
        non_manifold_edges: edges.non_manifold_edge_count,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&info, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Mesh Information".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                println!("  {}: {}", "Vertices".cyan(), info.vertices);
                println!("  {}: {}", "Faces".cyan(), info.faces);

                if let Some(ref b) = info.bounds {
                    println!(
                        "  {}: {:.4} x {:.4} x {:.4}",
                        "Dimensions".cyan(),
                        b.dimensions[0],
                        b.dimensions[1],
                        b.dimensions[2]
                    );
                    println!(
                        "  {}: ({:.4}, {:.4}, {:.4})",
                        "Min bounds".cyan(),
                        b.min[0],
                        b.min[1],
                        b.min[2]
                    );
                    println!(
                        "  {}: ({:.4}, {:.4}, {:.4})",
                        "Max bounds".cyan(),
                        b.max[0],
                        b.max[1],
                        b.max[2]
                    );
                }

                println!("  {}: {:.4}", "Signed volume".cyan(), info.signed_volume);
                println!(
                    "  {}: {}",
                    "Watertight".cyan(),
                    if info.watertight {
                        "yes".green()
                    } else {
                        "no".yellow()
                    }
                );
                if info.boundary_edges > 0 {
                    println!("  {}: {}", "Boundary edges".cyan(), info.boundary_edges);
                }
                if info.non_manifold_edges > 0 {
                    println!(
                        "  {}: {}",
                        "Non-manifold edges".cyan(),
                        info.non_manifold_edges
                    );
                }
            }
        }
    }

    Ok(())
}
