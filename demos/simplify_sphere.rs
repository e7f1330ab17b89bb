//! Simplify an icosphere in batches, the way an interactive viewer would
//!
//! Each batch collapses a percentage of the current faces' worth of edges
//! under an error budget taken from a 0-100 slider value, then re-flattens
//! the mesh and reports the next edge the engine would collapse.

use anyhow::{Context, Result};
use clap::Parser;
use qemesh_core::shapes;
use qemesh_simplification::{HalfEdgeMesh, SimplificationEngine, SimplifyConfig};

#[derive(Parser, Debug)]
#[command(name = "simplify_sphere", about = "Batch QEM simplification of an icosphere")]
struct Args {
    /// Icosphere subdivision level
    #[arg(short, long, default_value_t = 3)]
    subdivisions: u32,

    /// Percent of the current faces to remove per batch
    #[arg(short, long, default_value_t = 10.0)]
    percent: f64,

    /// Error budget as a percent of the configured error range
    #[arg(short, long, default_value_t = 50.0)]
    error_percent: f64,

    /// Collapse regardless of error
    #[arg(long)]
    ignore_error: bool,

    /// Emit shared vertices with averaged normals
    #[arg(long)]
    smooth: bool,

    /// Number of batches to run
    #[arg(short, long, default_value_t = 8)]
    batches: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = SimplifyConfig::default();

    let source = shapes::icosphere(args.subdivisions);
    let mesh = HalfEdgeMesh::from_triangle_mesh(&source).context("building half-edge mesh")?;
    let mut engine =
        SimplificationEngine::with_config(mesh, config.clone()).context("initializing engine")?;

    let max_error = config.error_budget(args.error_percent, args.ignore_error);
    println!(
        "icosphere({}): {} faces, {} vertices, max error {:e}",
        args.subdivisions,
        source.face_count(),
        source.vertex_count(),
        max_error
    );

    for batch in 1..=args.batches {
        let edges = config.edge_budget(engine.mesh().face_count(), args.percent).max(1);
        let outcome = engine.simplify_batch(edges, max_error)?;
        let rendered = engine.flatten(args.smooth);

        println!(
            "batch {:>2}: collapsed {:>5} of {:>5} edges -> {:>6} faces, {:>6} vertices",
            batch,
            outcome.collapsed,
            edges,
            rendered.face_count(),
            rendered.vertex_count()
        );
        match engine.next_suggested_edge() {
            Some((from, to)) => println!(
                "          next edge ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})",
                from.x, from.y, from.z, to.x, to.y, to.z
            ),
            None => println!("          no candidates left"),
        }
        if let Some(reason) = outcome.stop {
            println!("stopped: {}", reason);
            break;
        }
    }

    Ok(())
}
