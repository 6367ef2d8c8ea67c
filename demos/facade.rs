/// Facade example: fills the floors of a building with facade modules.
///
/// Each floor is a segment of a different width. The grammar places a corner
/// at both ends, a door followed by a random run of windows, balconies and
/// wall panels, and a pair of pillars (or a single wall if that won't fit).
///
/// The narrowest floor cannot hold the mandatory modules and is skipped.
///
/// Run with: cargo run --example facade

use segment_grammar::core::layout::layout;
use segment_grammar::core::pipeline::{SegmentOutcome, SubdivisionPipeline};
use segment_grammar::core::subdivision::Subdivision;

fn main() {
    // --- Load the facade preset (grammar, modules, floor widths) ---
    let pipeline = SubdivisionPipeline::builder()
        .config_path("data/facade.ron")
        .build()
        .expect("Failed to build facade pipeline");

    println!("========================================");
    println!("   FACADE LAYOUT");
    println!("   grammar: {}", pipeline.root());
    println!("   minimum width: {:.1}", pipeline.root().min_size());
    println!("========================================");
    println!();

    for outcome in pipeline.run_configured() {
        let width = pipeline.segments()[outcome.index()].length;
        match outcome {
            SegmentOutcome::Subdivided {
                index,
                seed,
                subdivision,
            } => print_floor(index, width, seed, &subdivision),
            SegmentOutcome::Skipped { index, error } => {
                println!("--- Floor {} ({:.1} wide) ---", index, width);
                println!("[Skipped: {}]", error);
                println!();
            }
        }
    }

    // --- Same floor, different seeds ---
    println!("--- Variations of a 900-wide floor ---");
    let variants = pipeline
        .subdivide_variants(900.0, 5)
        .expect("900 is wider than the grammar minimum");
    for (i, variant) in variants.iter().enumerate() {
        println!("  seed +{}: {}", i, variant.symbols().join(" "));
    }
    println!();
}

fn print_floor(index: usize, width: f64, seed: u64, subdivision: &Subdivision<'_>) {
    println!("--- Floor {} ({:.1} wide, seed {}) ---", index, width, seed);

    let placements = layout(&subdivision.instances);
    let mut strip = String::new();
    for (instance, placement) in subdivision.instances.iter().zip(&placements) {
        println!(
            "  {:>8.1} .. {:>8.1}  {:<8} x{:.3}",
            placement.offset,
            placement.end(),
            instance.symbol(),
            instance.scale()
        );
        // One character per 20 units of width.
        let cells = (placement.extent / 20.0).round().max(1.0) as usize;
        let glyph = instance.symbol().chars().next().unwrap_or('?');
        strip.extend(std::iter::repeat(glyph).take(cells));
    }

    println!("  |{}|", strip);
    println!("  remaining: {:.2}", subdivision.remaining);
    println!();
}
