//! WASM bindings for segment-grammar: powers the interactive web demo.

use wasm_bindgen::prelude::*;

use segment_grammar::core::layout::layout;
use segment_grammar::core::pipeline::{SegmentOutcome, SubdivisionPipeline};
use segment_grammar::core::subdivision::Subdivision;
use segment_grammar::schema::config::SubdivisionConfig;
use segment_grammar::schema::module::{ModuleCatalog, ModuleDefinition};
use segment_grammar::schema::segment::Segment;

// ---------------------------------------------------------------------------
// Embedded preset data: compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const FACADE: &str = include_str!("../../data/facade.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct PlacedModule<'a> {
    symbol: &'a str,
    offset: f64,
    extent: f64,
    /// Center along the segment in `0..=1`, for placing debug geometry.
    center: f64,
    scale: f64,
    debug_color: [f32; 4],
}

#[derive(serde::Serialize)]
struct SubdivisionOutput<'a> {
    modules: Vec<PlacedModule<'a>>,
    remaining: f64,
}

#[derive(serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SegmentOutput<'a> {
    Subdivided {
        index: usize,
        seed: u64,
        #[serde(flatten)]
        result: SubdivisionOutput<'a>,
    },
    Skipped {
        index: usize,
        reason: String,
    },
}

#[derive(serde::Serialize)]
struct GrammarInfo {
    grammar: String,
    min_size: f64,
    seed: u64,
    modules: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------
fn to_output<'a>(subdivision: &Subdivision<'a>, length: f64) -> SubdivisionOutput<'a> {
    let modules = subdivision
        .instances
        .iter()
        .zip(layout(&subdivision.instances))
        .map(|(instance, placement)| PlacedModule {
            symbol: instance.symbol(),
            offset: placement.offset,
            extent: placement.extent,
            center: placement.normalized_center(length),
            scale: instance.scale(),
            debug_color: instance.module().debug_color,
        })
        .collect();

    SubdivisionOutput {
        modules,
        remaining: subdivision.remaining,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// SubdivisionDemo: the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct SubdivisionDemo {
    pipeline: SubdivisionPipeline,
    grammar: String,
    catalog: ModuleCatalog,
}

#[wasm_bindgen]
impl SubdivisionDemo {
    /// Create a demo from a grammar and a JSON array of module definitions.
    ///
    /// Expected JSON shape:
    /// ```json
    /// [
    ///   { "symbol": "Door", "size": 120.0 },
    ///   { "symbol": "Wall", "size": 40.0, "scalable": true }
    /// ]
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(grammar: &str, modules_json: &str, seed: u64) -> Result<SubdivisionDemo, JsError> {
        let definitions: Vec<ModuleDefinition> = serde_json::from_str(modules_json)
            .map_err(|e| JsError::new(&format!("Invalid modules JSON: {e}")))?;
        let catalog = ModuleCatalog::from_definitions(definitions)
            .map_err(|e| JsError::new(&format!("Catalog error: {e}")))?;
        Self::from_parts(grammar, catalog, seed)
    }

    /// Create a demo from the built-in facade preset.
    pub fn facade(seed: u64) -> Result<SubdivisionDemo, JsError> {
        let config = SubdivisionConfig::parse_ron(data::FACADE)
            .map_err(|e| JsError::new(&format!("Preset parse error: {e}")))?;
        let grammar = config
            .grammar
            .ok_or_else(|| JsError::new("Preset has no grammar"))?;
        let catalog = ModuleCatalog::from_definitions(config.modules)
            .map_err(|e| JsError::new(&format!("Catalog error: {e}")))?;
        Self::from_parts(&grammar, catalog, seed)
    }

    /// Subdivide one segment. Returns JSON `{ modules: [...], remaining }`.
    pub fn subdivide(&self, length: f64) -> Result<String, JsError> {
        let result = self
            .pipeline
            .subdivide(length)
            .map_err(|e| JsError::new(&format!("Subdivision error: {e}")))?;
        to_json(&to_output(&result, length))
    }

    /// Subdivide a JSON array of segment lengths. Segments the grammar
    /// cannot fit are reported as skipped rather than failing the call.
    pub fn subdivide_segments(&self, lengths_json: &str) -> Result<String, JsError> {
        let lengths: Vec<f64> = serde_json::from_str(lengths_json)
            .map_err(|e| JsError::new(&format!("Invalid lengths JSON: {e}")))?;
        let segments: Vec<Segment> = lengths.into_iter().map(Segment::new).collect();

        let outcomes = self.pipeline.subdivide_segments(&segments);
        let output: Vec<SegmentOutput<'_>> = outcomes
            .iter()
            .map(|outcome| match outcome {
                SegmentOutcome::Subdivided {
                    index,
                    seed,
                    subdivision,
                } => SegmentOutput::Subdivided {
                    index: *index,
                    seed: *seed,
                    result: to_output(subdivision, segments[*index].length),
                },
                SegmentOutcome::Skipped { index, error } => SegmentOutput::Skipped {
                    index: *index,
                    reason: error.to_string(),
                },
            })
            .collect();
        to_json(&output)
    }

    /// Return a JSON description of the active grammar.
    pub fn info(&self) -> Result<String, JsError> {
        let info = GrammarInfo {
            grammar: self.pipeline.root().to_string(),
            min_size: self.pipeline.root().min_size(),
            seed: self.pipeline.seed(),
            modules: self
                .catalog
                .symbols()
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        to_json(&info)
    }

    /// Reset the demo with a new seed (same grammar and modules).
    pub fn reset(&mut self, seed: u64) -> Result<(), JsError> {
        let demo = Self::from_parts(&self.grammar.clone(), self.catalog.clone(), seed)?;
        self.pipeline = demo.pipeline;
        Ok(())
    }
}

// Private helpers
impl SubdivisionDemo {
    fn from_parts(grammar: &str, catalog: ModuleCatalog, seed: u64) -> Result<SubdivisionDemo, JsError> {
        let pipeline = SubdivisionPipeline::builder()
            .grammar(grammar)
            .with_catalog(catalog.clone())
            .seed(seed)
            .build()
            .map_err(|e| JsError::new(&format!("Pipeline build error: {e}")))?;

        Ok(SubdivisionDemo {
            pipeline,
            grammar: grammar.to_string(),
            catalog,
        })
    }
}
