/// The segment pipeline: one grammar applied to many segments.
///
/// Wires together catalog loading, grammar parsing, seeding, and the
/// subdivision engine. A segment the grammar cannot fit is skipped; the
/// remaining segments are unaffected.

use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::context::SeedContext;
use crate::core::grammar::{GrammarError, GrammarNode};
use crate::core::subdivision::{subdivide, Subdivision, SubdivisionError};
use crate::schema::config::SubdivisionConfig;
use crate::schema::module::{ModuleCatalog, ModuleDefinition};
use crate::schema::segment::Segment;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("no grammar configured")]
    MissingGrammar,
}

/// What happened to one segment of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome<'g> {
    Subdivided {
        index: usize,
        seed: u64,
        subdivision: Subdivision<'g>,
    },
    /// The grammar doesn't fit the segment.
    Skipped {
        index: usize,
        error: SubdivisionError,
    },
}

impl<'g> SegmentOutcome<'g> {
    pub fn index(&self) -> usize {
        match self {
            Self::Subdivided { index, .. } | Self::Skipped { index, .. } => *index,
        }
    }

    pub fn subdivision(&self) -> Option<&Subdivision<'g>> {
        match self {
            Self::Subdivided { subdivision, .. } => Some(subdivision),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// A parsed grammar with its catalog and seed. Built via
/// `SubdivisionPipeline::builder()`.
#[derive(Debug, Clone)]
pub struct SubdivisionPipeline {
    root: GrammarNode,
    catalog: ModuleCatalog,
    seed: SeedContext,
    segments: Vec<Segment>,
}

/// Builder for constructing a `SubdivisionPipeline`.
#[derive(Debug, Default)]
pub struct SubdivisionPipelineBuilder {
    grammar: Option<String>,
    config_path: Option<String>,
    catalog_path: Option<String>,
    seed: Option<u64>,
    extra_seed: Option<u64>,
    /// Directly provided catalog (for use without files).
    catalog: Option<ModuleCatalog>,
    /// Directly provided definitions, merged over the catalog.
    modules: Vec<ModuleDefinition>,
}

impl SubdivisionPipeline {
    pub fn builder() -> SubdivisionPipelineBuilder {
        SubdivisionPipelineBuilder::default()
    }

    pub fn root(&self) -> &GrammarNode {
        &self.root
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn seed(&self) -> u64 {
        self.seed.seed()
    }

    /// Segments listed in the loaded config, if any.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Subdivide one length with the pipeline seed.
    pub fn subdivide(&self, length: f64) -> Result<Subdivision<'_>, SubdivisionError> {
        subdivide(&self.root, length, self.seed())
    }

    /// Subdivide the same length `count` times with consecutive seeds.
    pub fn subdivide_variants(
        &self,
        length: f64,
        count: usize,
    ) -> Result<Vec<Subdivision<'_>>, SubdivisionError> {
        (0..count)
            .map(|i| subdivide(&self.root, length, self.seed().wrapping_add(i as u64)))
            .collect()
    }

    /// Subdivide each segment independently. Segments without their own
    /// seed use the pipeline seed plus their index.
    pub fn subdivide_segments(&self, segments: &[Segment]) -> Vec<SegmentOutcome<'_>> {
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| self.subdivide_segment(index, segment))
            .collect()
    }

    /// Subdivide the segments listed in the loaded config.
    pub fn run_configured(&self) -> Vec<SegmentOutcome<'_>> {
        self.subdivide_segments(&self.segments)
    }

    fn subdivide_segment(&self, index: usize, segment: &Segment) -> SegmentOutcome<'_> {
        let seed = segment
            .seed
            .unwrap_or_else(|| self.seed().wrapping_add(index as u64));

        match subdivide(&self.root, segment.length, seed) {
            Ok(subdivision) => SegmentOutcome::Subdivided {
                index,
                seed,
                subdivision,
            },
            // The engine already logged the capacity failure.
            Err(error) => SegmentOutcome::Skipped { index, error },
        }
    }
}

impl SubdivisionPipelineBuilder {
    pub fn grammar(mut self, grammar: &str) -> Self {
        self.grammar = Some(grammar.to_string());
        self
    }

    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    pub fn catalog_path(mut self, path: &str) -> Self {
        self.catalog_path = Some(path.to_string());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn extra_seed(mut self, extra_seed: u64) -> Self {
        self.extra_seed = Some(extra_seed);
        self
    }

    /// Provide a catalog directly (for use without files).
    pub fn with_catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Provide a single definition directly; it overrides loaded ones.
    pub fn with_module(mut self, module: ModuleDefinition) -> Self {
        self.modules.push(module);
        self
    }

    /// Build the pipeline. Later sources override earlier ones: the direct
    /// catalog, then config modules, then the catalog file, then directly
    /// added modules. Builder settings override config values.
    pub fn build(self) -> Result<SubdivisionPipeline, PipelineError> {
        let mut catalog = self.catalog.unwrap_or_default();

        let config = match self.config_path {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path)?;
                SubdivisionConfig::parse_ron(&contents)?
            }
            None => SubdivisionConfig::default(),
        };
        catalog.merge(ModuleCatalog::from_definitions(config.modules)?);

        if let Some(ref path) = self.catalog_path {
            let loaded = ModuleCatalog::load_from_ron(Path::new(path))?;
            debug!(path = %path, modules = loaded.len(), "loaded module catalog");
            catalog.merge(loaded);
        }

        catalog.merge(ModuleCatalog::from_definitions(self.modules)?);

        let grammar = self
            .grammar
            .or(config.grammar)
            .ok_or(PipelineError::MissingGrammar)?;
        let root = GrammarNode::parse(&grammar, &catalog)?;

        let seed = SeedContext {
            context_seed: self.seed.or(config.seed),
            extra_seed: self.extra_seed.or(config.extra_seed),
        };
        debug!(grammar = %root, seed = seed.seed(), "built subdivision pipeline");

        Ok(SubdivisionPipeline {
            root,
            catalog,
            seed,
            segments: config.segments,
        })
    }
}
