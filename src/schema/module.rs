use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::core::grammar::GrammarError;

/// A named unit that can occupy space along a subdivided segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub symbol: String,
    pub size: f64,
    /// Scalable modules absorb leftover slack after subdivision.
    #[serde(default)]
    pub scalable: bool,
    #[serde(default = "default_debug_color")]
    pub debug_color: [f32; 4],
}

fn default_debug_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

impl ModuleDefinition {
    pub fn new(symbol: &str, size: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            size,
            scalable: false,
            debug_color: default_debug_color(),
        }
    }

    pub fn scalable(mut self, scalable: bool) -> Self {
        self.scalable = scalable;
        self
    }
}

/// Module definitions keyed by symbol.
///
/// Definitions are shared into grammar trees by `Arc`, so a catalog can be
/// dropped once the trees referencing it are built.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: FxHashMap<String, Arc<ModuleDefinition>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list of definitions. Later definitions with
    /// the same symbol replace earlier ones.
    pub fn from_definitions<I>(definitions: I) -> Result<ModuleCatalog, GrammarError>
    where
        I: IntoIterator<Item = ModuleDefinition>,
    {
        let mut catalog = ModuleCatalog::new();
        for definition in definitions {
            catalog.insert(definition)?;
        }
        Ok(catalog)
    }

    /// Load a catalog from a RON file holding a list of definitions.
    pub fn load_from_ron(path: &Path) -> Result<ModuleCatalog, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a catalog from a RON string.
    pub fn parse_ron(input: &str) -> Result<ModuleCatalog, GrammarError> {
        let raw: Vec<ModuleDefinition> = ron::from_str(input)?;
        Self::from_definitions(raw)
    }

    /// Add a definition, replacing any existing one with the same symbol.
    pub fn insert(&mut self, definition: ModuleDefinition) -> Result<(), GrammarError> {
        if definition.symbol.is_empty() {
            return Err(GrammarError::Catalog(
                "module symbol must not be empty".to_string(),
            ));
        }
        if !definition.size.is_finite() || definition.size < 0.0 {
            return Err(GrammarError::Catalog(format!(
                "module '{}' has invalid size {}",
                definition.symbol, definition.size
            )));
        }
        self.modules
            .insert(definition.symbol.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<ModuleDefinition>> {
        self.modules.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.modules.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Symbols in sorted order.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    /// Merge another catalog into this one. Definitions from `other`
    /// override definitions in `self` with the same symbol.
    pub fn merge(&mut self, other: ModuleCatalog) {
        for (symbol, definition) in other.modules {
            self.modules.insert(symbol, definition);
        }
    }
}
