use serde::{Deserialize, Serialize};

use super::module::ModuleDefinition;
use super::segment::Segment;

/// File form of a subdivision setup.
///
/// ```ron
/// (
///     grammar: "[Door, Wall*]",
///     seed: Some(7),
///     modules: [
///         (symbol: "Door", size: 120.0),
///         (symbol: "Wall", size: 50.0, scalable: true),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubdivisionConfig {
    #[serde(default)]
    pub grammar: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub extra_seed: Option<u64>,
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
    /// Segments to subdivide when the config drives a whole run.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl SubdivisionConfig {
    pub fn parse_ron(input: &str) -> Result<SubdivisionConfig, ron::error::SpannedError> {
        ron::from_str(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = SubdivisionConfig::parse_ron(
            r#"(
                grammar: Some("[Door, Wall*]"),
                seed: Some(7),
                extra_seed: Some(1),
                modules: [
                    (symbol: "Door", size: 120.0),
                    (symbol: "Wall", size: 50.0, scalable: true),
                ],
                segments: [(length: 400.0), (length: 250.0, seed: Some(3))],
            )"#,
        )
        .unwrap();

        assert_eq!(config.grammar.as_deref(), Some("[Door, Wall*]"));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.extra_seed, Some(1));
        assert_eq!(config.modules.len(), 2);
        assert!(config.modules[1].scalable);
        assert_eq!(config.segments[1].seed, Some(3));
    }

    #[test]
    fn everything_is_optional() {
        let config = SubdivisionConfig::parse_ron("()").unwrap();
        assert!(config.grammar.is_none());
        assert!(config.modules.is_empty());
        assert!(config.segments.is_empty());
    }
}
