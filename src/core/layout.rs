/// Placement of subdivided modules along the segment.

use serde::Serialize;

use crate::core::subdivision::ModuleInstance;

/// Where one instance sits along the segment, measured from its start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub offset: f64,
    pub extent: f64,
}

impl Placement {
    pub fn end(&self) -> f64 {
        self.offset + self.extent
    }

    /// Center of the placement, normalized by the segment length.
    pub fn normalized_center(&self, segment_length: f64) -> f64 {
        if segment_length <= 0.0 {
            return 0.0;
        }
        (self.offset + self.extent * 0.5) / segment_length
    }
}

/// Lay instances end to end from offset zero using their scaled sizes.
pub fn layout(instances: &[ModuleInstance<'_>]) -> Vec<Placement> {
    let mut offset = 0.0;
    instances
        .iter()
        .map(|instance| {
            let placement = Placement {
                offset,
                extent: instance.scaled_size(),
            };
            offset += placement.extent;
            placement
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grammar::{GrammarNode, RepeatPolicy};
    use crate::core::subdivision::subdivide;
    use crate::schema::module::ModuleDefinition;
    use std::sync::Arc;

    #[test]
    fn placements_are_contiguous() {
        let door = GrammarNode::literal(Arc::new(ModuleDefinition::new("Door", 3.0)));
        let wall = GrammarNode::literal(Arc::new(ModuleDefinition::new("Wall", 2.0).scalable(true)))
            .with_repeat(RepeatPolicy::Fixed(2));
        let root = GrammarNode::root(vec![door, wall]);

        let result = subdivide(&root, 9.0, 0).unwrap();
        let placements = layout(&result.instances);

        assert_eq!(placements.len(), 3);
        assert_eq!(placements[0], Placement { offset: 0.0, extent: 3.0 });
        assert!((placements[1].offset - 3.0).abs() < 1e-9);
        assert!((placements[1].extent - 3.0).abs() < 1e-9);
        assert!((placements[2].end() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn empty_layout() {
        assert!(layout(&[]).is_empty());
    }

    #[test]
    fn normalized_center() {
        let p = Placement {
            offset: 2.0,
            extent: 4.0,
        };
        assert_eq!(p.normalized_center(8.0), 0.5);
        assert_eq!(p.normalized_center(0.0), 0.0);
    }

    #[test]
    fn centers_of_a_filled_segment_are_ordered() {
        let post = GrammarNode::literal(Arc::new(ModuleDefinition::new("Post", 1.0)));
        let rail = GrammarNode::literal(Arc::new(ModuleDefinition::new("Rail", 4.0).scalable(true)))
            .with_repeat(RepeatPolicy::Unbounded);
        let root = GrammarNode::root(vec![post.clone(), rail, post]);

        let result = subdivide(&root, 20.0, 0).unwrap();
        let centers: Vec<f64> = layout(&result.instances)
            .iter()
            .map(|p| p.normalized_center(20.0))
            .collect();

        assert_eq!(centers.len(), 6);
        assert!((centers[0] - 0.025).abs() < 1e-9);
        assert!((centers[5] - 0.975).abs() < 1e-9);
        assert!(centers.windows(2).all(|w| w[0] < w[1]));
    }
}
