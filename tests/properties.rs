/// Property tests: conservation, determinism, and capacity over generated
/// grammars.

use proptest::prelude::*;
use segment_grammar::core::grammar::{GrammarNode, RepeatPolicy};
use segment_grammar::core::subdivision::{subdivide, SubdivisionError};
use segment_grammar::schema::module::ModuleDefinition;
use std::sync::Arc;

fn arb_repeat() -> impl Strategy<Value = RepeatPolicy> {
    prop_oneof![
        4 => (0u32..3).prop_map(RepeatPolicy::Fixed),
        1 => Just(RepeatPolicy::AtLeastOne),
        1 => Just(RepeatPolicy::Unbounded),
    ]
}

fn arb_node() -> impl Strategy<Value = GrammarNode> {
    let leaf = (1u32..20, any::<bool>(), arb_repeat(), 1i32..5).prop_map(
        |(size, scalable, repeat, weight)| {
            let symbol = format!("M{}", size);
            let definition = ModuleDefinition::new(&symbol, f64::from(size)).scalable(scalable);
            GrammarNode::literal(Arc::new(definition))
                .with_repeat(repeat)
                .with_weight(weight)
        },
    );

    leaf.prop_recursive(3, 24, 4, |inner| {
        (0u8..3, prop::collection::vec(inner, 1..4), arb_repeat(), 1i32..5).prop_map(
            |(kind, children, repeat, weight)| {
                let node = match kind {
                    0 => GrammarNode::sequence(children),
                    1 => GrammarNode::priority(children),
                    _ => GrammarNode::stochastic(children),
                };
                node.with_repeat(repeat).with_weight(weight)
            },
        )
    })
}

fn arb_root() -> impl Strategy<Value = GrammarNode> {
    prop::collection::vec(arb_node(), 1..4).prop_map(GrammarNode::root)
}

fn assert_sizes_ordered(node: &GrammarNode) {
    let sizes = node.sizes();
    assert!(sizes.min_concrete_size >= sizes.unit_size);
    assert!(sizes.unit_size >= sizes.min_size);
    assert!(sizes.min_size >= 0.0);
    for child in node.children() {
        assert_sizes_ordered(child);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn length_is_conserved(root in arb_root(), length in 0.0f64..200.0, seed in any::<u64>()) {
        match subdivide(&root, length, seed) {
            Ok(result) => {
                prop_assert!(result.remaining >= 0.0);
                let total = result.filled_length() + result.remaining;
                prop_assert!((total - length).abs() <= 1.0, "filled {} of {}", total, length);
            }
            Err(SubdivisionError::Capacity { required, available }) => {
                prop_assert!(required > available);
                prop_assert_eq!(required, root.min_size());
            }
        }
    }

    #[test]
    fn same_inputs_same_output(root in arb_root(), length in 0.0f64..200.0, seed in any::<u64>()) {
        let first = subdivide(&root, length, seed);
        let second = subdivide(&root, length, seed);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn fits_whenever_minimum_fits(root in arb_root(), slack in 0.0f64..50.0, seed in any::<u64>()) {
        let length = root.min_size() + slack;
        prop_assert!(subdivide(&root, length, seed).is_ok());
    }

    #[test]
    fn derived_sizes_are_ordered(root in arb_root()) {
        assert_sizes_ordered(&root);
    }
}
