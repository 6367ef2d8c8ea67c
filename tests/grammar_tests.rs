/// Grammar parsing and catalog integration tests.

use segment_grammar::core::grammar::{GrammarError, GrammarNode, NodeKind, RepeatPolicy};
use segment_grammar::schema::module::ModuleCatalog;

fn facade_catalog() -> ModuleCatalog {
    let path = std::path::Path::new("tests/fixtures/facade_catalog.ron");
    ModuleCatalog::load_from_ron(path).unwrap()
}

#[test]
fn facade_catalog_loads() {
    let catalog = facade_catalog();
    let expected = ["Balcony", "Corner", "Door", "Pillar", "Wall", "Window"];
    assert_eq!(catalog.symbols(), expected);

    let wall = catalog.get("Wall").unwrap();
    assert!(wall.scalable);
    assert_eq!(wall.size, 40.0);
    assert!(!catalog.get("Door").unwrap().scalable);
}

#[test]
fn facade_grammar_parses_with_expected_sizes() {
    let catalog = facade_catalog();
    let root = GrammarNode::parse(
        "Corner, [Door, <Window:3, Balcony:1, Wall:2>*], {Pillar#2, Wall}, Corner",
        &catalog,
    )
    .unwrap();

    let children = root.children();
    assert_eq!(children.len(), 4);
    assert_eq!(children[1].kind(), NodeKind::Sequence);
    assert_eq!(children[2].kind(), NodeKind::Priority);

    let bay = &children[1].children()[1];
    assert_eq!(bay.kind(), NodeKind::Stochastic);
    assert_eq!(bay.repeat(), RepeatPolicy::Unbounded);
    let weights: Vec<i32> = bay.children().iter().map(|c| c.weight()).collect();
    assert_eq!(weights, vec![3, 1, 2]);

    // Corner + Door + (nothing for the unbounded bay) + min(Pillar x2, Wall) + Corner
    assert_eq!(root.min_size(), 30.0 + 120.0 + 40.0 + 30.0);
}

#[test]
fn every_catalog_symbol_is_usable_as_literal() {
    let catalog = facade_catalog();
    for symbol in catalog.symbols() {
        let root = GrammarNode::parse(symbol, &catalog).unwrap();
        let literal = &root.children()[0];
        assert_eq!(literal.module().unwrap().symbol, symbol);
        assert_eq!(literal.min_size(), catalog.get(symbol).unwrap().size);
    }
}

#[test]
fn unknown_symbol_names_the_module() {
    let catalog = facade_catalog();
    let err = GrammarNode::parse("[Door, Chimney]", &catalog).unwrap_err();
    assert_eq!(err.to_string(), "unknown module 'Chimney'");
}

#[test]
fn parse_error_reports_position() {
    let catalog = facade_catalog();
    match GrammarNode::parse("[Door, Wall", &catalog) {
        Err(GrammarError::Parse { position, .. }) => assert_eq!(position, 0),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn display_reparses_to_same_sizes() {
    let catalog = facade_catalog();
    let source = "Corner,[Door,<Window:3,Balcony,Wall:2>*],{Pillar#2,Wall+},Corner";
    let root = GrammarNode::parse(source, &catalog).unwrap();
    let reparsed = GrammarNode::parse(&root.to_string(), &catalog).unwrap();

    assert_eq!(root.to_string(), reparsed.to_string());
    assert_eq!(root.sizes(), reparsed.sizes());
}
