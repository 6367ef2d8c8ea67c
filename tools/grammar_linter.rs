/// Grammar Linter: validates subdivision grammars against a module catalog.
///
/// Usage: grammar_linter <catalog.ron> <grammar>... [--config <config.ron>]

use segment_grammar::core::grammar::{GrammarNode, NodeKind, RepeatPolicy};
use segment_grammar::schema::config::SubdivisionConfig;
use segment_grammar::schema::module::ModuleCatalog;
use std::collections::HashSet;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: grammar_linter <catalog.ron> <grammar>... [--config <config.ron>]");
        process::exit(0);
    }

    let mut catalog = match ModuleCatalog::load_from_ron(Path::new(&args[1])) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: Failed to load catalog: {}", e);
            process::exit(1);
        }
    };

    let mut grammars = Vec::new();
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            i += 1;
            match load_config(&args[i]) {
                Ok(config) => {
                    match ModuleCatalog::from_definitions(config.modules) {
                        Ok(extra) => catalog.merge(extra),
                        Err(e) => {
                            eprintln!("ERROR: Invalid modules in {}: {}", args[i], e);
                            process::exit(1);
                        }
                    }
                    grammars.extend(config.grammar);
                }
                Err(e) => {
                    eprintln!("ERROR: Failed to load config {}: {}", args[i], e);
                    process::exit(1);
                }
            }
        } else {
            grammars.push(args[i].clone());
        }
        i += 1;
    }

    println!("Loaded {} modules", catalog.len());

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut used = HashSet::new();

    for grammar in &grammars {
        match GrammarNode::parse(grammar, &catalog) {
            Ok(root) => {
                println!("  '{}': min size {:.2}", root, root.min_size());
                lint_node(&root, None, grammar, &mut used, &mut errors, &mut warnings);
            }
            Err(e) => errors.push(format!("Grammar '{}': {}", grammar, e)),
        }
    }

    if !grammars.is_empty() {
        for symbol in catalog.symbols() {
            if !used.contains(symbol) {
                warnings.push(format!("Module '{}' is not used by any grammar", symbol));
            }
        }
    }

    // Print report
    println!("\n=== Grammar Lint Report ===\n");

    if grammars.is_empty() {
        warnings.push("No grammars given".to_string());
    }
    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_config(path: &str) -> Result<SubdivisionConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(SubdivisionConfig::parse_ron(&contents)?)
}

fn lint_node(
    node: &GrammarNode,
    parent: Option<NodeKind>,
    grammar: &str,
    used: &mut HashSet<String>,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    if let Some(module) = node.module() {
        used.insert(module.symbol.clone());
        if module.size <= 0.0 && node.repeat() != RepeatPolicy::Fixed(1) {
            warnings.push(format!(
                "Grammar '{}': zero-size module '{}' is repeated; repeats of it are never placed",
                grammar, module.symbol
            ));
        }
    }

    if node.repeat() == RepeatPolicy::Fixed(0) {
        warnings.push(format!(
            "Grammar '{}': '{}' repeats zero times and never contributes",
            grammar, node
        ));
    }

    if node.weight() != 1 && parent != Some(NodeKind::Stochastic) {
        warnings.push(format!(
            "Grammar '{}': weight on '{}' is ignored outside a stochastic group",
            grammar, node
        ));
    }

    match node.kind() {
        NodeKind::Priority => {
            // Children after one that always fits can never be chosen.
            let reserved = node.copy_size();
            if let Some(pos) = node
                .children()
                .iter()
                .position(|child| child.min_size() - reserved <= 0.0)
            {
                for unreachable in &node.children()[pos + 1..] {
                    warnings.push(format!(
                        "Grammar '{}': '{}' in priority group '{}' is never chosen",
                        grammar, unreachable, node
                    ));
                }
            }
        }
        NodeKind::Stochastic => {
            let total: i64 = node
                .children()
                .iter()
                .map(|child| i64::from(child.weight().max(0)))
                .sum();
            if total == 0 {
                errors.push(format!(
                    "Grammar '{}': stochastic group '{}' has no positive weight",
                    grammar, node
                ));
            }
            for child in node.children().iter().filter(|c| c.weight() < 0) {
                warnings.push(format!(
                    "Grammar '{}': negative weight on '{}' is treated as zero",
                    grammar, child
                ));
            }
        }
        NodeKind::Root | NodeKind::Sequence | NodeKind::Literal => {}
    }

    for child in node.children() {
        lint_node(child, Some(node.kind()), grammar, used, errors, warnings);
    }
}
