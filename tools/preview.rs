/// Preview: interactive subdivision shell for testing grammars and catalogs.
///
/// Usage: preview --catalog <path> [--grammar <text>] [--config <path>] [--seed <n>]
///
/// Commands:
///   run <length>        subdivide one segment and print the placements
///   grammar <text>      replace the active grammar
///   seed <n>            set RNG seed
///   bulk <length> <n>   subdivide n times with consecutive seeds, print stats
///   info                show the active grammar and its sizes
///   help                list commands
///   quit                exit

use segment_grammar::core::grammar::GrammarNode;
use segment_grammar::core::layout::layout;
use segment_grammar::core::pipeline::SubdivisionPipeline;
use segment_grammar::core::subdivision::{subdivide, Subdivision};
use segment_grammar::schema::module::ModuleCatalog;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut catalog_path = None;
    let mut config_path = None;
    let mut grammar = None;
    let mut seed: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--catalog" if i + 1 < args.len() => {
                i += 1;
                catalog_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--grammar" if i + 1 < args.len() => {
                i += 1;
                grammar = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().ok();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = SubdivisionPipeline::builder();
    if let Some(ref path) = catalog_path {
        builder = builder.catalog_path(path);
    }
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    if let Some(ref text) = grammar {
        builder = builder.grammar(text);
    }
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }

    let pipeline = match builder.build() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded {} modules", pipeline.catalog().len());
    println!("Grammar: {}", pipeline.root());
    println!("Seed: {}", pipeline.seed());
    println!("Type 'help' for commands.\n");

    // Session state
    let catalog: ModuleCatalog = pipeline.catalog().clone();
    let mut root: GrammarNode = pipeline.root().clone();
    let mut current_seed = pipeline.seed();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match cmd.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "run" => {
                let Some(length) = parse_length(rest) else {
                    println!("Usage: run <length>");
                    continue;
                };
                match subdivide(&root, length, current_seed) {
                    Ok(result) => print_subdivision(&result, length),
                    Err(e) => println!("SKIPPED: {}", e),
                }
            }
            "grammar" => {
                if rest.is_empty() {
                    println!("Usage: grammar <text>");
                    println!("  Current: {}", root);
                    continue;
                }
                match GrammarNode::parse(rest, &catalog) {
                    Ok(node) => {
                        root = node;
                        println!("Grammar set to: {}", root);
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "seed" => match rest.parse::<u64>() {
                Ok(s) => {
                    current_seed = s;
                    println!("Seed set to {}", s);
                }
                Err(_) => println!("Usage: seed <n>"),
            },
            "bulk" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                let length = parts.first().and_then(|s| parse_length(s));
                let count = parts.get(1).and_then(|s| s.parse::<u64>().ok());
                match (length, count) {
                    (Some(length), Some(count)) if count > 0 => {
                        run_bulk(&root, length, current_seed, count);
                    }
                    _ => println!("Usage: bulk <length> <n>"),
                }
            }
            "info" => {
                let sizes = root.sizes();
                println!("Grammar: {}", root);
                println!("  min size:          {:.2}", sizes.min_size);
                println!("  min concrete size: {:.2}", sizes.min_concrete_size);
                println!("  modules:           {}", catalog.symbols().join(", "));
            }
            other => {
                println!("Unknown command: '{}'. Type 'help' for commands.", other);
            }
        }
    }
}

fn parse_length(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn print_subdivision(result: &Subdivision<'_>, length: f64) {
    println!("\n--- Subdivision ({} modules) ---", result.instances.len());
    for (instance, placement) in result.instances.iter().zip(layout(&result.instances)) {
        println!(
            "  {:>9.2} .. {:>9.2}  {:<16} scale {:.3}",
            placement.offset,
            placement.end(),
            instance.symbol(),
            instance.scale()
        );
    }
    println!(
        "Filled {:.2} of {:.2}, remaining {:.2}",
        result.filled_length(),
        length,
        result.remaining
    );
    println!("--- End ---\n");
}

fn run_bulk(root: &GrammarNode, length: f64, seed: u64, count: u64) {
    let mut usage: BTreeMap<String, u64> = BTreeMap::new();
    let mut distinct: BTreeMap<String, u64> = BTreeMap::new();
    let mut skipped = 0u64;
    let mut remaining_total = 0.0;

    for i in 0..count {
        match subdivide(root, length, seed.wrapping_add(i)) {
            Ok(result) => {
                for symbol in result.symbols() {
                    *usage.entry(symbol.to_string()).or_default() += 1;
                }
                *distinct.entry(result.symbols().join(" ")).or_default() += 1;
                remaining_total += result.remaining;
            }
            Err(_) => skipped += 1,
        }
    }

    let produced = count - skipped;
    println!("\n=== Bulk Stats ({} runs, {} skipped) ===", count, skipped);
    println!("Distinct sequences: {}", distinct.len());
    if produced > 0 {
        println!("Mean remaining: {:.3}", remaining_total / produced as f64);
    }
    println!("Module usage:");
    for (symbol, n) in &usage {
        println!("  {:<16} {}", symbol, n);
    }
    println!();
}

fn print_usage() {
    println!("Usage: preview --catalog <path> [--grammar <text>] [--config <path>] [--seed <n>]");
    println!();
    println!("Interactive shell for subdividing segments with a grammar.");
}

fn print_help() {
    println!("Commands:");
    println!("  run <length>        Subdivide one segment and print the placements");
    println!("  grammar <text>      Replace the active grammar");
    println!("  seed <n>            Set RNG seed");
    println!("  bulk <length> <n>   Subdivide n times with consecutive seeds, print stats");
    println!("  info                Show the active grammar and its sizes");
    println!("  help                Show this help");
    println!("  quit                Exit");
}
