/// Subdivision grammar: node tree, derived sizes, and string parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::module::{ModuleCatalog, ModuleDefinition};

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("grammar parse error at {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("unknown module '{0}'")]
    UnknownModule(String),
    #[error("invalid module catalog: {0}")]
    Catalog(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Largest `#N` the parser accepts. Every fixed copy becomes its own work
/// item, so zero-size modules would otherwise allow unbounded allocation.
pub const MAX_FIXED_REPEAT: u32 = 10_000;

/// How many copies of a node one expansion produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatPolicy {
    /// Exactly `n` copies.
    Fixed(u32),
    /// One copy, then as many more as fit.
    AtLeastOne,
    /// As many copies as fit, possibly none.
    Unbounded,
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Sequence,
    Priority,
    Stochastic,
    Literal,
}

/// What a node expands into.
#[derive(Debug, Clone)]
enum Production {
    /// Top-level sequence produced by the parser.
    Root(Vec<GrammarNode>),
    /// All children, in order.
    Sequence(Vec<GrammarNode>),
    /// The first child that fits.
    Priority(Vec<GrammarNode>),
    /// One child picked by weight among those that fit.
    Stochastic(Vec<GrammarNode>),
    /// A single module.
    Literal(Arc<ModuleDefinition>),
}

/// Size metrics derived from a node's production and repeat policy.
///
/// `min_concrete_size >= unit_size >= min_size >= 0` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeSizes {
    /// Size of one concrete copy of the node. This is what a parent reserves
    /// for each copy it emits.
    pub copy_size: f64,
    /// Size if the node is expanded exactly once (`n` copies for `Fixed(n)`).
    pub unit_size: f64,
    /// Smallest size the node can ever contribute; unbounded repeats count
    /// as zero until concretized.
    pub min_size: f64,
    /// Smallest size once a concrete copy exists.
    pub min_concrete_size: f64,
}

/// A node of a subdivision grammar tree.
///
/// Trees are immutable once built; every constructor recomputes the derived
/// sizes, so they are always consistent with the children.
#[derive(Debug, Clone)]
pub struct GrammarNode {
    production: Production,
    repeat: RepeatPolicy,
    weight: i32,
    sizes: NodeSizes,
}

impl GrammarNode {
    fn new(production: Production) -> Self {
        let mut node = GrammarNode {
            production,
            repeat: RepeatPolicy::default(),
            weight: 1,
            sizes: NodeSizes::default(),
        };
        node.sizes = node.compute_sizes();
        node
    }

    pub fn literal(module: Arc<ModuleDefinition>) -> Self {
        Self::new(Production::Literal(module))
    }

    pub fn root(children: Vec<GrammarNode>) -> Self {
        Self::new(Production::Root(children))
    }

    pub fn sequence(children: Vec<GrammarNode>) -> Self {
        Self::new(Production::Sequence(children))
    }

    pub fn priority(children: Vec<GrammarNode>) -> Self {
        Self::new(Production::Priority(children))
    }

    pub fn stochastic(children: Vec<GrammarNode>) -> Self {
        Self::new(Production::Stochastic(children))
    }

    /// An empty root; subdividing with it always yields nothing.
    pub fn empty() -> Self {
        Self::root(Vec::new())
    }

    pub fn with_repeat(mut self, repeat: RepeatPolicy) -> Self {
        self.repeat = repeat;
        self.sizes = self.compute_sizes();
        self
    }

    /// Selection weight under a stochastic parent. Non-positive weights are
    /// never picked.
    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn kind(&self) -> NodeKind {
        match self.production {
            Production::Root(_) => NodeKind::Root,
            Production::Sequence(_) => NodeKind::Sequence,
            Production::Priority(_) => NodeKind::Priority,
            Production::Stochastic(_) => NodeKind::Stochastic,
            Production::Literal(_) => NodeKind::Literal,
        }
    }

    /// Children in declaration order; empty for literals.
    pub fn children(&self) -> &[GrammarNode] {
        match &self.production {
            Production::Root(children)
            | Production::Sequence(children)
            | Production::Priority(children)
            | Production::Stochastic(children) => children,
            Production::Literal(_) => &[],
        }
    }

    pub fn module(&self) -> Option<&ModuleDefinition> {
        match &self.production {
            Production::Literal(module) => Some(module.as_ref()),
            _ => None,
        }
    }

    pub fn repeat(&self) -> RepeatPolicy {
        self.repeat
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn sizes(&self) -> NodeSizes {
        self.sizes
    }

    pub fn copy_size(&self) -> f64 {
        self.sizes.copy_size
    }

    pub fn unit_size(&self) -> f64 {
        self.sizes.unit_size
    }

    pub fn min_size(&self) -> f64 {
        self.sizes.min_size
    }

    pub fn min_concrete_size(&self) -> f64 {
        self.sizes.min_concrete_size
    }

    /// Literals are always valid; composites need at least one child.
    pub fn is_valid(&self) -> bool {
        match &self.production {
            Production::Literal(_) => true,
            _ => !self.children().is_empty(),
        }
    }

    fn compute_sizes(&self) -> NodeSizes {
        let (copy_size, concrete_size) = match &self.production {
            Production::Literal(module) => (module.size, module.size),
            Production::Root(children) | Production::Sequence(children) => (
                children.iter().map(GrammarNode::min_size).sum::<f64>(),
                children.iter().map(GrammarNode::min_concrete_size).sum::<f64>(),
            ),
            Production::Priority(children) | Production::Stochastic(children) => (
                min_or_zero(children.iter().map(GrammarNode::min_size)),
                min_or_zero(children.iter().map(GrammarNode::min_concrete_size)),
            ),
        };

        let copies = match self.repeat {
            RepeatPolicy::Fixed(n) => f64::from(n),
            RepeatPolicy::AtLeastOne | RepeatPolicy::Unbounded => 1.0,
        };
        let unit_size = copy_size * copies;
        let min_size = match self.repeat {
            RepeatPolicy::Unbounded => 0.0,
            RepeatPolicy::Fixed(_) | RepeatPolicy::AtLeastOne => unit_size,
        };

        NodeSizes {
            copy_size,
            unit_size,
            min_size,
            min_concrete_size: (concrete_size * copies).max(unit_size),
        }
    }

    /// Parse a grammar string against a module catalog.
    ///
    /// Syntax:
    /// - `Name` → literal module from the catalog
    /// - `[a, b]` → sequence, `{a, b}` → priority, `<a, b>` → stochastic
    /// - postfix `*` (any number), `+` (at least one), `#N` (exactly N,
    ///   at most [`MAX_FIXED_REPEAT`])
    /// - postfix `:N` → weight under a stochastic parent (default 1)
    ///
    /// The top level is a comma-separated list wrapped in a root node.
    pub fn parse(input: &str, catalog: &ModuleCatalog) -> Result<GrammarNode, GrammarError> {
        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
            catalog,
        };

        parser.skip_whitespace();
        if parser.at_end() {
            return Err(parser.error("empty grammar"));
        }

        let children = parser.parse_list()?;
        parser.skip_whitespace();
        if let Some(c) = parser.peek() {
            return Err(parser.error(&format!("unexpected '{}'", c)));
        }

        Ok(GrammarNode::root(children))
    }
}

fn min_or_zero(values: impl Iterator<Item = f64>) -> f64 {
    values.reduce(f64::min).unwrap_or(0.0)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    catalog: &'a ModuleCatalog,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> GrammarError {
        GrammarError::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<GrammarNode>, GrammarError> {
        let mut terms = vec![self.parse_term()?];
        loop {
            self.skip_whitespace();
            if self.peek() != Some(',') {
                return Ok(terms);
            }
            self.pos += 1;
            terms.push(self.parse_term()?);
        }
    }

    fn parse_term(&mut self) -> Result<GrammarNode, GrammarError> {
        self.skip_whitespace();
        let mut node = match self.peek() {
            Some('[') => GrammarNode::sequence(self.parse_group(']')?),
            Some('{') => GrammarNode::priority(self.parse_group('}')?),
            Some('<') => GrammarNode::stochastic(self.parse_group('>')?),
            Some(c) if is_symbol_start(c) => self.parse_symbol()?,
            Some(c) => return Err(self.error(&format!("unexpected '{}'", c))),
            None => return Err(self.error("expected a module or group")),
        };

        let mut repeat = None;
        let mut weight = None;
        loop {
            self.skip_whitespace();
            let next_repeat = match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    RepeatPolicy::Unbounded
                }
                Some('+') => {
                    self.pos += 1;
                    RepeatPolicy::AtLeastOne
                }
                Some('#') => {
                    self.pos += 1;
                    let count = self.parse_number()?;
                    let count = u32::try_from(count)
                        .ok()
                        .filter(|n| *n <= MAX_FIXED_REPEAT)
                        .ok_or_else(|| {
                            self.error(&format!("repeat count exceeds {}", MAX_FIXED_REPEAT))
                        })?;
                    RepeatPolicy::Fixed(count)
                }
                Some(':') => {
                    self.pos += 1;
                    if weight.is_some() {
                        return Err(self.error("weight given twice"));
                    }
                    let value = self.parse_number()?;
                    weight = Some(
                        i32::try_from(value).map_err(|_| self.error("weight is too large"))?,
                    );
                    continue;
                }
                _ => break,
            };
            if repeat.is_some() {
                return Err(self.error("repetition given twice"));
            }
            repeat = Some(next_repeat);
        }

        if let Some(repeat) = repeat {
            node = node.with_repeat(repeat);
        }
        if let Some(weight) = weight {
            node = node.with_weight(weight);
        }
        Ok(node)
    }

    fn parse_group(&mut self, close: char) -> Result<Vec<GrammarNode>, GrammarError> {
        let open_pos = self.pos;
        self.pos += 1;
        self.skip_whitespace();
        if self.peek() == Some(close) {
            return Err(self.error("empty group"));
        }

        let children = self.parse_list()?;
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == close => {
                self.pos += 1;
                Ok(children)
            }
            Some(c) => Err(self.error(&format!("expected '{}', found '{}'", close, c))),
            None => Err(GrammarError::Parse {
                position: open_pos,
                message: "unclosed group".to_string(),
            }),
        }
    }

    fn parse_symbol(&mut self) -> Result<GrammarNode, GrammarError> {
        let start = self.pos;
        while self.peek().is_some_and(is_symbol_char) {
            self.pos += 1;
        }
        let symbol: String = self.chars[start..self.pos].iter().collect();
        let module = self
            .catalog
            .get(&symbol)
            .ok_or(GrammarError::UnknownModule(symbol))?;
        Ok(GrammarNode::literal(Arc::clone(module)))
    }

    fn parse_number(&mut self) -> Result<u64, GrammarError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a number"));
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map_err(|_| self.error(&format!("invalid number '{}'", digits)))
    }
}

fn is_symbol_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

impl fmt::Display for GrammarNode {
    /// Renders the node back in grammar syntax. The root renders without
    /// brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match &self.production {
            Production::Literal(module) => {
                write!(f, "{}", module.symbol)?;
                return write_suffixes(self, f);
            }
            Production::Root(_) => ("", ""),
            Production::Sequence(_) => ("[", "]"),
            Production::Priority(_) => ("{", "}"),
            Production::Stochastic(_) => ("<", ">"),
        };

        f.write_str(open)?;
        for (i, child) in self.children().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(close)?;
        write_suffixes(self, f)
    }
}

fn write_suffixes(node: &GrammarNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match node.repeat {
        RepeatPolicy::Fixed(1) => {}
        RepeatPolicy::Fixed(n) => write!(f, "#{}", n)?,
        RepeatPolicy::AtLeastOne => f.write_str("+")?,
        RepeatPolicy::Unbounded => f.write_str("*")?,
    }
    if node.weight != 1 {
        write!(f, ":{}", node.weight)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::module::ModuleDefinition;

    fn catalog() -> ModuleCatalog {
        ModuleCatalog::from_definitions([
            ModuleDefinition::new("A", 10.0),
            ModuleDefinition::new("B", 5.0),
            ModuleDefinition::new("C", 2.0).scalable(true),
            ModuleDefinition::new("Wall_01", 3.0),
        ])
        .unwrap()
    }

    fn module(symbol: &str, size: f64) -> GrammarNode {
        GrammarNode::literal(Arc::new(ModuleDefinition::new(symbol, size)))
    }

    fn assert_size_invariant(node: &GrammarNode) {
        let s = node.sizes();
        assert!(s.min_concrete_size >= s.unit_size, "{:?}", s);
        assert!(s.unit_size >= s.min_size, "{:?}", s);
        assert!(s.min_size >= 0.0, "{:?}", s);
        for child in node.children() {
            assert_size_invariant(child);
        }
    }

    #[test]
    fn literal_sizes_follow_repeat() {
        let once = module("A", 10.0);
        assert_eq!(once.unit_size(), 10.0);
        assert_eq!(once.min_size(), 10.0);

        let fixed = module("A", 10.0).with_repeat(RepeatPolicy::Fixed(3));
        assert_eq!(fixed.copy_size(), 10.0);
        assert_eq!(fixed.unit_size(), 30.0);
        assert_eq!(fixed.min_size(), 30.0);

        let plus = module("A", 10.0).with_repeat(RepeatPolicy::AtLeastOne);
        assert_eq!(plus.unit_size(), 10.0);
        assert_eq!(plus.min_size(), 10.0);

        let star = module("A", 10.0).with_repeat(RepeatPolicy::Unbounded);
        assert_eq!(star.unit_size(), 10.0);
        assert_eq!(star.min_size(), 0.0);
        assert_eq!(star.min_concrete_size(), 10.0);
    }

    #[test]
    fn composite_sizes() {
        let seq = GrammarNode::sequence(vec![
            module("A", 10.0),
            module("B", 5.0).with_repeat(RepeatPolicy::Unbounded),
        ]);
        assert_eq!(seq.min_size(), 10.0);
        assert_eq!(seq.min_concrete_size(), 15.0);

        let prio = GrammarNode::priority(vec![module("X", 20.0), module("Y", 5.0)]);
        assert_eq!(prio.unit_size(), 5.0);
        assert_eq!(prio.min_size(), 5.0);

        let stoch = GrammarNode::stochastic(vec![module("X", 20.0), module("Y", 5.0)])
            .with_repeat(RepeatPolicy::Unbounded);
        assert_eq!(stoch.min_size(), 0.0);
        assert_eq!(stoch.unit_size(), 5.0);

        assert_size_invariant(&GrammarNode::root(vec![seq, prio, stoch]));
    }

    #[test]
    fn empty_composite_is_invalid() {
        assert!(!GrammarNode::empty().is_valid());
        assert!(!GrammarNode::priority(vec![]).is_valid());
        assert!(module("A", 1.0).is_valid());
    }

    #[test]
    fn parse_single_module() {
        let root = GrammarNode::parse("A", &catalog()).unwrap();
        assert_eq!(root.kind(), NodeKind::Root);
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].kind(), NodeKind::Literal);
        assert_eq!(root.min_size(), 10.0);
    }

    #[test]
    fn parse_groups_and_suffixes() {
        let root = GrammarNode::parse("[A, B*], {A, B}+, <A:3, B:1>#2", &catalog()).unwrap();
        let children = root.children();
        assert_eq!(children.len(), 3);

        assert_eq!(children[0].kind(), NodeKind::Sequence);
        assert_eq!(children[0].children()[1].repeat(), RepeatPolicy::Unbounded);

        assert_eq!(children[1].kind(), NodeKind::Priority);
        assert_eq!(children[1].repeat(), RepeatPolicy::AtLeastOne);

        assert_eq!(children[2].kind(), NodeKind::Stochastic);
        assert_eq!(children[2].repeat(), RepeatPolicy::Fixed(2));
        assert_eq!(children[2].children()[0].weight(), 3);
        assert_eq!(children[2].children()[1].weight(), 1);
    }

    #[test]
    fn parse_ignores_whitespace() {
        let root = GrammarNode::parse("  [ A ,\n\tB # 3 ] ", &catalog()).unwrap();
        let seq = &root.children()[0];
        assert_eq!(seq.children()[1].repeat(), RepeatPolicy::Fixed(3));
        assert_eq!(root.min_size(), 25.0);
    }

    #[test]
    fn parse_symbol_with_digits_and_underscore() {
        let root = GrammarNode::parse("Wall_01#2", &catalog()).unwrap();
        assert_eq!(root.children()[0].module().unwrap().symbol, "Wall_01");
        assert_eq!(root.min_size(), 6.0);
    }

    #[test]
    fn parse_unknown_module_error() {
        assert!(matches!(
            GrammarNode::parse("[A, Missing]", &catalog()),
            Err(GrammarError::UnknownModule(name)) if name == "Missing"
        ));
    }

    #[test]
    fn parse_empty_input_error() {
        assert!(GrammarNode::parse("   ", &catalog()).is_err());
    }

    #[test]
    fn parse_empty_group_error() {
        assert!(GrammarNode::parse("[A, {}]", &catalog()).is_err());
    }

    #[test]
    fn parse_unclosed_group_error() {
        let err = GrammarNode::parse("[A, B", &catalog()).unwrap_err();
        assert!(matches!(err, GrammarError::Parse { position: 0, .. }));
    }

    #[test]
    fn parse_mismatched_close_error() {
        assert!(GrammarNode::parse("[A, B}", &catalog()).is_err());
    }

    #[test]
    fn parse_unmatched_close_error() {
        assert!(GrammarNode::parse("A]", &catalog()).is_err());
    }

    #[test]
    fn parse_missing_count_error() {
        assert!(GrammarNode::parse("A#", &catalog()).is_err());
        assert!(GrammarNode::parse("<A:, B>", &catalog()).is_err());
    }

    #[test]
    fn parse_double_repeat_error() {
        assert!(GrammarNode::parse("A*+", &catalog()).is_err());
        assert!(GrammarNode::parse("<A:1:2>", &catalog()).is_err());
    }

    #[test]
    fn parse_repeat_count_limit() {
        let at_limit = format!("A#{}", MAX_FIXED_REPEAT);
        let root = GrammarNode::parse(&at_limit, &catalog()).unwrap();
        assert_eq!(root.children()[0].repeat(), RepeatPolicy::Fixed(MAX_FIXED_REPEAT));

        let over = format!("A#{}", MAX_FIXED_REPEAT + 1);
        assert!(matches!(
            GrammarNode::parse(&over, &catalog()),
            Err(GrammarError::Parse { .. })
        ));
        assert!(GrammarNode::parse("A#4000000000", &catalog()).is_err());
    }

    #[test]
    fn parse_trailing_comma_error() {
        assert!(GrammarNode::parse("A, B,", &catalog()).is_err());
    }

    #[test]
    fn display_normalizes_grammar() {
        let root = GrammarNode::parse("[A,B # 3],<A:2,C*>,{B+,A}", &catalog()).unwrap();
        assert_eq!(root.to_string(), "[A, B#3], <A:2, C*>, {B+, A}");
    }

    #[test]
    fn parsed_tree_satisfies_size_invariant() {
        let root =
            GrammarNode::parse("[A, <B:2, [C*, A]+>*], {A#3, B}, C+", &catalog()).unwrap();
        assert_size_invariant(&root);
    }
}
