/// Subdivision engine: fills a segment length with module instances
/// chosen by a grammar tree.
///
/// The engine works on a flat worklist of nodes. Each outer iteration runs
/// an expansion pass, replacing composite nodes by their children, then a
/// concretization pass, turning repetition placeholders into one more
/// concrete copy while the remaining budget allows. It stops once a full
/// iteration changes nothing, then spreads any slack over scalable modules.

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::core::context::{SeedContext, SubdivisionRng};
use crate::core::grammar::{GrammarNode, NodeKind, RepeatPolicy};
use crate::schema::module::ModuleDefinition;

/// Lengths at or below this are treated as zero.
pub const SIZE_EPSILON: f64 = 1e-4;

/// Consecutive iterations whose repeats fire without consuming any length
/// before the engine gives up on them.
const MAX_STALLED_ITERATIONS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubdivisionError {
    #[error("grammar doesn't fit: requires {required}, segment length is {available}")]
    Capacity { required: f64, available: f64 },
}

/// One placed module in a subdivided segment.
#[derive(Debug, Clone, Copy)]
pub struct ModuleInstance<'g> {
    /// Literal node the instance was created from.
    pub node: &'g GrammarNode,
    /// Fraction of the module size added by slack distribution.
    pub extra_scale: f64,
    module: &'g ModuleDefinition,
}

impl<'g> ModuleInstance<'g> {
    pub fn module(&self) -> &'g ModuleDefinition {
        self.module
    }

    pub fn symbol(&self) -> &'g str {
        &self.module.symbol
    }

    /// Unscaled module size.
    pub fn size(&self) -> f64 {
        self.module.size
    }

    /// Scale factor to apply to the module, `1.0` when unscaled.
    pub fn scale(&self) -> f64 {
        1.0 + self.extra_scale
    }

    pub fn scaled_size(&self) -> f64 {
        self.module.size * self.scale()
    }
}

/// Instances are equal when they place the same module at the same scale,
/// whichever tree they came from.
impl PartialEq for ModuleInstance<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.extra_scale == other.extra_scale
    }
}

/// Result of a successful subdivision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subdivision<'g> {
    pub instances: Vec<ModuleInstance<'g>>,
    /// Length left unfilled.
    pub remaining: f64,
}

impl<'g> Subdivision<'g> {
    pub fn symbols(&self) -> Vec<&'g str> {
        self.instances.iter().map(ModuleInstance::symbol).collect()
    }

    /// Total scaled length covered by the instances.
    pub fn filled_length(&self) -> f64 {
        self.instances.iter().map(ModuleInstance::scaled_size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Subdivide `length` using the grammar rooted at `root`.
///
/// An invalid (empty) root or a zero length yields an empty subdivision with
/// the whole length remaining. Fails only when the grammar's minimum size
/// exceeds `length`.
pub fn subdivide(
    root: &GrammarNode,
    length: f64,
    seed: u64,
) -> Result<Subdivision<'_>, SubdivisionError> {
    debug_assert!(length >= 0.0, "negative segment length {}", length);

    if !root.is_valid() || length <= SIZE_EPSILON {
        return Ok(Subdivision {
            instances: Vec::new(),
            remaining: length,
        });
    }

    if root.min_size() > length + SIZE_EPSILON {
        warn!(
            required = root.min_size(),
            available = length,
            "Grammar doesn't fit for this segment."
        );
        return Err(SubdivisionError::Capacity {
            required: root.min_size(),
            available: length,
        });
    }

    let mut worker = Worker::new(length - root.min_size(), seed);
    expand_submodule(root, &mut worker.work);
    worker.run();

    let mut instances: Vec<ModuleInstance<'_>> = worker
        .work
        .iter()
        .filter(|item| !item.skip_expansion)
        .filter_map(|item| {
            item.node.module().map(|module| ModuleInstance {
                node: item.node,
                extra_scale: 0.0,
                module,
            })
        })
        .collect();

    let remaining = distribute_slack(&mut instances, worker.remaining);
    debug!(
        length,
        remaining,
        instances = instances.len(),
        seed,
        "subdivided segment"
    );

    Ok(Subdivision {
        instances,
        remaining,
    })
}

/// [`subdivide`] with the seed taken from a [`SeedContext`].
pub fn subdivide_with_context<'g>(
    root: &'g GrammarNode,
    length: f64,
    context: &SeedContext,
) -> Result<Subdivision<'g>, SubdivisionError> {
    subdivide(root, length, context.seed())
}

#[derive(Debug, Clone, Copy)]
struct WorkItem<'g> {
    node: &'g GrammarNode,
    /// Repetition placeholder: not expanded, only concretized.
    skip_expansion: bool,
}

impl<'g> WorkItem<'g> {
    fn concrete(node: &'g GrammarNode) -> Self {
        Self {
            node,
            skip_expansion: false,
        }
    }

    fn placeholder(node: &'g GrammarNode) -> Self {
        Self {
            node,
            skip_expansion: true,
        }
    }
}

/// Emit the copies of `child` that one expansion of its parent produces.
fn expand_submodule<'g>(child: &'g GrammarNode, out: &mut Vec<WorkItem<'g>>) {
    if !child.is_valid() {
        return;
    }
    match child.repeat() {
        RepeatPolicy::Fixed(n) => {
            out.extend((0..n).map(|_| WorkItem::concrete(child)));
        }
        RepeatPolicy::AtLeastOne => {
            out.push(WorkItem::concrete(child));
            out.push(WorkItem::placeholder(child));
        }
        RepeatPolicy::Unbounded => out.push(WorkItem::placeholder(child)),
    }
}

fn fits(size: f64, remaining: f64) -> bool {
    size <= remaining + SIZE_EPSILON
}

struct Worker<'g> {
    remaining: f64,
    rng: SubdivisionRng,
    work: Vec<WorkItem<'g>>,
    /// Buffer of the previous pass, reused for the next one.
    spare: Vec<WorkItem<'g>>,
}

impl<'g> Worker<'g> {
    fn new(remaining: f64, seed: u64) -> Self {
        Self {
            remaining: remaining.max(0.0),
            rng: SubdivisionRng::from_seed(seed),
            work: Vec::new(),
            spare: Vec::new(),
        }
    }

    fn run(&mut self) {
        let mut stalled = 0;
        loop {
            let before = self.remaining;
            let expansions = self.expansion_pass();
            let concretizations = self.concretization_pass();
            if expansions == 0 && concretizations == 0 {
                break;
            }

            // Expansion alone is bounded by tree depth. Only repeats that
            // keep firing without consuming length can loop forever.
            if self.remaining < before {
                stalled = 0;
            } else if concretizations > 0 {
                stalled += 1;
                if stalled >= MAX_STALLED_ITERATIONS {
                    error!(
                        remaining = self.remaining,
                        entries = self.work.len(),
                        "subdivision stopped making progress; dropping pending repeats"
                    );
                    self.drain();
                    break;
                }
            }
        }
    }

    /// Drop every repetition placeholder and expand what is left down to
    /// literals, so length reserved for pending composites is still placed.
    fn drain(&mut self) {
        loop {
            self.work.retain(|item| !item.skip_expansion);
            if self.expansion_pass() == 0 {
                break;
            }
        }
        self.work.retain(|item| !item.skip_expansion);
    }

    fn charge(&mut self, size: f64) {
        self.remaining = (self.remaining - size).max(0.0);
    }

    fn expansion_pass(&mut self) -> usize {
        let current = std::mem::take(&mut self.work);
        let mut next = std::mem::take(&mut self.spare);
        next.clear();
        let mut expansions = 0;

        for item in current.iter().copied() {
            if item.skip_expansion {
                next.push(item);
                continue;
            }

            let node = item.node;
            match node.kind() {
                NodeKind::Literal => next.push(item),
                NodeKind::Root | NodeKind::Sequence => {
                    for child in node.children() {
                        expand_submodule(child, &mut next);
                    }
                    expansions += 1;
                }
                NodeKind::Priority => {
                    if let Some(child) = self.select_priority(node) {
                        expand_submodule(child, &mut next);
                    }
                    expansions += 1;
                }
                NodeKind::Stochastic => {
                    if let Some(child) = self.select_stochastic(node) {
                        expand_submodule(child, &mut next);
                    }
                    expansions += 1;
                }
            }
        }

        self.work = next;
        self.spare = current;
        expansions
    }

    fn concretization_pass(&mut self) -> usize {
        let current = std::mem::take(&mut self.work);
        let mut next = std::mem::take(&mut self.spare);
        next.clear();
        let mut concretizations = 0;

        for item in current.iter().copied() {
            if !item.skip_expansion {
                next.push(item);
                continue;
            }

            // A placeholder that can no longer fit is dropped for good.
            let node = item.node;
            let needed = node.min_concrete_size();
            if needed > SIZE_EPSILON && fits(needed, self.remaining) {
                self.charge(node.unit_size());
                next.push(WorkItem::concrete(node));
                next.push(item);
                concretizations += 1;
            }
        }

        self.work = next;
        self.spare = current;
        concretizations
    }

    /// First child, in declaration order, whose extra cost over what was
    /// reserved for `node` fits the remaining budget. The cost is charged.
    fn select_priority(&mut self, node: &'g GrammarNode) -> Option<&'g GrammarNode> {
        let reserved = node.copy_size();
        let chosen = node
            .children()
            .iter()
            .find(|child| fits(child.min_size() - reserved, self.remaining));

        match chosen {
            Some(child) => {
                self.charge(child.min_size() - reserved);
                Some(child)
            }
            None => {
                self.no_fitting_child(node);
                None
            }
        }
    }

    /// Weighted pick among the children that fit. The cost is charged.
    fn select_stochastic(&mut self, node: &'g GrammarNode) -> Option<&'g GrammarNode> {
        let reserved = node.copy_size();
        let remaining = self.remaining;
        let candidates = || {
            node.children()
                .iter()
                .filter(move |child| child.weight() > 0)
                .filter(move |child| fits(child.min_size() - reserved, remaining))
        };

        let total_weight = candidates().fold(0i32, |acc, child| acc.saturating_add(child.weight()));
        if total_weight <= 0 {
            self.no_fitting_child(node);
            return None;
        }

        let mut draw = self.rng.pick(total_weight);
        for child in candidates() {
            if draw < child.weight() {
                self.charge(child.min_size() - reserved);
                return Some(child);
            }
            draw -= child.weight();
        }

        // Only reachable if the saturated total exceeded the real weights.
        self.no_fitting_child(node);
        None
    }

    /// A choice node with a non-zero reservation always has a child that
    /// fits; anything else means the tree's sizes are inconsistent.
    fn no_fitting_child(&self, node: &GrammarNode) {
        if node.copy_size() <= SIZE_EPSILON {
            return;
        }
        debug_assert!(
            false,
            "no child of '{}' fits the remaining {}",
            node, self.remaining
        );
        error!(
            grammar = %node,
            remaining = self.remaining,
            "no child fits the remaining length; dropping node"
        );
    }
}

/// Spread leftover length over scalable instances in proportion to their
/// size. Returns the length still unfilled.
fn distribute_slack(instances: &mut [ModuleInstance<'_>], remaining: f64) -> f64 {
    if remaining <= SIZE_EPSILON {
        return remaining;
    }

    let scalable_sum: f64 = instances
        .iter()
        .filter(|instance| instance.module.scalable)
        .map(ModuleInstance::size)
        .sum();
    if scalable_sum <= 0.0 {
        return remaining;
    }

    let extra_scale = remaining / scalable_sum;
    for instance in instances.iter_mut().filter(|i| i.module.scalable) {
        instance.extra_scale = extra_scale;
    }
    0.0
}
