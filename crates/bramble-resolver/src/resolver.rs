//! Constraint propagation with chronological backtracking.
//!
//! The resolver keeps a FIFO work-list of edges to attach. Attaching an edge
//! creates its target node or narrows an existing one (diamond convergence).
//! When the work-list runs dry, the earliest-created undecided node is
//! committed to its first admissible version; that commit is a decision with
//! a snapshot of the whole search state. Committing fixes the node's
//! variants and evaluates its outgoing edge guards, which feeds the
//! work-list again. Any conflict restores the most recent decision and
//! tries its next version.
//!
//! Edges whose guards inspect other nodes (`^name`) are deferred until
//! every node is committed, then evaluated in rounds until no new edge
//! switches on. The final graph is rechecked so that no activated edge's
//! guard has become false.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bramble_core::config::ResolveConfig;
use bramble_core::guard::{GuardContext, SiblingState, SiblingView};
use bramble_core::recipe::{DependencyEdge, Recipe};
use bramble_core::repository::RecipeSource;
use bramble_core::spec::{Spec, SpecRequest};
use bramble_core::variant::{RequiredValue, VariantAssignment, VariantKind, VariantValue};
use bramble_core::version::VersionConstraint;
use tracing::{debug, trace};

use crate::cache::RecipeCache;
use crate::conflict::{ChainLink, Conflict, ConflictKind, ConflictReport, ResolveError, SearchStats};
use crate::graph::{BackEdge, ResolvedGraph};

/// Resolve `request` against `source` with a fresh cache.
pub fn resolve(
    request: &SpecRequest,
    source: &dyn RecipeSource,
    config: &ResolveConfig,
) -> Result<ResolvedGraph, ResolveError> {
    Resolver::new(source, config).resolve(request)
}

/// A single resolution run. Owns its recipe cache.
pub struct Resolver<'a> {
    source: &'a dyn RecipeSource,
    config: &'a ResolveConfig,
    cache: RecipeCache,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a dyn RecipeSource, config: &'a ResolveConfig) -> Self {
        Self {
            source,
            config,
            cache: RecipeCache::new(),
            cancel: None,
        }
    }

    /// Start from a pre-warmed cache, e.g. one filled by prefetching.
    pub fn with_cache(mut self, cache: RecipeCache) -> Self {
        self.cache = cache;
        self
    }

    /// Abandon the run with [`ResolveError::Cancelled`] once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn resolve(self, request: &SpecRequest) -> Result<ResolvedGraph, ResolveError> {
        let root = DependencyEdge {
            target: request.name.clone(),
            kinds: BTreeSet::new(),
            guard: Default::default(),
            version: request.version.clone(),
            variants: request.variants.clone(),
            declared: request.to_string(),
        };
        let mut run = Run {
            source: self.source,
            config: self.config,
            cache: self.cache,
            cancel: self.cancel,
            state: State::default(),
            decisions: Vec::new(),
            stats: SearchStats::default(),
        };
        run.state.work.push_back(WorkItem {
            parent: None,
            edge: root,
        });
        debug!("resolving {request}");
        run.run()
    }
}

/// A requirement together with where it came from.
#[derive(Debug, Clone)]
struct Origin {
    link: ChainLink,
}

#[derive(Debug, Clone)]
struct Committed {
    entry: usize,
    variants: VariantAssignment,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    recipe: Arc<Recipe>,
    /// Names from the root to this node, first route only.
    path: Vec<String>,
    constraint: VersionConstraint,
    version_origins: Vec<Origin>,
    /// Typed requirements from incoming edges.
    fixed: BTreeMap<String, (VariantValue, Vec<Origin>)>,
    /// `+name` / `~name` presence tests on non-boolean variants.
    presence: Vec<(String, bool, Origin)>,
    incoming: Vec<Origin>,
    committed: Option<Committed>,
}

#[derive(Debug, Clone)]
struct WorkItem {
    parent: Option<usize>,
    edge: DependencyEdge,
}

#[derive(Debug, Clone)]
struct Attached {
    from: usize,
    to: usize,
    edge: DependencyEdge,
}

/// Everything a decision snapshot must restore.
#[derive(Debug, Clone, Default)]
struct State {
    nodes: Vec<Node>,
    index: BTreeMap<String, usize>,
    edges: Vec<Attached>,
    work: VecDeque<WorkItem>,
    /// Sibling-guarded edges not yet switched on: (node, edge index).
    deferred: Vec<(usize, usize)>,
    /// Sibling-guarded edges switched on; rechecked against the final graph.
    activated: Vec<(usize, usize)>,
    back_edges: Vec<BackEdge>,
}

struct Decision {
    snapshot: State,
    node: usize,
    candidates: Vec<usize>,
    next: usize,
}

enum Step {
    Continue,
    Done,
}

struct Run<'a> {
    source: &'a dyn RecipeSource,
    config: &'a ResolveConfig,
    cache: RecipeCache,
    cancel: Option<Arc<AtomicBool>>,
    state: State,
    decisions: Vec<Decision>,
    stats: SearchStats,
}

impl SiblingView for State {
    fn sibling(&self, name: &str) -> Option<SiblingState<'_>> {
        let node = &self.nodes[*self.index.get(name)?];
        let committed = node.committed.as_ref()?;
        Some(SiblingState {
            version: &node.recipe.versions[committed.entry].version,
            variants: &committed.variants,
        })
    }
}

impl Node {
    fn origins_for(&self, variant: &str) -> Vec<Origin> {
        let mut origins: Vec<Origin> = self
            .fixed
            .get(variant)
            .map(|(_, o)| o.clone())
            .unwrap_or_default();
        origins.extend(
            self.presence
                .iter()
                .filter(|(name, _, _)| name == variant)
                .map(|(_, _, o)| o.clone()),
        );
        origins
    }
}

fn chain(origins: &[Origin]) -> Vec<ChainLink> {
    origins.iter().map(|o| o.link.clone()).collect()
}

impl<'a> Run<'a> {
    fn run(mut self) -> Result<ResolvedGraph, ResolveError> {
        loop {
            if self
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                debug!("resolution cancelled");
                return Err(ResolveError::Cancelled);
            }
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Done) => return self.freeze(),
                Err(conflict) => self.backtrack(conflict)?,
            }
        }
    }

    fn step(&mut self) -> Result<Step, Conflict> {
        if let Some(item) = self.state.work.pop_front() {
            self.attach(item)?;
            return Ok(Step::Continue);
        }
        if let Some(id) = self.state.nodes.iter().position(|n| n.committed.is_none()) {
            self.decide(id)?;
            return Ok(Step::Continue);
        }
        if self.activate_deferred() {
            return Ok(Step::Continue);
        }
        self.check_drift()?;
        Ok(Step::Done)
    }

    fn fail(&self, conflict: Conflict) -> ResolveError {
        let mut stats = self.stats;
        stats.recipes_loaded = self.cache.len();
        debug!("resolution failed: {conflict}");
        ResolveError::Conflict(ConflictReport::new(conflict, stats))
    }

    /// Undo to the most recent decision with an untried version and commit
    /// that version instead.
    fn backtrack(&mut self, mut conflict: Conflict) -> Result<(), ResolveError> {
        debug!("conflict: {conflict}");
        loop {
            let Some(mut decision) = self.decisions.pop() else {
                return Err(self.fail(conflict));
            };
            if decision.next >= decision.candidates.len() {
                continue;
            }
            self.stats.backtracks += 1;
            if self.stats.backtracks > self.config.resolver.max_backtracks as usize {
                debug!("backtrack limit reached");
                return Err(self.fail(conflict));
            }
            self.state = decision.snapshot.clone();
            let node = decision.node;
            let entry = decision.candidates[decision.next];
            decision.next += 1;
            self.decisions.push(decision);
            debug!(
                "backtracking: retrying {} at {}",
                self.state.nodes[node].name, self.state.nodes[node].recipe.versions[entry].version
            );
            match self.commit(node, entry) {
                Ok(()) => return Ok(()),
                Err(next) => conflict = next,
            }
        }
    }

    fn origin(&self, item: &WorkItem) -> Origin {
        let path = item
            .parent
            .map(|p| self.state.nodes[p].path.clone())
            .unwrap_or_default();
        let requirement = SpecRequest {
            name: item.edge.target.clone(),
            version: item.edge.version.clone(),
            variants: item.edge.variants.clone(),
        };
        Origin {
            link: ChainLink {
                path,
                kinds: item.edge.kinds.clone(),
                requirement: requirement.to_string(),
            },
        }
    }

    /// Whether `from` can reach `to` over attached edges.
    fn reaches(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut parent: BTreeMap<usize, usize> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut at = to;
                while let Some(&p) = parent.get(&at) {
                    path.push(p);
                    at = p;
                }
                path.reverse();
                return Some(path);
            }
            for e in self.state.edges.iter().filter(|e| e.from == current) {
                if seen.insert(e.to) {
                    parent.insert(e.to, current);
                    queue.push_back(e.to);
                }
            }
        }
        None
    }

    /// Whether a committed node already meets everything `edge` asks of it.
    fn satisfied_by(&self, id: usize, edge: &DependencyEdge) -> bool {
        let node = &self.state.nodes[id];
        let Some(committed) = &node.committed else {
            return false;
        };
        let version = &node.recipe.versions[committed.entry].version;
        edge.version.as_ref().map_or(true, |c| c.satisfies(version))
            && edge.variants.iter().all(|req| {
                committed
                    .variants
                    .get(&req.name)
                    .is_some_and(|value| req.matches(value))
            })
    }

    fn attach(&mut self, item: WorkItem) -> Result<(), Conflict> {
        let target = item.edge.target.clone();
        trace!("attaching {}", item.edge);
        let origin = self.origin(&item);
        let recipe = self
            .cache
            .get_or_fetch(&target, self.source)
            .map_err(|e| {
                Conflict::new(
                    &target,
                    ConflictKind::RecipeNotFound,
                    vec![origin.link.clone()],
                    e.detail(),
                )
            })?;

        let existing = self.state.index.get(&target).copied();
        if let (Some(parent), Some(child)) = (item.parent, existing) {
            if let Some(cycle) = self.reaches(child, parent) {
                if item.edge.is_build_only() && self.satisfied_by(child, &item.edge) {
                    debug!(
                        "accepting build-only back-edge {} -> {}",
                        self.state.nodes[parent].name, target
                    );
                    self.state.back_edges.push(BackEdge {
                        from: self.state.nodes[parent].name.clone(),
                        to: target,
                        edge: item.edge,
                    });
                    return Ok(());
                }
                // A build-only edge onto a committed ancestor that asks for
                // something else is a plain requirement clash.
                if item.edge.is_build_only() && self.state.nodes[child].committed.is_some() {
                    self.merge(child, &item.edge, origin.clone())?;
                }
                let mut names: Vec<&str> = cycle
                    .iter()
                    .map(|&i| self.state.nodes[i].name.as_str())
                    .collect();
                names.push(&target);
                return Err(Conflict::new(
                    &target,
                    ConflictKind::CycleDetected,
                    vec![origin.link],
                    format!("cycle {}", names.join(" → ")),
                ));
            }
        }

        let child = match existing {
            Some(child) => child,
            None => {
                let mut path = item
                    .parent
                    .map(|p| self.state.nodes[p].path.clone())
                    .unwrap_or_default();
                path.push(target.clone());
                let id = self.state.nodes.len();
                self.state.nodes.push(Node {
                    name: target.clone(),
                    recipe,
                    path,
                    constraint: VersionConstraint::Any,
                    version_origins: Vec::new(),
                    fixed: BTreeMap::new(),
                    presence: Vec::new(),
                    incoming: Vec::new(),
                    committed: None,
                });
                self.state.index.insert(target.clone(), id);
                id
            }
        };

        self.merge(child, &item.edge, origin)?;
        if let Some(parent) = item.parent {
            self.state.edges.push(Attached {
                from: parent,
                to: child,
                edge: item.edge,
            });
        }
        Ok(())
    }

    /// Fold an edge's requirements into its target node.
    fn merge(&mut self, id: usize, edge: &DependencyEdge, origin: Origin) -> Result<(), Conflict> {
        let node = &mut self.state.nodes[id];
        let recipe = Arc::clone(&node.recipe);

        if let Some(constraint) = &edge.version {
            node.version_origins.push(origin.clone());
            if let Some(committed) = &node.committed {
                let chosen = &recipe.versions[committed.entry].version;
                if !constraint.satisfies(chosen) {
                    return Err(Conflict::new(
                        &node.name,
                        ConflictKind::VersionConflict,
                        chain(&node.version_origins),
                        format!("{}@{chosen} was already chosen", node.name),
                    ));
                }
            } else {
                match node.constraint.intersect(constraint) {
                    Some(narrowed) => node.constraint = narrowed,
                    None => {
                        return Err(Conflict::new(
                            &node.name,
                            ConflictKind::VersionConflict,
                            chain(&node.version_origins),
                            "no common version",
                        ))
                    }
                }
            }
        }

        for req in &edge.variants {
            let variant_conflict = |origins: Vec<Origin>, detail: String| {
                Conflict::new(&edge.target, ConflictKind::VariantConflict, chain(&origins), detail)
            };
            let Some(definition) = recipe.variant(&req.name) else {
                return Err(variant_conflict(
                    vec![origin.clone()],
                    format!("`{}` has no variant `{}`", edge.target, req.name),
                ));
            };

            // A flag on a non-boolean variant is a presence test, checked
            // once the node's values are fixed.
            if let (RequiredValue::Flag(wanted), false) =
                (&req.value, definition.kind == VariantKind::Bool)
            {
                let mut origins = node.origins_for(&req.name);
                origins.push(origin.clone());
                if let Some(committed) = &node.committed {
                    if !committed
                        .variants
                        .get(&req.name)
                        .is_some_and(|value| req.matches(value))
                    {
                        return Err(variant_conflict(
                            origins,
                            format!("`{}` was already chosen without {req}", node.name),
                        ));
                    }
                }
                node.presence.push((req.name.clone(), *wanted, origin.clone()));
                continue;
            }

            let value = definition.coerce(&req.value).map_err(|e| {
                variant_conflict(vec![origin.clone()], e.to_string())
            })?;

            if let Some(committed) = &node.committed {
                let chosen = committed.variants.get(&req.name);
                if !chosen.is_some_and(|v| req.matches(v)) {
                    let mut origins = node.origins_for(&req.name);
                    origins.push(origin.clone());
                    let shown = chosen.map(ToString::to_string).unwrap_or_default();
                    return Err(variant_conflict(
                        origins,
                        format!("`{}` was already chosen with {}={shown}", node.name, req.name),
                    ));
                }
            }

            match node.fixed.get_mut(&req.name) {
                Some((existing, origins)) => {
                    origins.push(origin.clone());
                    match existing.merge(&value) {
                        Some(merged) => *existing = merged,
                        None => {
                            return Err(variant_conflict(
                                origins.clone(),
                                format!(
                                    "variant `{}` cannot be both {existing} and {value}",
                                    req.name
                                ),
                            ))
                        }
                    }
                }
                None => {
                    node.fixed
                        .insert(req.name.clone(), (value, vec![origin.clone()]));
                }
            }
        }

        node.incoming.push(origin);
        Ok(())
    }

    /// Admissible versions in preference order: declaration order, with
    /// deprecated versions last.
    fn candidates(&self, id: usize) -> Vec<usize> {
        let node = &self.state.nodes[id];
        let (fresh, deprecated): (Vec<usize>, Vec<usize>) = node
            .recipe
            .versions
            .iter()
            .enumerate()
            .filter(|(_, entry)| node.constraint.satisfies(&entry.version))
            .map(|(i, _)| i)
            .partition(|&i| !node.recipe.versions[i].deprecated);
        fresh.into_iter().chain(deprecated).collect()
    }

    fn decide(&mut self, id: usize) -> Result<(), Conflict> {
        let candidates = self.candidates(id);
        let Some(&first) = candidates.first() else {
            let node = &self.state.nodes[id];
            return Err(Conflict::new(
                &node.name,
                ConflictKind::VersionConflict,
                chain(&node.version_origins),
                format!(
                    "no declared version of `{}` satisfies {}",
                    node.name, node.constraint
                ),
            ));
        };
        self.stats.decisions += 1;
        self.decisions.push(Decision {
            snapshot: self.state.clone(),
            node: id,
            candidates,
            next: 1,
        });
        self.commit(id, first)
    }

    /// Fix a node's version and variants, then evaluate its edges.
    fn commit(&mut self, id: usize, entry: usize) -> Result<(), Conflict> {
        let node = &self.state.nodes[id];
        let recipe = Arc::clone(&node.recipe);
        let version = &recipe.versions[entry].version;
        debug!("deciding {}@{version}", node.name);

        let mut variants = VariantAssignment::new();
        for definition in &recipe.variants {
            let value = match node.fixed.get(&definition.name) {
                Some((value, _)) => value.clone(),
                None => self
                    .config
                    .variants
                    .get(&definition.name)
                    .and_then(|pref| definition.coerce(&pref.requirement()).ok())
                    .unwrap_or_else(|| definition.default_value()),
            };
            variants.insert(definition.name.clone(), value);
        }

        for (name, wanted, origin) in &node.presence {
            let set = variants.get(name).is_some_and(VariantValue::is_set);
            if set != *wanted {
                let sign = if *wanted { '+' } else { '~' };
                return Err(Conflict::new(
                    &node.name,
                    ConflictKind::VariantConflict,
                    chain(std::slice::from_ref(origin)),
                    format!(
                        "{sign}{name} does not hold for {}={}",
                        name,
                        variants.get(name).map(ToString::to_string).unwrap_or_default()
                    ),
                ));
            }
        }

        let (own_edges, deferred) = {
            let ctx = GuardContext {
                version,
                variants: &variants,
                arch: &self.config.arch,
                siblings: &self.state,
            };

            for decl in &recipe.conflicts {
                if decl.when.evaluate(&ctx) && decl.spec.evaluate(&ctx) {
                    return Err(Conflict::new(
                        &node.name,
                        ConflictKind::UnsatisfiableGuard,
                        chain(&node.incoming),
                        format!("{}@{version} {decl}", node.name),
                    ));
                }
            }

            let mut own_edges = Vec::new();
            let mut deferred = Vec::new();
            for (i, edge) in recipe.depends.iter().enumerate() {
                if edge.guard.references_siblings() {
                    deferred.push((id, i));
                } else if edge.guard.evaluate(&ctx) {
                    own_edges.push(edge.clone());
                } else {
                    trace!("{}: edge `{edge}` excluded", node.name);
                }
            }
            (own_edges, deferred)
        };

        self.state.nodes[id].committed = Some(Committed { entry, variants });
        for edge in own_edges {
            self.state.work.push_back(WorkItem {
                parent: Some(id),
                edge,
            });
        }
        self.state.deferred.extend(deferred);
        Ok(())
    }

    /// Switch on every deferred edge whose guard now holds. Returns whether
    /// any edge switched on.
    fn activate_deferred(&mut self) -> bool {
        let switched: Vec<(usize, usize)> = self
            .state
            .deferred
            .iter()
            .copied()
            .filter(|&(id, i)| self.guard_holds(id, i))
            .collect();
        if switched.is_empty() {
            return false;
        }
        self.state.deferred.retain(|d| !switched.contains(d));
        for (id, i) in switched {
            let edge = self.state.nodes[id].recipe.depends[i].clone();
            debug!("{}: sibling condition on `{edge}` holds", self.state.nodes[id].name);
            self.state.activated.push((id, i));
            self.state.work.push_back(WorkItem {
                parent: Some(id),
                edge,
            });
        }
        true
    }

    fn guard_holds(&self, id: usize, edge: usize) -> bool {
        let node = &self.state.nodes[id];
        let Some(committed) = &node.committed else {
            return false;
        };
        let ctx = GuardContext {
            version: &node.recipe.versions[committed.entry].version,
            variants: &committed.variants,
            arch: &self.config.arch,
            siblings: &self.state,
        };
        node.recipe.depends[edge].guard.evaluate(&ctx)
    }

    /// Every switched-on sibling condition must still hold in the final graph.
    fn check_drift(&self) -> Result<(), Conflict> {
        for &(id, i) in &self.state.activated {
            if !self.guard_holds(id, i) {
                let node = &self.state.nodes[id];
                let edge = &node.recipe.depends[i];
                return Err(Conflict::new(
                    &edge.target,
                    ConflictKind::UnsatisfiableGuard,
                    chain(&node.incoming),
                    format!(
                        "condition `{}` on {} → {} no longer holds in the final graph",
                        edge.guard, node.name, edge.target
                    ),
                ));
            }
        }
        Ok(())
    }

    fn freeze(self) -> Result<ResolvedGraph, ResolveError> {
        let mut specs = Vec::with_capacity(self.state.nodes.len());
        for node in &self.state.nodes {
            let Some(committed) = &node.committed else {
                return Err(self.fail(Conflict::new(
                    &node.name,
                    ConflictKind::VersionConflict,
                    Vec::new(),
                    "left undecided",
                )));
            };
            let entry = &node.recipe.versions[committed.entry];
            let mut spec = Spec::new(&node.name, entry.version.clone(), committed.variants.clone());
            spec.commit = entry.source_ref().map(str::to_string);
            specs.push(spec);
        }
        let edges = self
            .state
            .edges
            .iter()
            .map(|a| (a.from, a.to, a.edge.clone()))
            .collect();
        debug!(
            "resolved {} specs after {} decisions and {} backtracks",
            specs.len(),
            self.stats.decisions,
            self.stats.backtracks
        );
        ResolvedGraph::freeze(specs, edges, self.state.back_edges.clone()).map_err(|detail| {
            let root = self
                .state
                .nodes
                .first()
                .map(|n| n.name.clone())
                .unwrap_or_default();
            self.fail(Conflict::new(root, ConflictKind::CycleDetected, Vec::new(), detail))
        })
    }
}
