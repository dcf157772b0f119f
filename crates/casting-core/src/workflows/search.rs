use crate::core::generation::GeometryGenerator;
use crate::core::models::structure::StructureData;
use crate::core::perturbation::Perturbation;
use crate::engine::config::{ConfigError, ConvergenceConfig, SearchConfig};
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::evaluators::{Evaluator, EvaluatorRegistry, SENTINEL_ENERGY, is_sentinel};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::{expansion, simulation};
use crate::engine::tree::{NodeId, SearchTree};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The lowest-energy structure found, or the starting structure if none was valid.
    pub structure: StructureData,
    /// Energy per atom of `structure`; the sentinel when `found_valid` is false.
    pub energy: f64,
    pub found_valid: bool,
    /// Iterations actually completed (fewer than configured after early convergence).
    pub iterations: usize,
    pub tree_size: usize,
    /// Best energy in the tree after each iteration.
    pub history: Vec<f64>,
}

/// Runs a complete search: builds the evaluator from `registry`, generates a random starting
/// structure and optimizes it.
///
/// # Errors
///
/// Fails before any search state exists if the configuration is invalid, the evaluator is
/// unknown or unavailable, or no starting structure can be generated. A failing evaluator
/// aborts the search.
#[instrument(skip_all, name = "search_workflow", fields(seed = config.seed))]
pub fn run(
    config: &SearchConfig,
    registry: &EvaluatorRegistry,
    reporter: &ProgressReporter,
) -> Result<SearchResult, EngineError> {
    let evaluator = prepare(config, registry)?;

    reporter.report(Progress::PhaseStart {
        name: "Generating Initial Structure",
    });
    let mut rng = StdRng::seed_from_u64(config.seed);
    let generator =
        GeometryGenerator::new(config.lattice.clone(), Arc::new(config.constraint.clone()))?;
    let root = generator.generate(&mut rng)?;
    info!(
        formula = %root.formula(),
        atoms = root.num_atoms(),
        "Generated initial structure."
    );
    reporter.report(Progress::PhaseFinish);

    optimize(root, config, evaluator.as_ref(), &mut rng, reporter)
}

/// Like [`run`], but starts from a caller-supplied structure instead of a random one.
///
/// The structure is bound to the configured constraint. An invalid start is allowed; it is
/// simply scored with the sentinel and improved upon.
#[instrument(skip_all, name = "search_workflow", fields(seed = config.seed))]
pub fn run_with_root(
    root: StructureData,
    config: &SearchConfig,
    registry: &EvaluatorRegistry,
    reporter: &ProgressReporter,
) -> Result<SearchResult, EngineError> {
    let evaluator = prepare(config, registry)?;
    let root = root.with_constraint(Arc::new(config.constraint.clone()));
    let mut rng = StdRng::seed_from_u64(config.seed);
    optimize(root, config, evaluator.as_ref(), &mut rng, reporter)
}

fn prepare(
    config: &SearchConfig,
    registry: &EvaluatorRegistry,
) -> Result<Box<dyn Evaluator>, EngineError> {
    config.validate()?;
    let evaluator = registry.create(&config.evaluator)?;
    evaluator.check_available()?;
    info!(evaluator = evaluator.name(), "Evaluator ready.");
    Ok(evaluator)
}

fn optimize(
    root: StructureData,
    config: &SearchConfig,
    evaluator: &dyn Evaluator,
    rng: &mut StdRng,
    reporter: &ProgressReporter,
) -> Result<SearchResult, EngineError> {
    let optimizer = &config.optimizer;
    let perturbation = Perturbation::new(optimizer.max_mutation).map_err(|e| {
        ConfigError::InvalidParameter {
            name: "max_mutation",
            reason: e.to_string(),
        }
    })?;
    let context = SearchContext::new(optimizer, evaluator, perturbation, reporter);

    reporter.report(Progress::PhaseStart {
        name: "Evaluating Initial Structure",
    });
    let mut tree = SearchTree::new(root.clone());
    let root_id = tree.root_id();
    let initial = simulation::evaluate(&root, &context)?;
    info!(energy = initial.energy, "Initial structure evaluated.");
    tree.offer(root_id, initial.structure, initial.energy);
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Tree Search",
    });
    reporter.report(Progress::TaskStart {
        total_steps: optimizer.niterations as u64,
    });

    let mut history = Vec::with_capacity(optimizer.niterations);
    let mut convergence = optimizer.convergence.map(ConvergenceTracker::new);
    let mut iterations = 0;

    for iteration in 0..optimizer.niterations {
        iterate(&mut tree, &context, rng)?;
        iterations += 1;

        let best = tree.root().energy();
        history.push(best);
        reporter.report(Progress::TaskIncrement);
        debug!(iteration, best_energy = best, nodes = tree.len(), "Iteration complete.");

        if let Some(tracker) = convergence.as_mut() {
            if tracker.update(best) {
                info!(
                    iteration,
                    best_energy = best,
                    "Best energy stagnated; stopping early."
                );
                reporter.report(Progress::StatusUpdate {
                    text: format!("Converged after {} iterations", iterations),
                });
                break;
            }
        }
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let result = finalize(&tree, root, iterations, history);
    info!(
        energy = result.energy,
        found_valid = result.found_valid,
        iterations = result.iterations,
        tree_size = result.tree_size,
        "Search complete."
    );
    Ok(result)
}

/// One select-expand-simulate-backpropagate cycle.
fn iterate(
    tree: &mut SearchTree,
    context: &SearchContext,
    rng: &mut impl Rng,
) -> Result<(), EngineError> {
    let config = context.config;
    let selected = tree.select(config.exploreconstant, config.maxdepth, rng);
    let target = expand_if_leaf(tree, selected, context, rng)?;

    let structure = tree
        .node(target)
        .map(|n| n.structure().clone())
        .ok_or_else(|| EngineError::Internal("simulation target is not in the tree".to_string()))?;
    let outcome = simulation::run(&structure, context, rng)?;

    tree.offer(target, outcome.structure, outcome.energy);
    tree.backpropagate(target, outcome.energy);
    Ok(())
}

/// Expands a childless node below the depth limit and returns a random viable new child, or
/// the node itself when it cannot or need not be expanded.
fn expand_if_leaf(
    tree: &mut SearchTree,
    node: NodeId,
    context: &SearchContext,
    rng: &mut impl Rng,
) -> Result<NodeId, EngineError> {
    let expandable = tree
        .node(node)
        .is_some_and(|n| n.depth() < context.config.maxdepth && n.children().is_empty());
    if !expandable {
        return Ok(node);
    }
    let viable = expansion::run(tree, node, context, rng)?;
    Ok(viable.choose(rng).copied().unwrap_or(node))
}

fn finalize(
    tree: &SearchTree,
    original_root: StructureData,
    iterations: usize,
    history: Vec<f64>,
) -> SearchResult {
    let best = tree.node(tree.best());
    match best {
        Some(node) if !is_sentinel(node.structure_energy()) => SearchResult {
            structure: node.structure().clone(),
            energy: node.structure_energy(),
            found_valid: true,
            iterations,
            tree_size: tree.len(),
            history,
        },
        _ => SearchResult {
            structure: original_root,
            energy: SENTINEL_ENERGY,
            found_valid: false,
            iterations,
            tree_size: tree.len(),
            history,
        },
    }
}

/// Counts iterations since the best energy last improved by at least the threshold.
struct ConvergenceTracker {
    config: ConvergenceConfig,
    reference: f64,
    stale: usize,
}

impl ConvergenceTracker {
    fn new(config: ConvergenceConfig) -> Self {
        Self {
            config,
            reference: f64::INFINITY,
            stale: 0,
        }
    }

    /// Returns `true` once the patience is exhausted.
    fn update(&mut self, best: f64) -> bool {
        if best < self.reference - self.config.energy_threshold {
            self.reference = best;
            self.stale = 0;
        } else {
            self.stale += 1;
        }
        self.stale >= self.config.patience_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::models::lattice::{Lattice, LatticeBounds};
    use crate::engine::tree::NodeStatus;
    use nalgebra::Point3;
    use crate::engine::config::OptimizerConfig;
    use crate::engine::evaluators::{Evaluation, EvaluatorError};

    /// Scores a structure by the mean fractional x coordinate.
    struct DriftEvaluator;

    impl Evaluator for DriftEvaluator {
        fn name(&self) -> &str {
            "drift"
        }
        fn evaluate(&self, structure: &StructureData) -> Result<Evaluation, EvaluatorError> {
            let xs: Vec<f64> = structure.parameters().iter().step_by(3).copied().collect();
            let mean = xs.iter().sum::<f64>() / xs.len() as f64;
            Ok(Evaluation::new(structure.clone(), mean))
        }
    }

    fn small_tree(optimizer: &OptimizerConfig, iterations: usize) -> SearchTree {
        let constraint = Arc::new(Constraint::single_species("Cu", 4, 4, 2.0, 3.0));
        let generator =
            GeometryGenerator::new(LatticeBounds::cubic(10.0, 12.0, 2.0), constraint).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let root = generator.generate(&mut rng).unwrap();

        let reporter = ProgressReporter::new();
        let perturbation = Perturbation::new(optimizer.max_mutation).unwrap();
        let context = SearchContext::new(optimizer, &DriftEvaluator, perturbation, &reporter);
        let mut tree = SearchTree::new(root);
        for _ in 0..iterations {
            iterate(&mut tree, &context, &mut rng).unwrap();
        }
        tree
    }

    fn optimizer() -> OptimizerConfig {
        OptimizerConfig {
            headexpand: 4,
            nexpand: 2,
            nsimulate: 2,
            nplayouts: 2,
            maxdepth: 3,
            max_mutation: 0.01,
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn root_visits_equal_completed_iterations() {
        let tree = small_tree(&optimizer(), 25);
        assert_eq!(tree.root().visits(), 25);
    }

    #[test]
    fn child_visits_never_exceed_parent_visits() {
        let tree = small_tree(&optimizer(), 40);
        for (_, node) in tree.iter() {
            let child_visits: u64 = node
                .children()
                .iter()
                .map(|&c| tree.node(c).unwrap().visits())
                .sum();
            assert!(child_visits <= node.visits());
            assert!(node.depth() <= 3);
        }
    }

    #[test]
    fn branching_factor_matches_configuration() {
        let tree = small_tree(&optimizer(), 30);
        assert_eq!(tree.root().children().len(), 4);
        for (_, node) in tree.iter() {
            let n = node.children().len();
            if node.depth() > 0 {
                assert!(n == 0 || n == 2, "node at depth {} has {n} children", node.depth());
            }
        }
    }

    #[test]
    fn nodes_at_maxdepth_are_never_expanded() {
        let optimizer = OptimizerConfig {
            maxdepth: 0,
            ..optimizer()
        };
        let tree = small_tree(&optimizer, 10);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root().visits(), 10);
    }

    #[test]
    fn fully_rejected_expansion_simulates_at_the_expanded_node() {
        let optimizer = OptimizerConfig {
            headexpand: 3,
            expansion_attempts: 2,
            ..optimizer()
        };
        // Six angstroms apart with a three angstrom contact cutoff: no perturbation reconnects it.
        let split_dimer = StructureData::from_cartesian(
            Lattice::cubic(20.0).unwrap(),
            &[Point3::new(7.0, 10.0, 10.0), Point3::new(13.0, 10.0, 10.0)],
            vec!["Cu".into(), "Cu".into()],
            Arc::new(Constraint::single_species("Cu", 2, 2, 2.0, 3.0)),
        )
        .unwrap();

        let reporter = ProgressReporter::new();
        let perturbation = Perturbation::new(optimizer.max_mutation).unwrap();
        let context = SearchContext::new(&optimizer, &DriftEvaluator, perturbation, &reporter);
        let mut tree = SearchTree::new(split_dimer);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..5 {
            iterate(&mut tree, &context, &mut rng).unwrap();
        }

        assert_eq!(tree.root().visits(), 5);
        assert_eq!(tree.len(), 1 + 3);
        assert_eq!(tree.root().children().len(), 3);
        for &child in tree.root().children() {
            let child = tree.node(child).unwrap();
            assert_eq!(child.status(), NodeStatus::Rejected);
            assert_eq!(child.visits(), 0);
        }
        assert!(is_sentinel(tree.root().energy()));
    }

    #[test]
    fn convergence_tracker_resets_on_significant_improvement() {
        let mut tracker = ConvergenceTracker::new(ConvergenceConfig {
            energy_threshold: 0.1,
            patience_iterations: 2,
        });
        assert!(!tracker.update(-1.0));
        assert!(!tracker.update(-1.05));
        assert!(tracker.update(-1.08));

        let mut tracker = ConvergenceTracker::new(ConvergenceConfig {
            energy_threshold: 0.1,
            patience_iterations: 2,
        });
        assert!(!tracker.update(-1.0));
        assert!(!tracker.update(-1.05));
        assert!(!tracker.update(-1.2));
        assert!(!tracker.update(-1.2));
        assert!(tracker.update(-1.2));
    }

    #[test]
    fn sentinel_plateau_counts_as_stagnation() {
        let mut tracker = ConvergenceTracker::new(ConvergenceConfig {
            energy_threshold: 0.0,
            patience_iterations: 3,
        });
        let sentinel = SENTINEL_ENERGY;
        assert!(!tracker.update(sentinel));
        assert!(!tracker.update(sentinel));
        assert!(!tracker.update(sentinel));
        assert!(tracker.update(sentinel));
    }
}
