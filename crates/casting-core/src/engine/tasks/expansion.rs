use crate::core::constraints;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::tree::{NodeId, NodeStatus, SearchTree};
use rand::Rng;
use tracing::{debug, instrument, trace};

/// Gives `node` its full set of children by perturbing its structure.
///
/// The root receives `headexpand` children and deeper nodes `nexpand`. Each candidate is
/// redrawn up to `expansion_attempts` times until it passes the constraint checker; one that
/// never does is still attached, as a [`NodeStatus::Rejected`] child. Returns the viable new
/// children.
#[instrument(level = "debug", skip_all)]
pub fn run(
    tree: &mut SearchTree,
    node: NodeId,
    context: &SearchContext,
    rng: &mut impl Rng,
) -> Result<Vec<NodeId>, EngineError> {
    let parent = tree
        .node(node)
        .ok_or_else(|| EngineError::Internal("expansion target is not in the tree".to_string()))?;
    let structure = parent.structure().clone();
    let count = if parent.depth() == 0 {
        context.config.headexpand
    } else {
        context.config.nexpand
    };

    let mut viable = Vec::with_capacity(count);
    for _ in 0..count {
        let mut candidate = None;
        let mut last = None;
        for attempt in 1..=context.config.expansion_attempts {
            let trial = context.perturbation.perturb(&structure, rng);
            match constraints::check(&trial) {
                Ok(()) => {
                    candidate = Some(trial);
                    break;
                }
                Err(violation) => {
                    trace!(attempt, reason = %violation, "Expansion candidate rejected.");
                    last = Some(trial);
                }
            }
        }

        let (structure, status) = match candidate {
            Some(s) => (s, NodeStatus::Viable),
            None => (
                last.unwrap_or_else(|| structure.clone()),
                NodeStatus::Rejected,
            ),
        };
        let child = tree
            .add_child(node, structure, status)
            .ok_or_else(|| EngineError::Internal("failed to attach child".to_string()))?;
        if status == NodeStatus::Viable {
            viable.push(child);
        }
    }

    debug!(
        created = count,
        viable = viable.len(),
        "Expanded node."
    );
    Ok(viable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::Constraint;
    use crate::core::models::lattice::Lattice;
    use crate::core::models::structure::StructureData;
    use crate::core::perturbation::Perturbation;
    use crate::engine::config::OptimizerConfig;
    use crate::engine::evaluators::{Evaluation, Evaluator, EvaluatorError};
    use crate::engine::progress::ProgressReporter;
    use nalgebra::Point3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    struct Unused;

    impl Evaluator for Unused {
        fn name(&self) -> &str {
            "unused"
        }
        fn evaluate(&self, _: &StructureData) -> Result<Evaluation, EvaluatorError> {
            unreachable!("expansion never evaluates")
        }
    }

    fn dimer(separation: f64, dmin: f64, dmax: f64) -> StructureData {
        StructureData::from_cartesian(
            Lattice::cubic(20.0).unwrap(),
            &[
                Point3::new(9.0, 10.0, 10.0),
                Point3::new(9.0 + separation, 10.0, 10.0),
            ],
            vec!["Cu".into(), "Cu".into()],
            Arc::new(Constraint::single_species("Cu", 2, 2, dmin, dmax)),
        )
        .unwrap()
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig {
            headexpand: 5,
            nexpand: 2,
            expansion_attempts: 4,
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn root_gets_headexpand_children_and_deeper_nodes_nexpand() {
        let config = config();
        let reporter = ProgressReporter::new();
        let context = SearchContext::new(&config, &Unused, Perturbation::new(0.005).unwrap(), &reporter);
        let mut tree = SearchTree::new(dimer(2.5, 2.0, 3.0));
        let mut rng = StdRng::seed_from_u64(2);

        let root = tree.root_id();
        let viable = run(&mut tree, root, &context, &mut rng).unwrap();
        assert_eq!(tree.root().children().len(), 5);
        assert_eq!(viable.len(), 5);

        let grandchildren = run(&mut tree, viable[0], &context, &mut rng).unwrap();
        assert_eq!(grandchildren.len(), 2);
        assert!(grandchildren
            .iter()
            .all(|&id| tree.node(id).unwrap().depth() == 2));
    }

    #[test]
    fn unsatisfiable_candidates_become_rejected_children() {
        let config = config();
        let reporter = ProgressReporter::new();
        let context = SearchContext::new(&config, &Unused, Perturbation::new(0.02).unwrap(), &reporter);
        // Moves of at most 0.4 A per atom and axis cannot bring a 4 A gap under the 3 A contact limit.
        let mut tree = SearchTree::new(dimer(4.0, 2.0, 3.0));
        let mut rng = StdRng::seed_from_u64(3);

        let root = tree.root_id();
        let viable = run(&mut tree, root, &context, &mut rng).unwrap();
        assert!(viable.is_empty());
        assert_eq!(tree.root().children().len(), 5);
        assert!(tree
            .root()
            .children()
            .iter()
            .all(|&id| tree.node(id).unwrap().status() == NodeStatus::Rejected));
    }
}
