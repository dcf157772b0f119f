//! The search tree: an arena of nodes with parent and child keys.

use super::evaluators::{SENTINEL_ENERGY, is_sentinel};
use crate::core::models::structure::StructureData;
use rand::Rng;
use rand::seq::SliceRandom;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    pub struct NodeId;
}

const SCORE_TIE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Viable,
    /// An expansion candidate that never satisfied the constraints. Never selected or simulated.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct SearchNode {
    structure: StructureData,
    structure_energy: f64,
    energy: f64,
    visits: u64,
    value_accumulator: f64,
    depth: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    status: NodeStatus,
}

impl SearchNode {
    fn new(structure: StructureData, depth: usize, parent: Option<NodeId>, status: NodeStatus) -> Self {
        Self {
            structure,
            structure_energy: SENTINEL_ENERGY,
            energy: SENTINEL_ENERGY,
            visits: 0,
            value_accumulator: SENTINEL_ENERGY,
            depth,
            parent,
            children: Vec::new(),
            status,
        }
    }

    pub fn structure(&self) -> &StructureData {
        &self.structure
    }
    /// Energy of [`Self::structure`] itself.
    pub fn structure_energy(&self) -> f64 {
        self.structure_energy
    }
    /// Best energy seen anywhere in this node's subtree.
    pub fn energy(&self) -> f64 {
        self.energy
    }
    pub fn visits(&self) -> u64 {
        self.visits
    }
    pub fn value_accumulator(&self) -> f64 {
        self.value_accumulator
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
    pub fn status(&self) -> NodeStatus {
        self.status
    }
    pub fn is_viable(&self) -> bool {
        self.status == NodeStatus::Viable
    }
}

pub struct SearchTree {
    nodes: SlotMap<NodeId, SearchNode>,
    root: NodeId,
}

impl SearchTree {
    pub fn new(root_structure: StructureData) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SearchNode::new(root_structure, 0, None, NodeStatus::Viable));
        Self { nodes, root }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &SearchNode {
        &self.nodes[self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&SearchNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SearchNode)> {
        self.nodes.iter()
    }

    /// Appends a child under `parent`. Rejected children keep the sentinel energy forever.
    ///
    /// Returns `None` if `parent` is not in the tree.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        structure: StructureData,
        status: NodeStatus,
    ) -> Option<NodeId> {
        let depth = self.nodes.get(parent)?.depth + 1;
        let child = self
            .nodes
            .insert(SearchNode::new(structure, depth, Some(parent), status));
        self.nodes[parent].children.push(child);
        Some(child)
    }

    /// Offers a scored structure to `id`.
    ///
    /// The node adopts `structure` only on a strict improvement by a non-sentinel energy;
    /// returns whether it did.
    pub fn offer(&mut self, id: NodeId, structure: StructureData, energy: f64) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if is_sentinel(energy) || energy >= node.structure_energy {
            return false;
        }
        node.structure = structure;
        node.structure_energy = energy;
        node.energy = node.energy.min(energy);
        true
    }

    /// Walks from `from` up to the root, counting a visit and folding `result` into every node
    /// as a running minimum.
    pub fn backpropagate(&mut self, from: NodeId, result: f64) {
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(node) = self.nodes.get_mut(id) else {
                break;
            };
            node.visits += 1;
            node.value_accumulator = node.value_accumulator.min(result);
            node.energy = node.energy.min(result);
            current = node.parent;
        }
    }

    /// Descends from the root to the node to expand or simulate next.
    ///
    /// At each level the viable child with the highest [`selection scores`](Self::selection_scores)
    /// is taken, ties broken uniformly at random. The descent stops at `maxdepth`, at a leaf, or
    /// at a node whose children were all rejected.
    pub fn select(&self, exploreconstant: f64, maxdepth: usize, rng: &mut impl Rng) -> NodeId {
        let mut current = self.root;
        loop {
            let node = &self.nodes[current];
            if node.depth >= maxdepth || node.children.is_empty() {
                return current;
            }
            let scored = self.selection_scores(current, exploreconstant);
            if scored.is_empty() {
                return current;
            }

            let best = scored
                .iter()
                .map(|&(_, score)| score)
                .fold(f64::NEG_INFINITY, f64::max);
            let ties: Vec<NodeId> = scored
                .iter()
                .filter(|&&(_, score)| {
                    if best.is_infinite() {
                        score == best
                    } else {
                        score >= best - SCORE_TIE_TOLERANCE
                    }
                })
                .map(|&(id, _)| id)
                .collect();
            match ties.choose(rng) {
                Some(&next) => current = next,
                None => return current,
            }
        }
    }

    /// Priority of every viable child of `parent`.
    ///
    /// Unvisited children score infinity. Visited ones score
    /// `exploitation + c * sqrt(ln(parent.visits) / visits)`, where exploitation maps the
    /// children's value accumulators onto `[0, 1]` with the lowest energy at 1. Children that
    /// have only produced the sentinel score 0, and a set of equal energies scores 1.
    pub fn selection_scores(&self, parent: NodeId, exploreconstant: f64) -> Vec<(NodeId, f64)> {
        let Some(node) = self.nodes.get(parent) else {
            return Vec::new();
        };
        let viable: Vec<(NodeId, &SearchNode)> = node
            .children
            .iter()
            .filter_map(|&id| self.nodes.get(id).map(|child| (id, child)))
            .filter(|(_, child)| child.is_viable())
            .collect();

        let (lo, hi) = viable
            .iter()
            .filter(|(_, c)| c.visits > 0 && !is_sentinel(c.value_accumulator))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, c)| {
                (lo.min(c.value_accumulator), hi.max(c.value_accumulator))
            });
        let parent_log = (node.visits.max(1) as f64).ln();

        viable
            .iter()
            .map(|&(id, child)| {
                if child.visits == 0 {
                    return (id, f64::INFINITY);
                }
                let exploitation = if is_sentinel(child.value_accumulator) {
                    0.0
                } else if hi - lo <= 0.0 {
                    1.0
                } else {
                    (hi - child.value_accumulator) / (hi - lo)
                };
                let exploration = exploreconstant * (parent_log / child.visits as f64).sqrt();
                (id, exploitation + exploration)
            })
            .collect()
    }

    /// The node whose own structure has the lowest energy; the root when nothing beats the
    /// sentinel.
    pub fn best(&self) -> NodeId {
        self.nodes
            .iter()
            .filter(|(_, n)| !is_sentinel(n.structure_energy))
            .min_by(|(_, a), (_, b)| a.structure_energy.total_cmp(&b.structure_energy))
            .map(|(id, _)| id)
            .unwrap_or(self.root)
    }
}
