//! Arena-backed search tree. Nodes refer to each other by index only.

use crate::board::{Actor, Board, CallLocation, SearchRng};
use crate::config::{FinalSelection, SearchConfig};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One position in the tree.
///
/// `actor` is who moves in this node's position; the UCB score of a child is
/// always read from the perspective of its parent's actor.
#[derive(Debug, Clone)]
pub struct Node<M> {
    mv: Option<M>,
    actor: Actor,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    expanded: bool,
    terminal: bool,
    weight: f64,
    visits: u64,
    scores: Vec<f64>,
    optimistic: Vec<f64>,
    pessimistic: Vec<f64>,
    pruned: bool,
}

impl<M> Node<M> {
    fn new(mv: Option<M>, actor: Actor, parent: Option<NodeId>, players: usize) -> Self {
        Self {
            mv,
            actor,
            parent,
            children: Vec::new(),
            expanded: false,
            terminal: false,
            weight: 1.0,
            visits: 0,
            scores: vec![0.0; players],
            optimistic: vec![1.0; players],
            pessimistic: vec![0.0; players],
            pruned: false,
        }
    }

    /// The move leading here; `None` only at the root.
    pub fn incoming_move(&self) -> Option<&M> {
        self.mv.as_ref()
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    pub fn visits(&self) -> u64 {
        self.visits
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn optimistic(&self) -> &[f64] {
        &self.optimistic
    }

    pub fn pessimistic(&self) -> &[f64] {
        &self.pessimistic
    }

    /// Average score of `player` over the simulations through this node.
    pub fn mean(&self, player: usize) -> f64 {
        if self.visits == 0 {
            return 0.0;
        }
        self.scores.get(player).copied().unwrap_or(0.0) / self.visits as f64
    }
}

#[derive(Debug, Clone)]
pub struct SearchTree<M> {
    nodes: Vec<Node<M>>,
    players: usize,
}

impl<M: Clone> SearchTree<M> {
    pub fn new(root_actor: Actor, players: usize) -> Self {
        Self {
            nodes: vec![Node::new(None, root_actor, None, players)],
            players,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &Node<M> {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds one unvisited child per legal move of `board`.
    ///
    /// Each child's actor comes from applying its move to a throwaway copy.
    /// Children that end the game get exact score bounds right away.
    pub fn expand<B>(&mut self, id: NodeId, board: &B)
    where
        B: Board<Move = M>,
    {
        if self.nodes[id.0].expanded {
            return;
        }
        let moves = board.legal_moves(CallLocation::TreePolicy);
        let weights = match board.current_actor() {
            Actor::Chance => board.move_weights(),
            Actor::Player(_) => Vec::new(),
        };

        let mut children = Vec::with_capacity(moves.len());
        for (index, mv) in moves.into_iter().enumerate() {
            let mut probe = board.duplicate();
            probe.apply_move(&mv);
            let mut child = Node::new(Some(mv), probe.current_actor(), Some(id), self.players);
            child.weight = weights.get(index).copied().unwrap_or(1.0);
            if probe.is_terminal() {
                let exact = probe.score_vector();
                child.terminal = true;
                child.optimistic = exact.clone();
                child.pessimistic = exact;
            }
            children.push(NodeId(self.nodes.len()));
            self.nodes.push(child);
        }

        let node = &mut self.nodes[id.0];
        node.children = children;
        node.expanded = true;
    }

    /// Children that have never been simulated and are not pruned.
    pub fn unvisited_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|child| {
                let node = &self.nodes[child.0];
                node.visits == 0 && !node.pruned
            })
            .collect()
    }

    pub fn random_unvisited(&self, id: NodeId, rng: &mut SearchRng) -> Option<NodeId> {
        let unvisited = self.unvisited_children(id);
        if unvisited.is_empty() {
            None
        } else {
            Some(unvisited[rng.gen_range(0..unvisited.len())])
        }
    }

    /// Selection score of `child` as seen by the actor of `parent`.
    pub fn ucb(&self, parent: NodeId, child: NodeId, config: &SearchConfig) -> f64 {
        let parent = &self.nodes[parent.0];
        let node = &self.nodes[child.0];
        if node.visits == 0 {
            return f64::INFINITY;
        }
        let player = match parent.actor {
            Actor::Player(player) => player,
            Actor::Chance => return node.weight,
        };

        let exploitation = node.mean(player);
        let exploration = config.exploration_constant
            * (((parent.visits + 1) as f64).ln() / node.visits as f64).sqrt();
        let mut score = exploitation + exploration;
        if config.score_bounds {
            score += config.optimistic_bias * node.optimistic[player]
                + config.pessimistic_bias * node.pessimistic[player];
        }
        score
    }

    /// Highest-UCB child of a player node, `bonus` added per move. Ties are
    /// broken uniformly at random.
    pub fn select_child<F>(
        &self,
        id: NodeId,
        config: &SearchConfig,
        bonus: F,
        rng: &mut SearchRng,
    ) -> Option<NodeId>
    where
        F: Fn(&M) -> f64,
    {
        let mut best = f64::NEG_INFINITY;
        let mut tied: Vec<NodeId> = Vec::new();
        for &child in &self.nodes[id.0].children {
            let node = &self.nodes[child.0];
            if node.pruned {
                continue;
            }
            let extra = node.mv.as_ref().map_or(0.0, &bonus);
            let score = self.ucb(id, child, config) + extra;
            if score > best {
                best = score;
                tied.clear();
                tied.push(child);
            } else if score == best {
                tied.push(child);
            }
        }
        match tied.len() {
            0 => None,
            1 => Some(tied[0]),
            n => Some(tied[rng.gen_range(0..n)]),
        }
    }

    /// Draws the successor of a chance node according to the move weights.
    pub fn chance_child(&self, id: NodeId, rng: &mut SearchRng) -> Option<NodeId> {
        let children = &self.nodes[id.0].children;
        if children.is_empty() {
            return None;
        }
        let weights: Vec<f64> = children.iter().map(|c| self.nodes[c.0].weight).collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => Some(children[dist.sample(rng)]),
            Err(_) => Some(children[rng.gen_range(0..children.len())]),
        }
    }

    /// Adds one simulation result to `leaf` and every ancestor.
    pub fn backpropagate(&mut self, leaf: NodeId, scores: &[f64]) {
        let mut cursor = Some(leaf);
        while let Some(id) = cursor {
            let node = &mut self.nodes[id.0];
            node.visits += 1;
            for (total, score) in node.scores.iter_mut().zip(scores) {
                *total += score;
            }
            cursor = node.parent;
        }
    }

    /// Tightens bounds from `leaf`'s parent up to the root and prunes
    /// dominated children on the way.
    ///
    /// The mover's bounds at a player node are the best over its children.
    /// Everybody else, and every player at a chance node, gets the widest
    /// bracket over the children. A child is pruned when a sibling's
    /// pessimistic bound for the mover strictly exceeds the child's optimistic
    /// bound, so the best child always survives.
    pub fn propagate_bounds(&mut self, leaf: NodeId) {
        let mut cursor = self.nodes[leaf.0].parent;
        while let Some(id) = cursor {
            self.refresh_bounds(id);
            if let Actor::Player(player) = self.nodes[id.0].actor {
                self.prune_dominated(id, player);
            }
            cursor = self.nodes[id.0].parent;
        }
    }

    fn refresh_bounds(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];
        if !node.expanded || node.children.is_empty() {
            return;
        }
        let mover = match node.actor {
            Actor::Player(player) => Some(player),
            Actor::Chance => None,
        };

        let mut optimistic = vec![f64::NEG_INFINITY; self.players];
        let mut pessimistic_min = vec![f64::INFINITY; self.players];
        let mut pessimistic_max = vec![f64::NEG_INFINITY; self.players];
        for child in &node.children {
            let child = &self.nodes[child.0];
            for p in 0..self.players {
                optimistic[p] = optimistic[p].max(child.optimistic[p]);
                pessimistic_min[p] = pessimistic_min[p].min(child.pessimistic[p]);
                pessimistic_max[p] = pessimistic_max[p].max(child.pessimistic[p]);
            }
        }

        let mut pessimistic = pessimistic_min;
        if let Some(player) = mover {
            pessimistic[player] = pessimistic_max[player];
        }
        let node = &mut self.nodes[id.0];
        node.optimistic = optimistic;
        node.pessimistic = pessimistic;
    }

    fn prune_dominated(&mut self, id: NodeId, player: usize) {
        let children = self.nodes[id.0].children.clone();
        let bounds: Vec<(f64, f64)> = children
            .iter()
            .map(|c| {
                let node = &self.nodes[c.0];
                (node.optimistic[player], node.pessimistic[player])
            })
            .collect();
        for (index, child) in children.iter().enumerate() {
            let (optimistic, _) = bounds[index];
            let dominated = bounds
                .iter()
                .enumerate()
                .any(|(other, (_, pessimistic))| other != index && *pessimistic > optimistic);
            if dominated {
                self.nodes[child.0].pruned = true;
            }
        }
    }

    /// The child a finished search recommends, or `None` if no child was
    /// ever simulated.
    pub fn final_child(&self, id: NodeId, config: &SearchConfig) -> Option<NodeId> {
        let node = &self.nodes[id.0];
        let player = match node.actor {
            Actor::Player(player) => player,
            Actor::Chance => 0,
        };
        let candidates = node.children.iter().copied().filter(|c| {
            let child = &self.nodes[c.0];
            child.visits > 0 && !child.pruned
        });

        let mut best: Option<(NodeId, f64, f64)> = None;
        for child in candidates {
            let visited = &self.nodes[child.0];
            let mut value = visited.mean(player);
            if config.score_bounds {
                value += config.optimistic_bias * visited.optimistic[player]
                    + config.pessimistic_bias * visited.pessimistic[player];
            }
            let (primary, secondary) = match config.final_selection {
                FinalSelection::RobustChild => (visited.visits as f64, value),
                FinalSelection::MaxChild => (value, visited.visits as f64),
            };
            let better = match best {
                None => true,
                Some((_, p, s)) => primary > p || (primary == p && secondary > s),
            };
            if better {
                best = Some((child, primary, secondary));
            }
        }
        best.map(|(child, _, _)| child)
    }
}
