use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::body::BodyHandle;
use crate::dynamics::constraint::ConstraintHandle;
use crate::utils::allocator::Pool;

pub const INVALID_ISLAND: u32 = u32::MAX;
/// Static bodies can sit in many islands at once (one ground plane under
/// several stacks), so they share this sentinel instead of an island key.
pub const STATIC_NODE: u32 = INVALID_ISLAND - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepState {
    /// Moving, and has been for more than one step.
    Active,
    /// Just woke up or just changed shape; consumers get one edge frame.
    #[default]
    Awake,
    /// Just fell asleep; consumers get one edge frame.
    Asleep,
    /// Asleep and no longer reported.
    Inactive,
}

#[derive(Debug)]
struct Island {
    root: u32,
    /// Non-static member count.
    size: u32,
    inactive_time: f32,
    sleep_state: SleepState,
}

impl Island {
    fn new(root: u32) -> Self {
        Self {
            root,
            size: 0,
            inactive_time: 0.0,
            sleep_state: SleepState::Awake,
        }
    }

    fn set_inactive(&mut self, dt: f32, time_to_sleep: f32) {
        match self.sleep_state {
            SleepState::Active | SleepState::Awake => {
                self.inactive_time += dt;
                // Awake was the edge state; settle into Active first
                self.sleep_state = SleepState::Active;
                if self.inactive_time > time_to_sleep {
                    self.sleep_state = SleepState::Asleep;
                }
            }
            SleepState::Asleep => self.sleep_state = SleepState::Inactive,
            SleepState::Inactive => {}
        }
    }

    fn set_active(&mut self, clear_awake: bool) {
        match self.sleep_state {
            SleepState::Asleep | SleepState::Inactive => self.sleep_state = SleepState::Awake,
            SleepState::Awake => {
                if clear_awake {
                    self.sleep_state = SleepState::Active;
                }
            }
            SleepState::Active => {
                // A graph change happened that members should hear about
                if !clear_awake {
                    self.sleep_state = SleepState::Awake;
                }
            }
        }
        self.inactive_time = 0.0;
    }
}

#[derive(Debug)]
struct IslandNode {
    island: u32,
    edges: Vec<u32>,
}

#[derive(Debug)]
struct IslandEdge {
    from: u32,
    to: u32,
    constraint: ConstraintHandle,
}

impl IslandEdge {
    fn other(&self, node: u32) -> u32 {
        if self.from == node {
            self.to
        } else {
            self.from
        }
    }
}

/// Constraints of one island, gathered for the solver.
#[derive(Debug, Default)]
pub struct IslandContents {
    pub island_key: u32,
    pub sleep_state: SleepState,
    pub constraints: Vec<ConstraintHandle>,
}

impl IslandContents {
    pub fn clear(&mut self) {
        self.island_key = INVALID_ISLAND;
        self.constraints.clear();
    }
}

/// Incremental constraint graph partitioned into connected components.
/// Nodes are bodies, edges are constraints; islands are created, merged,
/// and split as edges come and go.
pub struct IslandGraph {
    nodes: Pool<IslandNode>,
    edges: Pool<IslandEdge>,
    islands: Pool<Island>,
    object_to_node: HashMap<BodyHandle, u32>,
    constraint_to_edge: HashMap<ConstraintHandle, u32>,
    island_keys: Vec<u32>,
    island_keys_dirty: bool,
    traversed_nodes: HashSet<u32>,
    traversed_edges: HashSet<u32>,
    to_process: VecDeque<u32>,
    gathered: Vec<u32>,
    time_to_sleep: f32,
}

impl IslandGraph {
    pub fn new(time_to_sleep: f32) -> Self {
        Self {
            nodes: Pool::new(),
            edges: Pool::new(),
            islands: Pool::new(),
            object_to_node: HashMap::new(),
            constraint_to_edge: HashMap::new(),
            island_keys: Vec::new(),
            island_keys_dirty: true,
            traversed_nodes: HashSet::new(),
            traversed_edges: HashSet::new(),
            to_process: VecDeque::new(),
            gathered: Vec::new(),
            time_to_sleep,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.islands.clear();
        self.object_to_node.clear();
        self.constraint_to_edge.clear();
        self.island_keys.clear();
        self.island_keys_dirty = true;
    }

    pub fn add(
        &mut self,
        constraint: ConstraintHandle,
        body_a: BodyHandle,
        body_b: BodyHandle,
        a_static: bool,
        b_static: bool,
    ) {
        let index_a = self.get_node(body_a, a_static);
        let index_b = self.get_node(body_b, b_static);

        let a_island = self.node(index_a).island;
        let b_island = self.node(index_b).island;
        // An island of nothing but static objects would never move
        if a_island == STATIC_NODE && b_island == STATIC_NODE {
            return;
        }

        debug_assert!(
            !self.constraint_to_edge.contains_key(&constraint),
            "duplicate constraint addition"
        );
        let edge_index = self.get_edge(constraint);
        {
            let edge = self.edge_mut(edge_index);
            edge.from = index_a;
            edge.to = index_b;
        }

        let islandless =
            |island: u32| -> bool { island == INVALID_ISLAND || island == STATIC_NODE };

        if islandless(a_island) && islandless(b_island) {
            self.create_new_island(index_a, index_b, edge_index);
        } else if a_island == b_island {
            self.node_mut(index_a).edges.push(edge_index);
            self.node_mut(index_b).edges.push(edge_index);
        } else if islandless(a_island) {
            self.add_to_island(index_b, index_a, edge_index);
        } else if islandless(b_island) {
            self.add_to_island(index_a, index_b, edge_index);
        } else {
            self.merge_islands(index_a, index_b, edge_index);
        }

        // Something touched a potentially sleeping island; wake it.
        // Islands may have been renumbered above, so re-read the nodes
        let wake_island = match self.node(index_a).island {
            STATIC_NODE => self.node(index_b).island,
            island => island,
        };
        if let Some(island) = self.islands.get_mut(wake_island) {
            island.set_active(false);
        }
    }

    pub fn remove_constraint(&mut self, constraint: ConstraintHandle) {
        let Some(&edge_index) = self.constraint_to_edge.get(&constraint) else {
            return;
        };
        let (index_a, index_b) = {
            let edge = self.edge(edge_index);
            (edge.from, edge.to)
        };

        self.remove_edge(edge_index);
        let a_edges = self.node(index_a).edges.len();
        let b_edges = self.node(index_b).edges.len();

        // The bottom of a stack may just have been pulled out; wake everyone
        let wake_island = match self.node(index_a).island {
            STATIC_NODE => self.node(index_b).island,
            island => island,
        };
        if let Some(island) = self.islands.get_mut(wake_island) {
            island.set_active(false);
        }

        if a_edges == 0 && b_edges == 0 {
            self.remove_island(index_a, index_b);
        } else if a_edges == 0 {
            self.remove_island_leaf(index_b, index_a);
        } else if b_edges == 0 {
            self.remove_island_leaf(index_a, index_b);
        } else {
            self.split_island(index_a, index_b);
        }
    }

    /// Remove a body and every constraint touching it. Returns the removed
    /// constraint handles so the caller can free them.
    pub fn remove_body(&mut self, body: BodyHandle) -> Vec<ConstraintHandle> {
        let Some(&node_index) = self.object_to_node.get(&body) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        if self.node(node_index).island == STATIC_NODE {
            // Static nodes carry no adjacency, so scan the edge list
            let touching: Vec<ConstraintHandle> = self
                .edges
                .keys()
                .filter(|&key| {
                    let edge = self.edge(key);
                    edge.from == node_index || edge.to == node_index
                })
                .map(|key| self.edge(key).constraint)
                .collect();
            for constraint in touching {
                self.remove_constraint(constraint);
                removed.push(constraint);
            }
        } else {
            while let Some(&edge_index) = self.node(node_index).edges.first() {
                let constraint = self.edge(edge_index).constraint;
                self.remove_constraint(constraint);
                removed.push(constraint);
            }
        }

        self.object_to_node.remove(&body);
        self.nodes.remove(node_index);
        removed
    }

    pub fn island_count(&mut self) -> usize {
        self.island_keys().len()
    }

    /// Collect the island's constraints by walking from its root. Inactive
    /// islands stay empty unless `fill_inactive` asks for them.
    pub fn get_island(&mut self, index: usize, result: &mut IslandContents, fill_inactive: bool) {
        let island_key = self.island_keys()[index];
        let island = self.islands.get(island_key).expect("live island");
        let root = island.root;
        let sleep_state = island.sleep_state;

        result.clear();
        result.island_key = island_key;
        result.sleep_state = sleep_state;
        if !fill_inactive && sleep_state == SleepState::Inactive {
            return;
        }

        self.clear_traversed();
        self.to_process.push_back(root);
        while let Some(node_index) = self.pop_to_process() {
            if !self.traversed_nodes.insert(node_index) {
                continue;
            }
            let node = self.node(node_index);
            if node.island == STATIC_NODE {
                continue;
            }
            for i in 0..node.edges.len() {
                let edge_index = self.node(node_index).edges[i];
                if !self.traversed_edges.insert(edge_index) {
                    continue;
                }
                let edge = self.edge(edge_index);
                result.constraints.push(edge.constraint);
                self.to_process.push_back(edge.other(node_index));
            }
        }
    }

    pub fn update_island_state(&mut self, island_key: u32, state: SleepState, dt: f32) {
        debug_assert!(
            matches!(state, SleepState::Active | SleepState::Inactive),
            "solver reports only Active or Inactive"
        );
        let time_to_sleep = self.time_to_sleep;
        if let Some(island) = self.islands.get_mut(island_key) {
            if state == SleepState::Active {
                island.set_active(true);
            } else {
                island.set_inactive(dt, time_to_sleep);
            }
        }
    }

    /// Wake whatever islands contain this body.
    pub fn wake_island(&mut self, body: BodyHandle) {
        let Some(&node_index) = self.object_to_node.get(&body) else {
            return;
        };
        match self.node(node_index).island {
            INVALID_ISLAND => {}
            STATIC_NODE => self.wake_islands_with_static_node(node_index),
            island => {
                if let Some(island) = self.islands.get_mut(island) {
                    island.set_active(false);
                }
            }
        }
    }

    pub fn sleep_state(&self, body: BodyHandle) -> Option<SleepState> {
        let node_index = *self.object_to_node.get(&body)?;
        let island_key = self.node(node_index).island;
        self.islands.get(island_key).map(|island| island.sleep_state)
    }

    fn wake_islands_with_static_node(&mut self, static_index: u32) {
        // There is no index from static nodes to their islands; walk each
        // island instead. Rare enough not to matter
        let keys = self.island_keys().to_vec();
        for island_key in keys {
            let root = self.islands.get(island_key).expect("live island").root;
            self.gather_nodes(root);
            if self.gathered.contains(&static_index) {
                if let Some(island) = self.islands.get_mut(island_key) {
                    island.set_active(false);
                }
            }
        }
    }

    fn create_new_island(&mut self, a: u32, b: u32, edge: u32) {
        self.island_keys_dirty = true;

        // Statics cannot root an island; they cannot both be static here
        let root = if self.node(a).island == STATIC_NODE { b } else { a };
        let island_key = self.islands.insert(Island::new(root));
        debug_assert!(island_key != INVALID_ISLAND && island_key != STATIC_NODE);

        self.island_add(island_key, a);
        self.island_add(island_key, b);
        self.link_edge(a, b, edge);
    }

    fn add_to_island(&mut self, has_island: u32, to_add: u32, edge: u32) {
        let island_key = self.node(has_island).island;
        self.island_add(island_key, to_add);
        self.link_edge(has_island, to_add, edge);
    }

    fn merge_islands(&mut self, a: u32, b: u32, edge: u32) {
        let mut from = a;
        let mut to = b;
        // Relabel the smaller island
        if self.island_from_node(a).size > self.island_from_node(b).size {
            std::mem::swap(&mut from, &mut to);
        }

        let from_island = self.node(from).island;
        let to_island_key = self.node(to).island;
        self.islands.remove(from_island);
        self.island_keys_dirty = true;

        self.clear_traversed();
        self.to_process.push_back(from);
        while let Some(node_index) = self.pop_to_process() {
            // Static nodes repeat to reference count their edges; skip dupes
            if !self.traversed_nodes.insert(node_index) {
                continue;
            }
            if self.node(node_index).island == STATIC_NODE {
                continue;
            }

            self.island_add(to_island_key, node_index);

            for i in 0..self.node(node_index).edges.len() {
                let edge_index = self.node(node_index).edges[i];
                if !self.traversed_edges.insert(edge_index) {
                    continue;
                }
                let other = self.edge(edge_index).other(node_index);
                self.to_process.push_back(other);
            }
        }

        self.link_edge(from, to, edge);
    }

    fn remove_island_leaf(&mut self, in_island: u32, leaf: u32) {
        let island_key = self.node(in_island).island;
        let root = self.islands.get(island_key).expect("live island").root;
        if root == leaf {
            let new_root = self.find_new_root(in_island);
            self.islands.get_mut(island_key).expect("live island").root = new_root;
        }
        self.island_remove(island_key, leaf);
    }

    fn split_island(&mut self, a: u32, b: u32) {
        let island_key = self.node(a).island;
        let root = self.islands.get(island_key).expect("live island").root;

        let static_nodes = self.gather_nodes(root);
        let size = self.islands.get(island_key).expect("live island").size;

        // Everything still reachable from the root means no split happened.
        // The island tracks non-static nodes only, so add the statics back
        if self.traversed_nodes.len() == size as usize + static_nodes {
            return;
        }

        // The unreached side becomes the new island
        let other_side = if self.traversed_nodes.contains(&a) { b } else { a };
        self.gather_nodes(other_side);

        let first = self.gathered[0];
        let new_root = self.find_new_root(first);
        let new_island_key = self.islands.insert(Island::new(new_root));

        let gathered = std::mem::take(&mut self.gathered);
        for &node_index in &gathered {
            self.island_remove(island_key, node_index);
            self.island_add(new_island_key, node_index);
        }
        self.gathered = gathered;

        self.island_keys_dirty = true;
    }

    fn remove_island(&mut self, a: u32, b: u32) {
        // Statics do not know their island; they cannot both be static
        let island_key = match self.node(a).island {
            STATIC_NODE => self.node(b).island,
            island => island,
        };
        self.island_remove(island_key, a);
        self.island_remove(island_key, b);
        debug_assert_eq!(
            self.islands.get(island_key).map(|island| island.size),
            Some(0),
            "removed island that was not empty"
        );
        self.islands.remove(island_key);
        self.island_keys_dirty = true;
    }

    /// Walk every node reachable from `start`, filling `self.gathered`.
    /// Returns how many reachable nodes were static.
    fn gather_nodes(&mut self, start: u32) -> usize {
        self.gathered.clear();
        self.clear_traversed();

        let mut static_nodes = 0;
        self.to_process.push_back(start);
        while let Some(node_index) = self.pop_to_process() {
            if !self.traversed_nodes.insert(node_index) {
                continue;
            }
            self.gathered.push(node_index);

            if self.node(node_index).island == STATIC_NODE {
                static_nodes += 1;
                continue;
            }

            for i in 0..self.node(node_index).edges.len() {
                let edge_index = self.node(node_index).edges[i];
                if !self.traversed_edges.insert(edge_index) {
                    continue;
                }
                let other = self.edge(edge_index).other(node_index);
                self.to_process.push_back(other);
            }
        }
        static_nodes
    }

    fn find_new_root(&self, from: u32) -> u32 {
        let node = self.node(from);
        if node.island != STATIC_NODE {
            return from;
        }
        // Statics cannot be roots; one hop suffices because static-static
        // edges do not exist
        for &edge_index in &node.edges {
            let other = self.edge(edge_index).other(from);
            if self.node(other).island != STATIC_NODE {
                return other;
            }
        }
        from
    }

    fn island_add(&mut self, island_key: u32, node_index: u32) {
        let node = self.nodes.get_mut(node_index).expect("live node");
        if node.island != STATIC_NODE {
            node.island = island_key;
            self.islands.get_mut(island_key).expect("live island").size += 1;
        }
    }

    fn island_remove(&mut self, island_key: u32, node_index: u32) {
        let node = self.nodes.get_mut(node_index).expect("live node");
        if node.island != STATIC_NODE {
            debug_assert!(node.island != INVALID_ISLAND, "node was not in an island");
            node.island = INVALID_ISLAND;
            if let Some(island) = self.islands.get_mut(island_key) {
                island.size -= 1;
            }
        }
    }

    fn link_edge(&mut self, a: u32, b: u32, edge: u32) {
        // Statics skip adjacency upkeep; a ground plane would accumulate an
        // edge per resting object
        if self.node(a).island != STATIC_NODE {
            self.node_mut(a).edges.push(edge);
        }
        if self.node(b).island != STATIC_NODE {
            self.node_mut(b).edges.push(edge);
        }
    }

    fn remove_edge(&mut self, edge_index: u32) {
        let (from, to, constraint) = {
            let edge = self.edge(edge_index);
            (edge.from, edge.to, edge.constraint)
        };
        for node_index in [from, to] {
            let node = self.node_mut(node_index);
            if let Some(position) = node.edges.iter().position(|&e| e == edge_index) {
                node.edges.swap_remove(position);
            }
        }
        self.constraint_to_edge.remove(&constraint);
        self.edges.remove(edge_index);
    }

    fn get_node(&mut self, body: BodyHandle, is_static: bool) -> u32 {
        if let Some(&index) = self.object_to_node.get(&body) {
            return index;
        }
        let index = self.nodes.insert(IslandNode {
            island: if is_static { STATIC_NODE } else { INVALID_ISLAND },
            edges: Vec::new(),
        });
        self.object_to_node.insert(body, index);
        index
    }

    fn get_edge(&mut self, constraint: ConstraintHandle) -> u32 {
        if let Some(&index) = self.constraint_to_edge.get(&constraint) {
            return index;
        }
        let index = self.edges.insert(IslandEdge {
            from: INVALID_ISLAND,
            to: INVALID_ISLAND,
            constraint,
        });
        self.constraint_to_edge.insert(constraint, index);
        index
    }

    fn island_from_node(&self, node_index: u32) -> &Island {
        self.islands
            .get(self.node(node_index).island)
            .expect("node belongs to a live island")
    }

    fn island_keys(&mut self) -> &[u32] {
        if self.island_keys_dirty {
            self.island_keys = self.islands.keys().collect();
            self.island_keys_dirty = false;
        }
        &self.island_keys
    }

    fn node(&self, index: u32) -> &IslandNode {
        self.nodes.get(index).expect("live node")
    }

    fn node_mut(&mut self, index: u32) -> &mut IslandNode {
        self.nodes.get_mut(index).expect("live node")
    }

    fn edge(&self, index: u32) -> &IslandEdge {
        self.edges.get(index).expect("live edge")
    }

    fn edge_mut(&mut self, index: u32) -> &mut IslandEdge {
        self.edges.get_mut(index).expect("live edge")
    }

    fn clear_traversed(&mut self) {
        self.traversed_nodes.clear();
        self.traversed_edges.clear();
        self.to_process.clear();
    }

    fn pop_to_process(&mut self) -> Option<u32> {
        self.to_process.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::allocator::EntityId;

    fn body(index: usize) -> BodyHandle {
        EntityId::new(index, 0)
    }

    fn graph() -> IslandGraph {
        IslandGraph::new(0.5)
    }

    fn island_of(graph: &mut IslandGraph, constraints: &mut Vec<Vec<ConstraintHandle>>) {
        constraints.clear();
        for i in 0..graph.island_count() {
            let mut contents = IslandContents::default();
            graph.get_island(i, &mut contents, true);
            let mut list = contents.constraints;
            list.sort_unstable();
            constraints.push(list);
        }
    }

    #[test]
    fn chain_forms_one_island_and_splits_in_the_middle() {
        let mut g = graph();
        // a-b-c-d
        g.add(1, body(0), body(1), false, false);
        g.add(2, body(1), body(2), false, false);
        g.add(3, body(2), body(3), false, false);
        assert_eq!(g.island_count(), 1);

        g.remove_constraint(2);
        assert_eq!(g.island_count(), 2);

        let mut islands = Vec::new();
        island_of(&mut g, &mut islands);
        islands.sort();
        assert_eq!(islands, vec![vec![1], vec![3]]);

        // Both sides woke from the mutation
        for i in 0..2 {
            let mut contents = IslandContents::default();
            g.get_island(i, &mut contents, true);
            let state = g.islands.get(contents.island_key).expect("live").sleep_state;
            assert_eq!(state, SleepState::Awake);
        }
    }

    #[test]
    fn merging_absorbs_the_smaller_island() {
        let mut g = graph();
        g.add(1, body(0), body(1), false, false);
        g.add(2, body(2), body(3), false, false);
        g.add(3, body(3), body(4), false, false);
        assert_eq!(g.island_count(), 2);

        g.add(4, body(1), body(2), false, false);
        assert_eq!(g.island_count(), 1);

        let mut contents = IslandContents::default();
        g.get_island(0, &mut contents, true);
        let mut constraints = contents.constraints;
        constraints.sort_unstable();
        assert_eq!(constraints, vec![1, 2, 3, 4]);
    }

    #[test]
    fn static_bodies_join_multiple_islands() {
        let mut g = graph();
        // Two dynamic stacks on one static ground
        g.add(1, body(0), body(10), false, true);
        g.add(2, body(1), body(10), false, true);
        assert_eq!(g.island_count(), 2);

        // Waking through the static body wakes both islands
        let mut contents = IslandContents::default();
        for i in 0..2 {
            g.get_island(i, &mut contents, true);
            g.update_island_state(contents.island_key, SleepState::Inactive, 1.0);
            g.update_island_state(contents.island_key, SleepState::Inactive, 1.0);
        }
        g.wake_island(body(10));
        for i in 0..2 {
            g.get_island(i, &mut contents, true);
            let state = g.islands.get(contents.island_key).expect("live").sleep_state;
            assert_eq!(state, SleepState::Awake);
        }
    }

    #[test]
    fn static_static_pairs_are_rejected() {
        let mut g = graph();
        g.add(1, body(0), body(1), true, true);
        assert_eq!(g.island_count(), 0);
    }

    #[test]
    fn sleep_machine_walks_through_all_states() {
        let mut g = graph();
        g.add(1, body(0), body(1), false, false);
        let mut contents = IslandContents::default();
        g.get_island(0, &mut contents, true);
        let key = contents.island_key;

        let state = |g: &IslandGraph| g.islands.get(key).expect("live").sleep_state;
        assert_eq!(state(&g), SleepState::Awake);

        // First inactive report settles Awake into Active
        g.update_island_state(key, SleepState::Inactive, 0.3);
        assert_eq!(state(&g), SleepState::Active);
        // Accumulated past time_to_sleep
        g.update_island_state(key, SleepState::Inactive, 0.3);
        assert_eq!(state(&g), SleepState::Asleep);
        g.update_island_state(key, SleepState::Inactive, 0.3);
        assert_eq!(state(&g), SleepState::Inactive);
        g.update_island_state(key, SleepState::Inactive, 0.3);
        assert_eq!(state(&g), SleepState::Inactive);

        // Activity wakes it back up through the edge state
        g.update_island_state(key, SleepState::Active, 0.3);
        assert_eq!(state(&g), SleepState::Awake);
        g.update_island_state(key, SleepState::Active, 0.3);
        assert_eq!(state(&g), SleepState::Active);
    }

    #[test]
    fn removing_a_body_removes_every_touching_constraint() {
        let mut g = graph();
        g.add(1, body(0), body(1), false, false);
        g.add(2, body(1), body(2), false, false);

        let mut removed = g.remove_body(body(1));
        removed.sort_unstable();
        assert_eq!(removed, vec![1, 2]);
        assert_eq!(g.island_count(), 0);
    }

    #[test]
    fn leaf_removal_keeps_the_island_intact() {
        let mut g = graph();
        g.add(1, body(0), body(1), false, false);
        g.add(2, body(1), body(2), false, false);
        g.remove_constraint(2);
        assert_eq!(g.island_count(), 1);

        let mut contents = IslandContents::default();
        g.get_island(0, &mut contents, true);
        assert_eq!(contents.constraints, vec![1]);
    }
}
