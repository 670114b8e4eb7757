use std::collections::{HashSet, VecDeque};

use glam::Vec3;

use crate::collision::aabb::Aabb;

/// Index of a node in the tree's pool. Stable until the node is removed.
pub type NodeHandle = u32;
pub const NULL_NODE: NodeHandle = u32::MAX;

#[derive(Debug, Clone, Copy)]
enum NodePayload<T> {
    Leaf { data: T },
    Internal { left: NodeHandle, right: NodeHandle },
}

#[derive(Debug, Clone, Copy)]
struct Node<T> {
    parent: NodeHandle,
    height: i32,
    aabb: Aabb,
    payload: NodePayload<T>,
}

impl<T: Copy> Node<T> {
    fn is_leaf(&self) -> bool {
        matches!(self.payload, NodePayload::Leaf { .. })
    }

    fn data(&self) -> T {
        match self.payload {
            NodePayload::Leaf { data } => data,
            NodePayload::Internal { .. } => unreachable!("internal node has no userdata"),
        }
    }

    fn children(&self) -> (NodeHandle, NodeHandle) {
        match self.payload {
            NodePayload::Internal { left, right } => (left, right),
            NodePayload::Leaf { .. } => unreachable!("leaf node has no children"),
        }
    }
}

/// Reusable query buffers, owned by the caller so queries allocate only on
/// first use.
pub struct TreeContext<T> {
    pub pair_results: Vec<(T, T)>,
    pub results: Vec<T>,
    eval: Vec<(NodeHandle, NodeHandle)>,
    traversed: HashSet<NodeHandle>,
    queue: VecDeque<NodeHandle>,
}

impl<T> Default for TreeContext<T> {
    fn default() -> Self {
        Self {
            pair_results: Vec::new(),
            results: Vec::new(),
            eval: Vec::new(),
            traversed: HashSet::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<T> TreeContext<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Dynamic AABB tree over padded volumes. Supports pairwise overlap, ray
/// segment, and volume queries.
#[derive(Debug)]
pub struct AabbTree<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<NodeHandle>,
    root: NodeHandle,
    padding: f32,
}

impl<T: Copy> Default for AabbTree<T> {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<T: Copy> AabbTree<T> {
    pub fn new(padding: f32) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NULL_NODE,
            padding,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = NULL_NODE;
    }

    pub fn is_empty(&self) -> bool {
        self.root == NULL_NODE
    }

    /// Height of the root, -1 when empty. Leaves have height 0.
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            -1
        } else {
            self.node(self.root).height
        }
    }

    pub fn insert(&mut self, aabb: Aabb, data: T) -> NodeHandle {
        let mut padded = aabb;
        padded.pad(self.padding);
        let new_index = self.alloc(Node {
            parent: NULL_NODE,
            height: 0,
            aabb: padded,
            payload: NodePayload::Leaf { data },
        });
        self.insert_node(new_index);
        new_index
    }

    /// Removes a leaf and repairs the tree. A stale or null handle is a no-op.
    pub fn remove(&mut self, handle: NodeHandle) {
        if handle == NULL_NODE || self.nodes.get(handle as usize).map_or(true, Option::is_none) {
            return;
        }
        let parent = self.node(handle).parent;
        self.dealloc(handle);

        if parent == NULL_NODE {
            self.root = NULL_NODE;
            return;
        }

        let grand_parent = self.node(parent).parent;
        let (left, right) = self.node(parent).children();
        let sibling = if left == handle { right } else { left };

        self.node_mut(sibling).parent = grand_parent;
        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.dealloc(parent);
            return;
        }
        self.replace_child(grand_parent, parent, sibling);
        self.dealloc(parent);
        self.sync_parents(grand_parent);
    }

    /// Refit: keeps the handle when the new volume still fits inside the
    /// stored padded volume, otherwise reinserts and returns the new handle.
    pub fn update(&mut self, aabb: Aabb, handle: NodeHandle) -> NodeHandle {
        let node = match self
            .nodes
            .get(handle as usize)
            .and_then(|slot| slot.as_ref())
        {
            Some(node) => node,
            None => return handle,
        };
        if node.aabb.contains(&aabb) {
            return handle;
        }
        let data = node.data();
        self.remove(handle);
        self.insert(aabb, data)
    }

    pub fn get_aabb(&self, handle: NodeHandle) -> Option<&Aabb> {
        self.nodes
            .get(handle as usize)
            .and_then(|slot| slot.as_ref())
            .map(|node| &node.aabb)
    }

    /// All overlapping leaf pairs, written into `context.pair_results`.
    pub fn query_pairs(&self, context: &mut TreeContext<T>) {
        context.pair_results.clear();
        if self.root == NULL_NODE || self.node(self.root).is_leaf() {
            return;
        }

        context.traversed.clear();
        context.eval.clear();
        let (left, right) = self.node(self.root).children();
        self.push_to_eval(left, right, context);

        while let Some((a, b)) = context.eval.pop() {
            let node_a = self.node(a);
            let node_b = self.node(b);
            match (node_a.is_leaf(), node_b.is_leaf()) {
                (true, true) => {
                    if node_a.aabb.overlapping(&node_b.aabb) {
                        context.pair_results.push((node_a.data(), node_b.data()));
                    }
                }
                (true, false) => self.leaf_branch_case(a, b, context),
                (false, true) => self.leaf_branch_case(b, a, context),
                (false, false) => {
                    self.traverse_child(a, context);
                    self.traverse_child(b, context);
                    let (al, ar) = node_a.children();
                    let (bl, br) = node_b.children();
                    self.push_to_eval(al, bl, context);
                    self.push_to_eval(al, br, context);
                    self.push_to_eval(ar, bl, context);
                    self.push_to_eval(ar, br, context);
                }
            }
        }
    }

    /// Leaves whose padded volumes intersect the segment, breadth-first.
    pub fn query_ray(&self, start: Vec3, end: Vec3, context: &mut TreeContext<T>) {
        context.results.clear();
        context.queue.clear();
        if self.root != NULL_NODE {
            context.queue.push_back(self.root);
        }

        while let Some(index) = context.queue.pop_front() {
            let node = self.node(index);
            if node.aabb.line_intersect(start, end).is_some() {
                if node.is_leaf() {
                    context.results.push(node.data());
                } else {
                    let (left, right) = node.children();
                    context.queue.push_back(left);
                    context.queue.push_back(right);
                }
            }
        }
    }

    /// Leaves whose padded volumes overlap `volume`, depth-first.
    pub fn query_volume(&self, volume: &Aabb, context: &mut TreeContext<T>) {
        context.results.clear();
        self.query_volume_helper(self.root, volume, context);
    }

    fn query_volume_helper(&self, index: NodeHandle, volume: &Aabb, context: &mut TreeContext<T>) {
        if index == NULL_NODE {
            return;
        }
        let node = self.node(index);
        if node.aabb.overlapping(volume) {
            if node.is_leaf() {
                context.results.push(node.data());
            } else {
                let (left, right) = node.children();
                self.query_volume_helper(left, volume, context);
                self.query_volume_helper(right, volume, context);
            }
        }
    }

    fn node(&self, index: NodeHandle) -> &Node<T> {
        self.nodes[index as usize].as_ref().expect("live node")
    }

    fn node_mut(&mut self, index: NodeHandle) -> &mut Node<T> {
        self.nodes[index as usize].as_mut().expect("live node")
    }

    fn alloc(&mut self, node: Node<T>) -> NodeHandle {
        if let Some(index) = self.free.pop() {
            self.nodes[index as usize] = Some(node);
            index
        } else {
            self.nodes.push(Some(node));
            (self.nodes.len() - 1) as NodeHandle
        }
    }

    fn dealloc(&mut self, index: NodeHandle) {
        self.nodes[index as usize] = None;
        self.free.push(index);
    }

    fn replace_child(&mut self, parent: NodeHandle, old_child: NodeHandle, new_child: NodeHandle) {
        let node = self.node_mut(parent);
        if let NodePayload::Internal { left, right } = &mut node.payload {
            if *left == old_child {
                *left = new_child;
            } else {
                *right = new_child;
            }
        }
    }

    /// Find the best sibling by surface-area heuristic and splice a new
    /// parent in, then rebalance up to the root.
    fn insert_node(&mut self, new_index: NodeHandle) {
        if self.root == NULL_NODE {
            self.node_mut(new_index).parent = NULL_NODE;
            self.root = new_index;
            return;
        }

        let new_box = self.node(new_index).aabb;
        let mut cur_index = self.root;
        while !self.node(cur_index).is_leaf() {
            let cur_node = self.node(cur_index);
            let (left, right) = cur_node.children();

            let cur_area = cur_node.aabb.surface_area();
            let combined_area = Aabb::combined(&cur_node.aabb, &new_box).surface_area();
            // Minimum cost of pushing the new leaf lower into the tree
            let inheritance_cost = 2.0 * (combined_area - cur_area);
            // Cost of pairing the new leaf with this node instead
            let parent_cost = 2.0 * combined_area;

            let left_cost = self.descend_cost(left, &new_box) + inheritance_cost;
            let right_cost = self.descend_cost(right, &new_box) + inheritance_cost;

            if parent_cost < right_cost && parent_cost < left_cost {
                break;
            }
            cur_index = if right_cost < left_cost { right } else { left };
        }

        let sibling = cur_index;
        let old_parent = self.node(sibling).parent;
        let sibling_aabb = self.node(sibling).aabb;
        let sibling_height = self.node(sibling).height;

        let new_parent = self.alloc(Node {
            parent: old_parent,
            height: sibling_height + 1,
            aabb: Aabb::combined(&sibling_aabb, &new_box),
            payload: NodePayload::Internal {
                left: sibling,
                right: new_index,
            },
        });

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else {
            self.replace_child(old_parent, sibling, new_parent);
        }
        self.node_mut(sibling).parent = new_parent;
        self.node_mut(new_index).parent = new_parent;

        self.sync_parents(new_parent);
    }

    fn descend_cost(&self, child: NodeHandle, insert_box: &Aabb) -> f32 {
        let node = self.node(child);
        let combined_area = Aabb::combined(insert_box, &node.aabb).surface_area();
        if node.is_leaf() {
            combined_area
        } else {
            combined_area - node.aabb.surface_area()
        }
    }

    /// Walks to the root rebalancing and refreshing heights and volumes.
    fn sync_parents(&mut self, mut index: NodeHandle) {
        while index != NULL_NODE {
            if !self.node(index).is_leaf() {
                index = self.balance(index);
                let (left, right) = self.node(index).children();
                let height = 1 + self.node(left).height.max(self.node(right).height);
                let aabb = Aabb::combined(&self.node(left).aabb, &self.node(right).aabb);
                let node = self.node_mut(index);
                node.height = height;
                node.aabb = aabb;
            }
            index = self.node(index).parent;
        }
    }

    fn balance(&mut self, index: NodeHandle) -> NodeHandle {
        let node = self.node(index);
        if node.is_leaf() || node.height < 2 {
            return index;
        }
        let (left, right) = node.children();
        let balance = self.node(right).height - self.node(left).height;
        if (-1..=1).contains(&balance) {
            return index;
        }
        self.rotate(index, balance)
    }

    /// Promote the taller child `b` into `a`'s slot; `b`'s shorter grandchild
    /// takes `b`'s place under `a`.
    fn rotate(&mut self, a_index: NodeHandle, balance: i32) -> NodeHandle {
        let (a_left, a_right) = self.node(a_index).children();
        let (b_index, c_index) = if balance < 0 {
            (a_left, a_right)
        } else {
            (a_right, a_left)
        };

        let (d_index, e_index) = self.node(b_index).children();

        // Promote B into A's position
        let a_parent = self.node(a_index).parent;
        self.node_mut(b_index).parent = a_parent;
        self.node_mut(a_index).parent = b_index;
        if a_parent != NULL_NODE {
            self.replace_child(a_parent, a_index, b_index);
        } else {
            self.root = b_index;
        }

        let d_height = self.node(d_index).height;
        let e_height = self.node(e_index).height;
        // B keeps its taller grandchild, the shorter one moves under A
        let (kept, moved) = if d_height > e_height {
            (d_index, e_index)
        } else {
            (e_index, d_index)
        };

        self.set_children(b_index, a_index, kept);
        if balance < 0 {
            self.set_children(a_index, moved, a_right);
        } else {
            self.set_children(a_index, a_left, moved);
        }
        self.node_mut(moved).parent = a_index;
        self.node_mut(kept).parent = b_index;

        let c_node_aabb = self.node(c_index).aabb;
        let moved_aabb = self.node(moved).aabb;
        let a_aabb = Aabb::combined(&c_node_aabb, &moved_aabb);
        let a_height = 1 + self.node(c_index).height.max(self.node(moved).height);
        {
            let a_node = self.node_mut(a_index);
            a_node.aabb = a_aabb;
            a_node.height = a_height;
        }
        let kept_aabb = self.node(kept).aabb;
        let b_aabb = Aabb::combined(&a_aabb, &kept_aabb);
        let b_height = 1 + a_height.max(self.node(kept).height);
        {
            let b_node = self.node_mut(b_index);
            b_node.aabb = b_aabb;
            b_node.height = b_height;
        }

        b_index
    }

    fn set_children(&mut self, parent: NodeHandle, left: NodeHandle, right: NodeHandle) {
        self.node_mut(parent).payload = NodePayload::Internal { left, right };
    }

    /// Push a candidate pair unless it can be pruned. Sibling pairs are kept
    /// regardless of overlap so their subtrees still get expanded.
    fn push_to_eval(&self, a: NodeHandle, b: NodeHandle, context: &mut TreeContext<T>) {
        let node_a = self.node(a);
        let node_b = self.node(b);
        if node_a.parent != node_b.parent && !node_a.aabb.overlapping(&node_b.aabb) {
            return;
        }
        context.eval.push((a, b));
    }

    /// Expand an internal node against itself exactly once per query.
    fn traverse_child(&self, index: NodeHandle, context: &mut TreeContext<T>) {
        if !context.traversed.insert(index) {
            return;
        }
        let (left, right) = self.node(index).children();
        self.push_to_eval(left, right, context);
    }

    fn leaf_branch_case(&self, leaf: NodeHandle, branch: NodeHandle, context: &mut TreeContext<T>) {
        self.traverse_child(branch, context);
        let (left, right) = self.node(branch).children();
        self.push_to_eval(leaf, left, context);
        self.push_to_eval(leaf, right, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(center: Vec3) -> Aabb {
        Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
    }

    fn brute_force_pairs(boxes: &[(u32, Aabb)]) -> HashSet<(u32, u32)> {
        let mut expected = HashSet::new();
        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                if boxes[i].1.overlapping(&boxes[j].1) {
                    let (a, b) = (boxes[i].0, boxes[j].0);
                    expected.insert((a.min(b), a.max(b)));
                }
            }
        }
        expected
    }

    fn tree_pairs(tree: &AabbTree<u32>, context: &mut TreeContext<u32>) -> HashSet<(u32, u32)> {
        tree.query_pairs(context);
        context
            .pair_results
            .iter()
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect()
    }

    // Deterministic pseudo-random positions, no rng dependency needed
    fn scatter(seed: u64, count: usize) -> Vec<Vec3> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / (1u64 << 31) as f32) * 20.0 - 10.0
        };
        (0..count).map(|_| Vec3::new(next(), next(), next())).collect()
    }

    #[test]
    fn first_insert_becomes_root_and_last_removal_empties() {
        let mut tree = AabbTree::new(0.0);
        let handle = tree.insert(unit_box(Vec3::ZERO), 1u32);
        assert!(!tree.is_empty());
        tree.remove(handle);
        assert!(tree.is_empty());
        // Removing again is a no-op
        tree.remove(handle);
    }

    #[test]
    fn update_with_contained_box_keeps_handle() {
        let mut tree = AabbTree::new(0.1);
        let handle = tree.insert(unit_box(Vec3::ZERO), 1u32);
        let same = tree.update(unit_box(Vec3::ZERO), handle);
        assert_eq!(handle, same);

        let moved = tree.update(unit_box(Vec3::splat(50.0)), handle);
        assert!(tree.get_aabb(moved).is_some());
    }

    #[test]
    fn pair_query_matches_brute_force_through_churn() {
        let mut tree = AabbTree::new(0.05);
        let mut context = TreeContext::new();
        let mut live: Vec<(u32, Aabb)> = Vec::new();
        let mut handles = Vec::new();

        for (i, center) in scatter(7, 100).into_iter().enumerate() {
            let bb = unit_box(center);
            let handle = tree.insert(bb, i as u32);
            // Compare with the padded volume the tree actually stores
            live.push((i as u32, *tree.get_aabb(handle).expect("just inserted")));
            handles.push(handle);
        }
        assert_eq!(tree_pairs(&tree, &mut context), brute_force_pairs(&live));

        // Remove every other volume and re-check
        for i in (0..100).step_by(2) {
            tree.remove(handles[i]);
        }
        live.retain(|(id, _)| id % 2 == 1);
        assert_eq!(tree_pairs(&tree, &mut context), brute_force_pairs(&live));
    }

    #[test]
    fn tree_height_stays_logarithmic() {
        let mut tree = AabbTree::new(0.0);
        let count = 128usize;
        for (i, center) in scatter(11, count).into_iter().enumerate() {
            tree.insert(unit_box(center), i as u32);
        }
        let bound = 2 * (count as f32).log2().ceil() as i32 + 2;
        assert!(
            tree.height() <= bound,
            "height {} exceeded bound {bound}",
            tree.height()
        );
    }

    #[test]
    fn ray_query_returns_every_intersected_leaf() {
        let mut tree = AabbTree::new(0.0);
        for i in 0..10 {
            tree.insert(unit_box(Vec3::new(i as f32 * 3.0, 0.0, 0.0)), i as u32);
        }
        let mut context = TreeContext::new();
        tree.query_ray(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(7.0, 0.0, 0.0), &mut context);
        let mut hits = context.results.clone();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1, 2]);
    }

    #[test]
    fn volume_query_reports_only_overlaps() {
        let mut tree = AabbTree::new(0.0);
        for i in 0..10 {
            tree.insert(unit_box(Vec3::new(i as f32 * 3.0, 0.0, 0.0)), i as u32);
        }
        let mut context = TreeContext::new();
        tree.query_volume(
            &Aabb::new(Vec3::new(2.0, -1.0, -1.0), Vec3::new(7.0, 1.0, 1.0)),
            &mut context,
        );
        let mut hits = context.results.clone();
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);
    }
}
