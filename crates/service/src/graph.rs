use std::collections::VecDeque;

use ahash::{HashMap, HashMapExt};
use codec::Address;

/// One admitted peer in the root's tree.
///
/// Parent and children are arena indices into [`NetworkGraph::nodes`];
/// handles instead of owned links keep the parent/child cycle out of the
/// type system.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub address: Address,
    pub is_on: bool,
    parent: Option<usize>,
    children: [Option<usize>; 2],
}

impl GraphNode {
    fn new(address: Address) -> Self {
        Self {
            address,
            is_on: true,
            parent: None,
            children: [None, None],
        }
    }

    pub fn is_full(&self) -> bool {
        self.children.iter().all(Option::is_some)
    }
}

/// The root's binary tree of peers.
///
/// Nodes live in an arena and are looked up by address. A node is `on`
/// while its reunions keep arriving; turning a node off always takes its
/// whole subtree with it, and an off node neither receives new children
/// nor forwards traffic.
pub struct NetworkGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<Address, usize>,
}

impl NetworkGraph {
    pub fn new(root: Address) -> Self {
        let mut index = HashMap::new();
        index.insert(root, 0);

        Self {
            nodes: vec![GraphNode::new(root)],
            index,
        }
    }

    pub fn root(&self) -> &GraphNode {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.index.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Option<&GraphNode> {
        self.index.get(address).map(|idx| &self.nodes[*idx])
    }

    pub fn parent_of(&self, address: &Address) -> Option<Address> {
        let node = self.get(address)?;
        node.parent.map(|idx| self.nodes[idx].address)
    }

    /// Present children of a node, left slot first.
    pub fn children_of(&self, address: &Address) -> Vec<Address> {
        match self.get(address) {
            Some(node) => node
                .children
                .into_iter()
                .flatten()
                .map(|idx| self.nodes[idx].address)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Hops between a node and the root, following parent handles. `None`
    /// for unknown or detached nodes.
    pub fn depth_of(&self, address: &Address) -> Option<usize> {
        let mut idx = *self.index.get(address)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[idx].parent {
            idx = parent;
            depth += 1;
            if depth > self.nodes.len() {
                return None;
            }
        }

        (idx == 0).then_some(depth)
    }

    /// The shallowest live node with an open child slot, in level order
    /// with left slots visited first.
    ///
    /// The sender's own subtree is skipped entirely, so a peer whose
    /// reunion just failed can re-advertise without being handed one of
    /// its own descendants as a parent.
    pub fn find_live_parent(&self, sender: &Address) -> Option<&GraphNode> {
        let skip = self.index.get(sender).copied();

        let mut queue = VecDeque::from([0]);
        while let Some(idx) = queue.pop_front() {
            if Some(idx) == skip {
                continue;
            }

            let node = &self.nodes[idx];
            if node.is_on && !node.is_full() {
                return Some(node);
            }

            queue.extend(node.children.into_iter().flatten());
        }

        None
    }

    /// Creates or re-parents `child` under `parent` and turns the
    /// attached subtree on. Refuses a missing, off or full parent, and
    /// refuses any parent inside `child`'s own subtree.
    pub fn add_node(&mut self, child: Address, parent: Address) -> bool {
        if child == parent {
            return false;
        }

        let Some(&parent_idx) = self.index.get(&parent) else {
            return false;
        };

        if !self.nodes[parent_idx].is_on || self.nodes[parent_idx].is_full() {
            return false;
        }

        let child_idx = match self.index.get(&child).copied() {
            Some(idx) => {
                if self.subtree(idx).contains(&parent_idx) {
                    return false;
                }

                self.detach(idx);
                idx
            }
            None => {
                let idx = self.nodes.len();
                self.nodes.push(GraphNode::new(child));
                self.index.insert(child, idx);
                idx
            }
        };

        self.nodes[child_idx].parent = Some(parent_idx);
        if let Some(slot) = self.nodes[parent_idx]
            .children
            .iter()
            .position(Option::is_none)
        {
            self.nodes[parent_idx].children[slot] = Some(child_idx);
        }

        self.set_subtree(child_idx, true);
        true
    }

    pub fn turn_on_node(&mut self, address: &Address) -> bool {
        self.set_node(address, true)
    }

    pub fn turn_off_node(&mut self, address: &Address) -> bool {
        self.set_node(address, false)
    }

    pub fn turn_on_subtree(&mut self, address: &Address) {
        if let Some(&idx) = self.index.get(address) {
            self.set_subtree(idx, true);
        }
    }

    pub fn turn_off_subtree(&mut self, address: &Address) {
        if let Some(&idx) = self.index.get(address) {
            self.set_subtree(idx, false);
        }
    }

    /// Detaches a node from its parent slot, forces its whole subtree
    /// off and drops the node itself from the address index. Descendants
    /// stay addressable, but their off ancestors keep them out of parent
    /// selection and fan-out.
    pub fn remove_node(&mut self, address: &Address) -> Option<GraphNode> {
        let idx = self.index.get(address).copied()?;
        if idx == 0 {
            return None;
        }

        self.set_subtree(idx, false);
        self.detach(idx);
        self.index.remove(address);

        Some(self.nodes[idx].clone())
    }

    fn set_node(&mut self, address: &Address, on: bool) -> bool {
        match self.index.get(address) {
            Some(&idx) => {
                self.nodes[idx].is_on = on;
                true
            }
            None => false,
        }
    }

    fn set_subtree(&mut self, start: usize, on: bool) {
        for idx in self.subtree(start) {
            self.nodes[idx].is_on = on;
        }
    }

    fn detach(&mut self, idx: usize) {
        if let Some(parent_idx) = self.nodes[idx].parent.take() {
            for slot in self.nodes[parent_idx].children.iter_mut() {
                if *slot == Some(idx) {
                    *slot = None;
                }
            }
        }
    }

    /// Level-order arena indices of a subtree, the start node included.
    fn subtree(&self, start: usize) -> Vec<usize> {
        let mut indices = vec![start];
        let mut cursor = 0;
        while cursor < indices.len() {
            let idx = indices[cursor];
            cursor += 1;
            indices.extend(self.nodes[idx].children.into_iter().flatten());
        }

        indices
    }
}
