use crate::flow::FlowState;
use crate::level::{module_count, LevelNetwork};
use crate::objective::plogp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    Leaf(u32),
    Module(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleNode {
    pub parent: Option<u32>,
    pub children: Vec<Child>,
}

impl ModuleNode {
    pub fn is_bottom(&self) -> bool {
        matches!(self.children.first(), Some(Child::Leaf(_)))
    }
}

/// Arena of nested modules over `leaf_count` leaf nodes.
///
/// Modules are addressed by index into the arena. A module holds either only
/// leaves or only modules, and every leaf sits under exactly one bottom module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyTree {
    leaf_count: usize,
    modules: Vec<ModuleNode>,
    top: Vec<u32>,
}

impl HierarchyTree {
    pub(crate) fn from_layers(leaf_count: usize, bottom: &[u32], layers: &[Vec<u32>]) -> Self {
        debug_assert_eq!(bottom.len(), leaf_count);
        let mut modules = vec![ModuleNode::default(); module_count(bottom)];
        for (leaf, &m) in bottom.iter().enumerate() {
            modules[m as usize].children.push(Child::Leaf(leaf as u32));
        }

        let mut level: Vec<u32> = (0..modules.len() as u32).collect();
        for layer in layers {
            debug_assert_eq!(layer.len(), level.len());
            let base = modules.len() as u32;
            let count = module_count(layer);
            modules.resize(modules.len() + count, ModuleNode::default());
            for (&module, &parent) in level.iter().zip(layer) {
                let parent = base + parent;
                modules[module as usize].parent = Some(parent);
                modules[parent as usize].children.push(Child::Module(module));
            }
            level = (base..base + count as u32).collect();
        }

        Self {
            leaf_count,
            modules,
            top: level,
        }
    }

    pub(crate) fn single_module(leaf_count: usize) -> Self {
        if leaf_count == 0 {
            return Self::default();
        }
        Self::from_layers(leaf_count, &vec![0; leaf_count], &[])
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module(&self, id: u32) -> &ModuleNode {
        &self.modules[id as usize]
    }

    pub fn top_modules(&self) -> &[u32] {
        &self.top
    }

    pub fn leaf_paths(&self) -> Vec<Vec<u32>> {
        let mut paths = vec![Vec::new(); self.leaf_count];
        let mut path = Vec::new();
        for &top in &self.top {
            self.collect_paths(top, &mut path, &mut paths);
        }
        paths
    }

    fn collect_paths(&self, module: u32, path: &mut Vec<u32>, paths: &mut [Vec<u32>]) {
        path.push(module);
        for child in &self.modules[module as usize].children {
            match *child {
                Child::Leaf(leaf) => paths[leaf as usize] = path.clone(),
                Child::Module(m) => self.collect_paths(m, path, paths),
            }
        }
        path.pop();
    }

    pub fn depth(&self) -> usize {
        self.leaf_paths().iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn preorder(&self) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.modules.len());
        let mut stack: Vec<u32> = self.top.iter().rev().copied().collect();
        while let Some(m) = stack.pop() {
            order.push(m);
            for child in self.modules[m as usize].children.iter().rev() {
                if let Child::Module(c) = *child {
                    stack.push(c);
                }
            }
        }
        order
    }

    pub fn leaf_order(&self) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.leaf_count);
        for m in self.preorder() {
            for child in &self.modules[m as usize].children {
                if let Child::Leaf(leaf) = *child {
                    order.push(leaf);
                }
            }
        }
        order
    }

    /// One assignment per module level, level 0 being the top modules.
    ///
    /// A leaf whose branch ends above level `k` keeps its bottom module there.
    /// Ids are dense per level and follow depth-first order.
    pub fn level_assignments(&self) -> Vec<Vec<u32>> {
        let paths = self.leaf_paths();
        let depth = paths.iter().map(Vec::len).max().unwrap_or(0);
        let order = self.leaf_order();

        let mut relabel = vec![u32::MAX; self.modules.len()];
        (0..depth)
            .map(|k| {
                relabel.fill(u32::MAX);
                let mut next = 0u32;
                let mut assignment = vec![0u32; self.leaf_count];
                for &leaf in &order {
                    let path = &paths[leaf as usize];
                    let module = path[k.min(path.len() - 1)] as usize;
                    if relabel[module] == u32::MAX {
                        relabel[module] = next;
                        next += 1;
                    }
                    assignment[leaf as usize] = relabel[module];
                }
                assignment
            })
            .collect()
    }

    pub(crate) fn sort_by_flow(&mut self, leaf_flow: &[f64]) {
        let mut module_flow = vec![0.0f64; self.modules.len()];
        for (leaf, path) in self.leaf_paths().iter().enumerate() {
            for &m in path {
                module_flow[m as usize] += leaf_flow[leaf];
            }
        }
        let flow_of = |child: &Child| match *child {
            Child::Leaf(l) => leaf_flow[l as usize],
            Child::Module(m) => module_flow[m as usize],
        };

        self.top
            .sort_by(|a, b| module_flow[*b as usize].total_cmp(&module_flow[*a as usize]));
        for module in self.modules.iter_mut() {
            module
                .children
                .sort_by(|a, b| flow_of(b).total_cmp(&flow_of(a)));
        }
    }

    pub(crate) fn module_states<F: FlowState>(&self, leaf_network: &LevelNetwork<F>) -> Vec<F> {
        let paths = self.leaf_paths();
        let mut states = vec![F::default(); self.modules.len()];
        let mut teleport_before = vec![0.0f64; self.modules.len()];
        for (leaf, path) in paths.iter().enumerate() {
            let node = &leaf_network.nodes()[leaf];
            for &m in path {
                states[m as usize].add(node);
                teleport_before[m as usize] += node.teleport_exit();
            }
        }

        // A link is internal to every module on the shared part of both paths.
        for s in 0..leaf_network.node_count() {
            let source_path = &paths[s];
            for (t, f) in leaf_network.out_links(s) {
                let target_path = &paths[t as usize];
                for (a, b) in source_path.iter().zip(target_path) {
                    if a != b {
                        break;
                    }
                    states[*a as usize].shift_boundary(-f);
                }
            }
        }

        for (state, before) in states.iter_mut().zip(teleport_before) {
            let correction = state.teleport_exit() - before;
            state.shift_boundary(correction);
        }
        states
    }

    pub(crate) fn level_codelengths<F: FlowState>(
        &self,
        leaf_network: &LevelNetwork<F>,
        exit_network_flow: f64,
    ) -> Vec<f64> {
        let states = self.module_states(leaf_network);
        let leaves = leaf_network.nodes();
        let term = |exit: f64, children: &mut dyn Iterator<Item = f64>| {
            let mut sum = exit;
            let mut sum_plogp = 0.0;
            for c in children {
                sum += c;
                sum_plogp += plogp(c);
            }
            plogp(sum) - plogp(exit) - sum_plogp
        };

        let mut per_level = vec![term(
            exit_network_flow,
            &mut self.top.iter().map(|&m| states[m as usize].enter_flow()),
        )];
        let mut frontier: Vec<u32> = self.top.clone();
        while !frontier.is_empty() {
            let mut level_sum = 0.0;
            let mut next = Vec::new();
            for &m in &frontier {
                let module = &self.modules[m as usize];
                let mut children = module.children.iter().map(|child| match *child {
                    Child::Leaf(l) => leaves[l as usize].flow(),
                    Child::Module(c) => {
                        next.push(c);
                        states[c as usize].enter_flow()
                    }
                });
                level_sum += term(states[m as usize].exit_flow(), &mut children);
            }
            per_level.push(level_sum);
            frontier = next;
        }
        per_level
    }

    pub(crate) fn codelength<F: FlowState>(
        &self,
        leaf_network: &LevelNetwork<F>,
        exit_network_flow: f64,
    ) -> f64 {
        self.level_codelengths(leaf_network, exit_network_flow)
            .iter()
            .sum()
    }

    pub(crate) fn graft(&mut self, parent: u32, sub_tree: &HierarchyTree, local_to_leaf: &[u32]) -> Vec<u32> {
        let offset = self.modules.len() as u32;
        let mut bottom = Vec::new();
        for (i, sub) in sub_tree.modules.iter().enumerate() {
            let children = sub
                .children
                .iter()
                .map(|child| match *child {
                    Child::Leaf(l) => Child::Leaf(local_to_leaf[l as usize]),
                    Child::Module(m) => Child::Module(offset + m),
                })
                .collect();
            if sub.is_bottom() {
                bottom.push(offset + i as u32);
            }
            self.modules.push(ModuleNode {
                parent: Some(sub.parent.map_or(parent, |p| offset + p)),
                children,
            });
        }
        self.modules[parent as usize].children = sub_tree
            .top
            .iter()
            .map(|&t| Child::Module(offset + t))
            .collect();
        bottom
    }
}
