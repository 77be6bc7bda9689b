use crate::flow::FlowState;
use crate::network::Network;
use crate::objective;

// One node per module of the level below. CSR in both directions without
// self links; undirected levels store each link once.
#[derive(Debug, Clone)]
pub(crate) struct LevelNetwork<F> {
    nodes: Vec<F>,
    out_offsets: Vec<u32>,
    out_neighbor: Vec<u32>,
    out_flow: Vec<f64>,
    in_offsets: Vec<u32>,
    in_neighbor: Vec<u32>,
    in_flow: Vec<f64>,
    // Flat member pool: leaves of node i are member_leaf[member_offsets[i]..member_offsets[i+1]].
    member_offsets: Vec<u32>,
    member_leaf: Vec<u32>,
    // Leaf term of the map equation, inherited by every aggregation of the leaves.
    node_flow_log_node_flow: f64,
    undirected: bool,
}

fn prefix_offsets(counts: &[u32]) -> Vec<u32> {
    let mut offsets = vec![0u32; counts.len() + 1];
    for i in 0..counts.len() {
        offsets[i + 1] = offsets[i] + counts[i];
    }
    offsets
}

pub(crate) fn module_count(assignment: &[u32]) -> usize {
    assignment.iter().map(|&m| m as usize + 1).max().unwrap_or(0)
}

impl<F: FlowState> LevelNetwork<F> {
    fn from_links(nodes: Vec<F>, links: &[(u32, u32, f64)], undirected: bool) -> Self {
        let n = nodes.len();
        let mut out_counts = vec![0u32; n];
        let mut in_counts = vec![0u32; n];
        for &(s, t, _) in links {
            out_counts[s as usize] += 1;
            in_counts[t as usize] += 1;
        }
        let out_offsets = prefix_offsets(&out_counts);
        let in_offsets = prefix_offsets(&in_counts);

        let m = links.len();
        let mut out_neighbor = vec![0u32; m];
        let mut out_flow = vec![0.0f64; m];
        let mut in_neighbor = vec![0u32; m];
        let mut in_flow = vec![0.0f64; m];
        let mut out_fill = vec![0u32; n];
        let mut in_fill = vec![0u32; n];

        // In-links are filled in out-link order so traversal stays deterministic.
        for &(s, t, f) in links {
            let (s, t) = (s as usize, t as usize);
            let pos = (out_offsets[s] + out_fill[s]) as usize;
            out_neighbor[pos] = t as u32;
            out_flow[pos] = f;
            out_fill[s] += 1;

            let pos = (in_offsets[t] + in_fill[t]) as usize;
            in_neighbor[pos] = s as u32;
            in_flow[pos] = f;
            in_fill[t] += 1;
        }

        Self {
            member_offsets: (0..=n as u32).collect(),
            member_leaf: (0..n as u32).collect(),
            node_flow_log_node_flow: objective::node_flow_log_node_flow(&nodes),
            nodes,
            out_offsets,
            out_neighbor,
            out_flow,
            in_offsets,
            in_neighbor,
            in_flow,
            undirected,
        }
    }

    pub(crate) fn from_network(network: &Network, nodes: Vec<F>, link_flow: &[f64]) -> Self {
        let links: Vec<(u32, u32, f64)> = (0..network.link_count())
            .filter_map(|e| {
                let (s, t, _) = network.link(e);
                (s != t && link_flow[e] > 0.0).then_some((s, t, link_flow[e]))
            })
            .collect();
        Self::from_links(nodes, &links, !network.is_directed())
    }

    #[inline]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn nodes(&self) -> &[F] {
        &self.nodes
    }

    #[inline]
    pub(crate) fn node_flow_log_node_flow(&self) -> f64 {
        self.node_flow_log_node_flow
    }

    #[inline]
    pub(crate) fn out_links(&self, node_idx: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        let range = self.out_offsets[node_idx] as usize..self.out_offsets[node_idx + 1] as usize;
        self.out_neighbor[range.clone()]
            .iter()
            .copied()
            .zip(self.out_flow[range].iter().copied())
    }

    #[inline]
    pub(crate) fn in_links(&self, node_idx: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        let range = self.in_offsets[node_idx] as usize..self.in_offsets[node_idx + 1] as usize;
        self.in_neighbor[range.clone()]
            .iter()
            .copied()
            .zip(self.in_flow[range].iter().copied())
    }

    #[inline]
    pub(crate) fn has_links(&self, node_idx: usize) -> bool {
        self.out_offsets[node_idx] != self.out_offsets[node_idx + 1]
            || self.in_offsets[node_idx] != self.in_offsets[node_idx + 1]
    }

    #[inline]
    pub(crate) fn members(&self, node_idx: usize) -> &[u32] {
        &self.member_leaf
            [self.member_offsets[node_idx] as usize..self.member_offsets[node_idx + 1] as usize]
    }

    pub(crate) fn module_states(&self, assignment: &[u32], module_count: usize) -> Vec<F> {
        let mut states = vec![F::default(); module_count];
        let mut teleport_before = vec![0.0f64; module_count];
        for (i, node) in self.nodes.iter().enumerate() {
            let m = assignment[i] as usize;
            states[m].add(node);
            teleport_before[m] += node.teleport_exit();
        }

        for s in 0..self.node_count() {
            let ms = assignment[s] as usize;
            for (t, f) in self.out_links(s) {
                if assignment[t as usize] as usize == ms {
                    states[ms].shift_boundary(-f);
                }
            }
        }

        for (state, before) in states.iter_mut().zip(teleport_before) {
            let correction = state.teleport_exit() - before;
            state.shift_boundary(correction);
        }
        states
    }

    pub(crate) fn codelength(&self, assignment: &[u32], exit_network_flow: f64) -> f64 {
        let modules = self.module_states(assignment, module_count(assignment));
        objective::codelength(self.node_flow_log_node_flow, &modules, exit_network_flow)
    }

    pub(crate) fn consolidate(&self, assignment: &[u32], module_states: &[F]) -> Self {
        let n = self.node_count();
        let new_n = module_states.len();

        let mut member_counts = vec![0u32; new_n];
        let mut node_counts = vec![0u32; new_n];
        for i in 0..n {
            let m = assignment[i] as usize;
            member_counts[m] += self.members(i).len() as u32;
            node_counts[m] += 1;
        }
        let member_offsets = prefix_offsets(&member_counts);
        let node_offsets = prefix_offsets(&node_counts);

        let mut member_leaf = vec![0u32; member_offsets[new_n] as usize];
        let mut member_fill = vec![0u32; new_n];
        let mut module_nodes = vec![0u32; n];
        let mut node_fill = vec![0u32; new_n];
        for i in 0..n {
            let m = assignment[i] as usize;
            let src = self.members(i);
            let start = (member_offsets[m] + member_fill[m]) as usize;
            member_leaf[start..start + src.len()].copy_from_slice(src);
            member_fill[m] += src.len() as u32;

            module_nodes[(node_offsets[m] + node_fill[m]) as usize] = i as u32;
            node_fill[m] += 1;
        }

        let mut links: Vec<(u32, u32, f64)> = Vec::new();
        if self.undirected {
            // Module pairs are canonicalized (min, max) so each link is kept once.
            let mut packed: Vec<(u64, f64)> = Vec::new();
            for s in 0..n {
                let ms = assignment[s];
                for (t, f) in self.out_links(s) {
                    let mt = assignment[t as usize];
                    if ms == mt {
                        continue;
                    }
                    let (a, b) = (ms.min(mt), ms.max(mt));
                    packed.push((((a as u64) << 32) | b as u64, f));
                }
            }
            packed.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            let mut i = 0usize;
            while i < packed.len() {
                let key = packed[i].0;
                let mut sum = packed[i].1;
                i += 1;
                while i < packed.len() && packed[i].0 == key {
                    sum += packed[i].1;
                    i += 1;
                }
                links.push(((key >> 32) as u32, key as u32, sum));
            }
        } else {
            // Sparse stamp accumulator over destination modules.
            let mut stamp = vec![u32::MAX; new_n];
            let mut dst_flow = vec![0.0f64; new_n];
            let mut touched: Vec<u32> = Vec::new();
            for src_m in 0..new_n {
                touched.clear();
                let range = node_offsets[src_m] as usize..node_offsets[src_m + 1] as usize;
                for &node in &module_nodes[range] {
                    for (t, f) in self.out_links(node as usize) {
                        let dst_m = assignment[t as usize] as usize;
                        if dst_m == src_m {
                            continue;
                        }
                        if stamp[dst_m] != src_m as u32 {
                            stamp[dst_m] = src_m as u32;
                            dst_flow[dst_m] = f;
                            touched.push(dst_m as u32);
                        } else {
                            dst_flow[dst_m] += f;
                        }
                    }
                }
                touched.sort_unstable();
                for &dst_m in &touched {
                    links.push((src_m as u32, dst_m, dst_flow[dst_m as usize]));
                }
            }
        }

        let mut out = Self::from_links(module_states.to_vec(), &links, self.undirected);
        out.member_offsets = member_offsets;
        out.member_leaf = member_leaf;
        out.node_flow_log_node_flow = self.node_flow_log_node_flow;
        out
    }

    pub(crate) fn induced_subnetwork(&self, members: &[u32]) -> Self {
        let mut local = vec![u32::MAX; self.node_count()];
        for (i, &g) in members.iter().enumerate() {
            local[g as usize] = i as u32;
        }

        let mut links: Vec<(u32, u32, f64)> = Vec::new();
        for (i, &g) in members.iter().enumerate() {
            for (t, f) in self.out_links(g as usize) {
                let lt = local[t as usize];
                if lt != u32::MAX {
                    links.push((i as u32, lt, f));
                }
            }
        }

        let nodes = members.iter().map(|&g| self.nodes[g as usize]).collect();
        Self::from_links(nodes, &links, self.undirected)
    }

    pub(crate) fn assignment_to_leaves(&self, leaf_count: usize) -> Vec<u32> {
        let mut out = vec![0u32; leaf_count];
        for module in 0..self.node_count() {
            for &leaf in self.members(module) {
                out[leaf as usize] = module as u32;
            }
        }
        out
    }

    pub(crate) fn with_flow_as_enter_flow(&self) -> Self {
        let n = self.node_count();
        let mut out = self.clone();
        for node in out.nodes.iter_mut() {
            let enter = node.enter_flow();
            node.set_flow(enter);
        }
        out.member_offsets = (0..=n as u32).collect();
        out.member_leaf = (0..n as u32).collect();
        out.node_flow_log_node_flow = objective::node_flow_log_node_flow(&out.nodes);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::flow::{self, DirectedNonDetailedBalanceFlow, UndirectedFlow};
    use crate::network::Edge;
    use approx::assert_relative_eq;

    fn two_triangles() -> (Network, Config) {
        let cfg = Config::builder().build().unwrap();
        let edges = [
            Edge::undirected(0, 1, 1.0),
            Edge::undirected(1, 2, 1.0),
            Edge::undirected(2, 0, 1.0),
            Edge::undirected(3, 4, 1.0),
            Edge::undirected(4, 5, 1.0),
            Edge::undirected(5, 3, 1.0),
            Edge::undirected(2, 3, 1.0),
        ];
        (Network::from_edges(&edges, &cfg).unwrap(), cfg)
    }

    fn leaf_level<F: FlowState>(net: &Network, cfg: &Config) -> LevelNetwork<F> {
        let flows = flow::calculate_flow(net, cfg).unwrap();
        LevelNetwork::from_network(net, flow::node_states(net, &flows), &flows.link_flow)
    }

    #[test]
    fn module_states_remove_internal_links() {
        let (net, cfg) = two_triangles();
        let level: LevelNetwork<UndirectedFlow> = leaf_level(&net, &cfg);
        let states = level.module_states(&[0, 0, 0, 1, 1, 1], 2);
        // 14 units of weighted degree; only the bridge crosses.
        assert_relative_eq!(states[0].flow, 0.5, epsilon = 1e-12);
        assert_relative_eq!(states[0].exit_flow, 1.0 / 14.0, epsilon = 1e-12);
        assert_relative_eq!(states[1].exit_flow, 1.0 / 14.0, epsilon = 1e-12);
    }

    #[test]
    fn consolidate_keeps_members_and_boundary_links() {
        let (net, cfg) = two_triangles();
        let level: LevelNetwork<UndirectedFlow> = leaf_level(&net, &cfg);
        let assignment = [0, 0, 0, 1, 1, 1];
        let states = level.module_states(&assignment, 2);
        let top = level.consolidate(&assignment, &states);
        assert_eq!(top.node_count(), 2);
        assert_eq!(top.members(0), &[0, 1, 2]);
        assert_eq!(top.members(1), &[3, 4, 5]);
        let links: Vec<_> = top.out_links(0).collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, 1);
        assert_relative_eq!(links[0].1, 2.0 / 14.0, epsilon = 1e-12);
        assert!(top.in_links(0).next().is_none());
        assert_eq!(top.assignment_to_leaves(6), vec![0, 0, 0, 1, 1, 1]);

        let flat = level.codelength(&assignment, 0.0);
        assert_relative_eq!(top.codelength(&[0, 1], 0.0), flat, epsilon = 1e-12);
        let one_module = level.codelength(&[0; 6], 0.0);
        assert_relative_eq!(
            one_module,
            objective::one_level_codelength(level.nodes()),
            epsilon = 1e-12
        );
        assert!(flat < one_module);
    }

    #[test]
    fn directed_consolidation_sums_parallel_links() {
        let cfg = Config::builder().rawdir(true).build().unwrap();
        let edges = [
            Edge::directed(0, 2, 1.0),
            Edge::directed(1, 2, 1.0),
            Edge::directed(2, 0, 2.0),
        ];
        let net = Network::from_edges(&edges, &cfg).unwrap();
        let level: LevelNetwork<DirectedNonDetailedBalanceFlow> = leaf_level(&net, &cfg);
        let assignment = [0, 0, 1];
        let states = level.module_states(&assignment, 2);
        let top = level.consolidate(&assignment, &states);
        let out: Vec<_> = top.out_links(0).collect();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].1, 0.5, epsilon = 1e-12);
        assert_relative_eq!(states[0].exit_flow, 0.5, epsilon = 1e-12);
        assert_relative_eq!(states[0].enter_flow, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn induced_subnetwork_keeps_outer_boundary() {
        let (net, cfg) = two_triangles();
        let level: LevelNetwork<UndirectedFlow> = leaf_level(&net, &cfg);
        let sub = level.induced_subnetwork(&[2, 0, 1]);
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.members(0), &[0]);
        // Node 2 still carries its exit over the bridge.
        let all = sub.module_states(&[0, 0, 0], 1);
        assert_relative_eq!(all[0].exit_flow, 1.0 / 14.0, epsilon = 1e-12);
        assert!(sub.has_links(1));
    }

    #[test]
    fn super_network_uses_enter_flow() {
        let (net, cfg) = two_triangles();
        let level: LevelNetwork<UndirectedFlow> = leaf_level(&net, &cfg);
        let assignment = [0, 0, 0, 1, 1, 1];
        let top = level.consolidate(&assignment, &level.module_states(&assignment, 2));
        let sup = top.with_flow_as_enter_flow();
        assert_relative_eq!(sup.nodes()[0].flow, 1.0 / 14.0, epsilon = 1e-12);
        assert_eq!(sup.members(1), &[1]);
    }
}
