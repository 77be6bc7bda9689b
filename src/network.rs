use crate::config::Config;
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;

/// One weighted connection between two input node ids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: u32,
    pub target: u32,
    pub weight: f64,
    pub directed: bool,
}

impl Edge {
    pub fn new(source: u32, target: u32, weight: f64, directed: bool) -> Self {
        Self {
            source,
            target,
            weight,
            directed,
        }
    }

    pub fn undirected(source: u32, target: u32, weight: f64) -> Self {
        Self::new(source, target, weight, false)
    }

    pub fn directed(source: u32, target: u32, weight: f64) -> Self {
        Self::new(source, target, weight, true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInput {
    pub id: u32,
    pub weight: f64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkInput {
    pub nodes: Vec<NodeInput>,
    pub edges: Vec<Edge>,
}

/// Leaf network with dense node indices and aggregated links in CSR order.
///
/// Undirected networks store each link once as `(min, max)`; directed
/// networks store every direction separately.
#[derive(Debug, Clone)]
pub struct Network {
    directed: bool,
    node_ids: Vec<u32>,
    node_names: Vec<Option<String>>,
    teleport_weights: Vec<f64>,
    pub(crate) link_source: Vec<u32>,
    pub(crate) link_target: Vec<u32>,
    pub(crate) link_weight: Vec<f64>,
    pub(crate) out_offsets: Vec<u32>,
    pub(crate) in_offsets: Vec<u32>,
    pub(crate) in_link_idx: Vec<u32>,
    sum_link_weight: f64,
    self_link_weight: f64,
}

impl Network {
    pub fn from_edges(edges: &[Edge], config: &Config) -> Result<Self> {
        Self::build(&[], edges, config)
    }

    pub fn from_input(input: &NetworkInput, config: &Config) -> Result<Self> {
        Self::build(&input.nodes, &input.edges, config)
    }

    fn build(declared: &[NodeInput], edges: &[Edge], config: &Config) -> Result<Self> {
        let directed = !config.is_undirected();

        let mut node_weight: FxHashMap<u32, (f64, Option<String>)> = FxHashMap::default();
        node_weight.reserve(declared.len());
        for node in declared {
            if !(node.weight.is_finite() && node.weight >= 0.0) {
                return Err(Error::NegativeNodeWeight {
                    node: node.id,
                    weight: node.weight,
                });
            }
            node_weight.insert(node.id, (node.weight, node.name.clone()));
        }

        for e in edges {
            if !(e.weight.is_finite() && e.weight >= 0.0) {
                return Err(Error::NegativeWeight {
                    from: e.source,
                    to: e.target,
                    weight: e.weight,
                });
            }
            node_weight.entry(e.source).or_insert((1.0, None));
            node_weight.entry(e.target).or_insert((1.0, None));
        }

        let mut node_ids: Vec<u32> = node_weight.keys().copied().collect();
        node_ids.sort_unstable();

        let mut id_to_idx: FxHashMap<u32, u32> = FxHashMap::default();
        id_to_idx.reserve(node_ids.len());
        for (idx, id) in node_ids.iter().copied().enumerate() {
            id_to_idx.insert(id, idx as u32);
        }

        let n = node_ids.len();
        let mut teleport_weights = Vec::with_capacity(n);
        let mut node_names = Vec::with_capacity(n);
        for id in node_ids.iter() {
            let (w, name) = node_weight.remove(id).unwrap_or((1.0, None));
            teleport_weights.push(w);
            node_names.push(name);
        }
        normalize_or_uniform(&mut teleport_weights);

        // Parallel links are summed; zero weights never become links.
        let mut aggregated: FxHashMap<(u32, u32), f64> = FxHashMap::default();
        let mut push = |s: u32, t: u32, w: f64| {
            *aggregated.entry((s, t)).or_insert(0.0) += w;
        };
        for e in edges {
            if e.weight == 0.0 {
                continue;
            }
            let s = id_to_idx[&e.source];
            let t = id_to_idx[&e.target];
            if !directed {
                push(s.min(t), s.max(t), e.weight);
            } else if e.directed || s == t {
                push(s, t, e.weight);
            } else {
                push(s, t, e.weight);
                push(t, s, e.weight);
            }
        }

        let mut links: Vec<(u32, u32, f64)> = aggregated
            .into_iter()
            .map(|((s, t), w)| (s, t, w))
            .collect();
        links.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let m = links.len();
        let mut link_source = Vec::with_capacity(m);
        let mut link_target = Vec::with_capacity(m);
        let mut link_weight = Vec::with_capacity(m);
        let mut out_counts = vec![0u32; n];
        let mut in_counts = vec![0u32; n];
        let mut sum_link_weight = 0.0;
        let mut self_link_weight = 0.0;

        for (s, t, w) in links {
            link_source.push(s);
            link_target.push(t);
            link_weight.push(w);
            out_counts[s as usize] += 1;
            in_counts[t as usize] += 1;
            sum_link_weight += w;
            if s == t {
                self_link_weight += w;
            }
        }

        let out_offsets = prefix_offsets(&out_counts);
        let in_offsets = prefix_offsets(&in_counts);

        let mut in_fill = vec![0u32; n];
        let mut in_link_idx = vec![0u32; m];
        for (e, &t) in link_target.iter().enumerate() {
            let t = t as usize;
            let pos = in_offsets[t] + in_fill[t];
            in_link_idx[pos as usize] = e as u32;
            in_fill[t] += 1;
        }

        Ok(Self {
            directed,
            node_ids,
            node_names,
            teleport_weights,
            link_source,
            link_target,
            link_weight,
            out_offsets,
            in_offsets,
            in_link_idx,
            sum_link_weight,
            self_link_weight,
        })
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    #[inline]
    pub fn link_count(&self) -> usize {
        self.link_source.len()
    }

    #[inline]
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    #[inline]
    pub fn node_id(&self, idx: usize) -> u32 {
        self.node_ids[idx]
    }

    pub fn node_ids(&self) -> &[u32] {
        &self.node_ids
    }

    pub fn node_name(&self, idx: usize) -> Option<&str> {
        self.node_names[idx].as_deref()
    }

    pub fn node_name_or_id(&self, idx: usize) -> String {
        self.node_names[idx]
            .clone()
            .unwrap_or_else(|| self.node_ids[idx].to_string())
    }

    pub fn teleport_weights(&self) -> &[f64] {
        &self.teleport_weights
    }

    pub fn sum_link_weight(&self) -> f64 {
        self.sum_link_weight
    }

    pub fn self_link_weight(&self) -> f64 {
        self.self_link_weight
    }

    #[inline]
    pub fn link(&self, e: usize) -> (u32, u32, f64) {
        (self.link_source[e], self.link_target[e], self.link_weight[e])
    }

    #[inline]
    pub fn out_range(&self, node_idx: usize) -> std::ops::Range<usize> {
        self.out_offsets[node_idx] as usize..self.out_offsets[node_idx + 1] as usize
    }

    #[inline]
    pub fn in_range(&self, node_idx: usize) -> std::ops::Range<usize> {
        self.in_offsets[node_idx] as usize..self.in_offsets[node_idx + 1] as usize
    }

    #[inline]
    pub fn in_links(&self, node_idx: usize) -> &[u32] {
        &self.in_link_idx[self.in_range(node_idx)]
    }

    #[inline]
    pub fn out_degree(&self, node_idx: usize) -> usize {
        (self.out_offsets[node_idx + 1] - self.out_offsets[node_idx]) as usize
    }

    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.node_ids.binary_search(&id).ok()
    }
}

fn prefix_offsets(counts: &[u32]) -> Vec<u32> {
    let mut offsets = vec![0u32; counts.len() + 1];
    for (i, c) in counts.iter().enumerate() {
        offsets[i + 1] = offsets[i] + c;
    }
    offsets
}

pub(crate) fn normalize_or_uniform(v: &mut [f64]) {
    let sum: f64 = v.iter().sum();
    if sum > 0.0 {
        for x in v.iter_mut() {
            *x /= sum;
        }
    } else if !v.is_empty() {
        let u = 1.0 / v.len() as f64;
        v.fill(u);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn undirected() -> Config {
        Config::builder().build().unwrap()
    }

    fn directed() -> Config {
        Config::builder().directed(true).build().unwrap()
    }

    #[test]
    fn dense_ids_follow_input_order() {
        let edges = [Edge::undirected(30, 10, 1.0), Edge::undirected(10, 20, 2.0)];
        let net = Network::from_edges(&edges, &undirected()).unwrap();
        assert_eq!(net.node_ids(), &[10, 20, 30]);
        assert_eq!(net.index_of(20), Some(1));
        assert_eq!(net.index_of(99), None);
    }

    #[test]
    fn undirected_links_are_canonical_and_summed() {
        let edges = [
            Edge::undirected(1, 0, 1.0),
            Edge::undirected(0, 1, 2.0),
            Edge::directed(1, 0, 0.5),
        ];
        let net = Network::from_edges(&edges, &undirected()).unwrap();
        assert_eq!(net.link_count(), 1);
        let (s, t, w) = net.link(0);
        assert_eq!((s, t), (0, 1));
        assert_relative_eq!(w, 3.5);
        assert_relative_eq!(net.sum_link_weight(), 3.5);
    }

    #[test]
    fn undirected_edge_in_directed_network_becomes_two_links() {
        let edges = [Edge::undirected(0, 1, 2.0), Edge::directed(1, 2, 1.0)];
        let net = Network::from_edges(&edges, &directed()).unwrap();
        assert!(net.is_directed());
        assert_eq!(net.link_count(), 3);
        assert_eq!(net.link(0), (0, 1, 2.0));
        assert_eq!(net.link(1), (1, 0, 2.0));
        assert_eq!(net.link(2), (1, 2, 1.0));
        assert_eq!(net.in_links(0), &[1]);
        assert_eq!(net.out_degree(1), 2);
    }

    #[test]
    fn zero_weights_are_dropped_but_nodes_kept() {
        let edges = [Edge::undirected(0, 1, 0.0), Edge::undirected(1, 2, 1.0)];
        let net = Network::from_edges(&edges, &undirected()).unwrap();
        assert_eq!(net.node_count(), 3);
        assert_eq!(net.link_count(), 1);
    }

    #[test]
    fn rejects_negative_and_nan_weights() {
        let err = Network::from_edges(&[Edge::undirected(0, 1, -1.0)], &undirected()).unwrap_err();
        assert!(matches!(err, Error::NegativeWeight { from: 0, to: 1, .. }));
        assert!(Network::from_edges(&[Edge::undirected(0, 1, f64::NAN)], &undirected()).is_err());
    }

    #[test]
    fn teleport_weights_normalize_node_weights() {
        let input = NetworkInput {
            nodes: vec![
                NodeInput {
                    id: 0,
                    weight: 3.0,
                    name: Some("a".into()),
                },
                NodeInput {
                    id: 1,
                    weight: 1.0,
                    name: None,
                },
            ],
            edges: vec![Edge::directed(0, 1, 1.0)],
        };
        let net = Network::from_input(&input, &directed()).unwrap();
        assert_relative_eq!(net.teleport_weights()[0], 0.75);
        assert_relative_eq!(net.teleport_weights()[1], 0.25);
        assert_eq!(net.node_name(0), Some("a"));
        assert_eq!(net.node_name_or_id(1), "1");
    }

    #[test]
    fn self_link_weight_is_tracked() {
        let edges = [Edge::undirected(0, 0, 2.0), Edge::undirected(0, 1, 1.0)];
        let net = Network::from_edges(&edges, &undirected()).unwrap();
        assert_relative_eq!(net.self_link_weight(), 2.0);
        assert_relative_eq!(net.sum_link_weight(), 3.0);
    }
}
