use crate::config::ConnectionMode;
use crate::network::Edge;
use rustc_hash::FxHashMap;

/// Turn raw host connections into the edge list handed to the engine.
///
/// Output keeps the order in which each merged edge was first seen.
pub fn aggregate_connections(raw: &[Edge], mode: ConnectionMode) -> Vec<Edge> {
    match mode {
        ConnectionMode::Transactions => raw.to_vec(),
        ConnectionMode::Edges => merge_by(raw, |e| {
            if e.directed {
                (e.source, e.target, true)
            } else {
                (e.source.min(e.target), e.source.max(e.target), false)
            }
        }),
        ConnectionMode::Links => merge_by(raw, |e| {
            (e.source.min(e.target), e.source.max(e.target), false)
        }),
    }
}

fn merge_by<K>(raw: &[Edge], key: K) -> Vec<Edge>
where
    K: Fn(&Edge) -> (u32, u32, bool),
{
    let mut slot: FxHashMap<(u32, u32, bool), usize> = FxHashMap::default();
    let mut out: Vec<Edge> = Vec::new();
    for e in raw {
        let k = key(e);
        match slot.get(&k) {
            Some(&i) => out[i].weight += e.weight,
            None => {
                slot.insert(k, out.len());
                out.push(Edge::new(k.0, k.1, e.weight, k.2));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Vec<Edge> {
        vec![
            Edge::directed(1, 2, 1.0),
            Edge::directed(1, 2, 2.0),
            Edge::directed(2, 1, 4.0),
            Edge::undirected(3, 1, 1.0),
            Edge::undirected(1, 3, 1.0),
        ]
    }

    #[test]
    fn transactions_keep_everything() {
        assert_eq!(aggregate_connections(&raw(), ConnectionMode::Transactions), raw());
    }

    #[test]
    fn edges_merge_same_direction() {
        let out = aggregate_connections(&raw(), ConnectionMode::Edges);
        assert_eq!(
            out,
            vec![
                Edge::directed(1, 2, 3.0),
                Edge::directed(2, 1, 4.0),
                Edge::undirected(1, 3, 2.0),
            ]
        );
    }

    #[test]
    fn links_collapse_unordered_pairs() {
        let out = aggregate_connections(&raw(), ConnectionMode::Links);
        assert_eq!(
            out,
            vec![Edge::undirected(1, 2, 7.0), Edge::undirected(1, 3, 2.0)]
        );
    }
}
