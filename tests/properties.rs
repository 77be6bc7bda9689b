use infoflow::{run, Config, Edge};
use proptest::prelude::*;

fn edge_list(max_nodes: u32) -> impl Strategy<Value = Vec<Edge>> {
    prop::collection::vec(
        (0..max_nodes, 0..max_nodes, 0.1f64..5.0),
        1..40,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(s, t, w)| Edge::undirected(s, t, w))
            .collect::<Vec<Edge>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn hierarchy_covers_every_node_once(edges in edge_list(16), seed in 0u64..1000) {
        let config = Config::builder().seed(seed).build().unwrap();
        let result = run(&edges, &config).unwrap();
        let n = result.node_ids.len();

        let mut leaves = result.tree.leaf_order();
        leaves.sort_unstable();
        prop_assert_eq!(leaves, (0..n as u32).collect::<Vec<_>>());

        for level in result.level_assignments() {
            prop_assert_eq!(level.len(), n);
            let k = level.iter().copied().max().map_or(0, |m| m + 1) as usize;
            let mut seen = vec![false; k];
            for &m in &level {
                seen[m as usize] = true;
            }
            prop_assert!(seen.into_iter().all(|s| s));
        }
    }

    #[test]
    fn codelength_never_exceeds_one_level(edges in edge_list(20), seed in 0u64..1000) {
        let config = Config::builder().seed(seed).num_trials(2).build().unwrap();
        let result = run(&edges, &config).unwrap();
        prop_assert!(result.codelength <= result.one_level_codelength + 1e-10);
        prop_assert!(result.codelength >= -1e-10);
        let total: f64 = result.node_flow.iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn directed_flow_sums_to_one(edges in edge_list(12), record in any::<bool>()) {
        let directed: Vec<Edge> = edges
            .iter()
            .map(|e| Edge::directed(e.source, e.target, e.weight))
            .collect();
        let config = Config::builder()
            .directed(true)
            .record_teleportation(record)
            .build()
            .unwrap();
        let result = run(&directed, &config).unwrap();
        let total: f64 = result.node_flow.iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert!(result.codelength <= result.one_level_codelength + 1e-10);
    }

    #[test]
    fn same_seed_same_partition(edges in edge_list(16), seed in 0u64..1000) {
        let config = Config::builder().seed(seed).build().unwrap();
        let a = run(&edges, &config).unwrap();
        let b = run(&edges, &config).unwrap();
        prop_assert_eq!(a.codelength, b.codelength);
        prop_assert_eq!(a.level_assignments(), b.level_assignments());
    }
}
