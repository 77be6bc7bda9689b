mod calculate;
mod state;

pub use calculate::{calculate_flow, FlowDiagnostics, Flows};
pub use state::{
    DirectedNonDetailedBalanceFlow, DirectedNonDetailedBalanceWithTeleportationFlow,
    DirectedWithTeleportationFlow, FlowState, SeparateEnterFlow, UndirectedFlow,
};

use crate::network::Network;

pub fn node_states<F: FlowState>(network: &Network, flows: &Flows) -> Vec<F> {
    let teleport_weights = network.teleport_weights();
    let mut states: Vec<F> = (0..network.node_count())
        .map(|i| {
            F::with_node(
                flows.node_flow[i],
                teleport_weights[i],
                flows.dangling_flow[i],
                flows.teleport_source_flow[i],
            )
        })
        .collect();

    for e in 0..network.link_count() {
        let (s, t, _) = network.link(e);
        if s == t {
            continue;
        }
        let f = flows.link_flow[e];
        states[s as usize].on_exit_link(f);
        states[t as usize].on_enter_link(f);
    }

    for state in states.iter_mut() {
        let teleport = state.teleport_exit();
        state.shift_boundary(teleport);
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::network::Edge;
    use approx::assert_relative_eq;

    #[test]
    fn undirected_node_exit_is_neighbour_share() {
        let cfg = Config::builder().build().unwrap();
        let net = Network::from_edges(
            &[
                Edge::undirected(0, 1, 1.0),
                Edge::undirected(1, 2, 1.0),
                Edge::undirected(1, 1, 2.0),
            ],
            &cfg,
        )
        .unwrap();
        let flows = calculate_flow(&net, &cfg).unwrap();
        let states: Vec<UndirectedFlow> = node_states(&net, &flows);
        // total weighted degree 2 * 4 - 2 = 6
        assert_relative_eq!(states[1].flow, 4.0 / 6.0);
        assert_relative_eq!(states[1].exit_flow, 2.0 / 6.0);
        assert_relative_eq!(states[0].exit_flow, 1.0 / 6.0);
    }

    #[test]
    fn directed_enter_and_exit_follow_links() {
        let cfg = Config::builder().rawdir(true).build().unwrap();
        let net = Network::from_edges(
            &[Edge::directed(0, 1, 1.0), Edge::directed(1, 0, 3.0)],
            &cfg,
        )
        .unwrap();
        let flows = calculate_flow(&net, &cfg).unwrap();
        let states: Vec<DirectedNonDetailedBalanceFlow> = node_states(&net, &flows);
        assert_relative_eq!(states[0].exit_flow, 0.25);
        assert_relative_eq!(states[0].enter_flow, 0.75);
    }

    #[test]
    fn recorded_teleportation_adds_teleport_exit() {
        let cfg = Config::builder()
            .directed(true)
            .record_teleportation(true)
            .build()
            .unwrap();
        let net = Network::from_edges(
            &[Edge::directed(0, 1, 1.0), Edge::directed(1, 0, 1.0)],
            &cfg,
        )
        .unwrap();
        let flows = calculate_flow(&net, &cfg).unwrap();
        let states: Vec<DirectedWithTeleportationFlow> = node_states(&net, &flows);
        // flow 0.5, link exit 0.85 * 0.5, teleport exit 0.15 * 0.5 * (1 - 0.5)
        assert_relative_eq!(states[0].exit_flow, 0.425 + 0.0375, epsilon = 1e-9);
    }
}
