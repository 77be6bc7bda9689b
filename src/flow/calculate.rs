use crate::config::{Config, FlowModelKind, FlowStrategy};
use crate::error::{Error, Result};
use crate::network::Network;
use std::collections::VecDeque;
use tracing::{debug, warn};

// Power iteration runs at least this many steps before it may stop early.
const MIN_FLOW_ITERATIONS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowDiagnostics {
    pub converged: bool,
    pub iterations: u32,
    pub residual: f64,
}

impl Default for FlowDiagnostics {
    fn default() -> Self {
        Self {
            converged: true,
            iterations: 0,
            residual: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Flows {
    pub node_flow: Vec<f64>,
    pub link_flow: Vec<f64>,
    pub dangling_flow: Vec<f64>,
    pub teleport_source_flow: Vec<f64>,
    pub diagnostics: FlowDiagnostics,
}

pub fn calculate_flow(network: &Network, config: &Config) -> Result<Flows> {
    let n = network.node_count();
    let m = network.link_count();

    let mut flows = Flows {
        node_flow: vec![0.0; n],
        link_flow: vec![0.0; m],
        dangling_flow: vec![0.0; n],
        teleport_source_flow: vec![0.0; n],
        diagnostics: FlowDiagnostics::default(),
    };
    if n == 0 {
        return Ok(flows);
    }

    let strategy = config.flow_strategy();
    match strategy {
        FlowStrategy::Undirected => undirected(network, &mut flows),
        FlowStrategy::PageRank => page_rank(network, config, &mut flows),
        FlowStrategy::StationaryWalk => stationary_walk(network, config, &mut flows)?,
        FlowStrategy::UndirectedDegree
        | FlowStrategy::OutDegree
        | FlowStrategy::RawWeights => closed_form_directed(network, strategy, &mut flows),
    }

    if !flows.diagnostics.converged {
        warn!(
            iterations = flows.diagnostics.iterations,
            residual = flows.diagnostics.residual,
            "flow calculation did not converge, continuing with approximation"
        );
    }
    debug!(
        ?strategy,
        iterations = flows.diagnostics.iterations,
        "calculated flow"
    );
    Ok(flows)
}

fn out_weights(network: &Network) -> Vec<f64> {
    let mut out_w = vec![0.0; network.node_count()];
    for e in 0..network.link_count() {
        let (s, _, w) = network.link(e);
        out_w[s as usize] += w;
    }
    out_w
}

fn undirected(network: &Network, flows: &mut Flows) {
    let total = 2.0 * network.sum_link_weight() - network.self_link_weight();
    if total <= 0.0 {
        flows.node_flow.copy_from_slice(network.teleport_weights());
        return;
    }

    for e in 0..network.link_count() {
        let (s, t, w) = network.link(e);
        let share = w / total;
        flows.node_flow[s as usize] += share;
        if s != t {
            flows.node_flow[t as usize] += share;
            flows.link_flow[e] = 2.0 * share;
        } else {
            flows.link_flow[e] = share;
        }
    }
}

// Teleported flow as the walk sees it: all of a dangling node's flow, and
// alpha of everything else.
fn set_teleport_source(flows: &mut Flows, out_w: &[f64], alpha: f64) {
    let beta = 1.0 - alpha;
    for i in 0..flows.node_flow.len() {
        let dangling = if out_w[i] > 0.0 { 0.0 } else { flows.node_flow[i] };
        flows.dangling_flow[i] = dangling;
        flows.teleport_source_flow[i] = alpha * flows.node_flow[i] + beta * dangling;
    }
}

fn page_rank(network: &Network, config: &Config, flows: &mut Flows) {
    let n = network.node_count();
    let m = network.link_count();
    let teleport_weights = network.teleport_weights();
    let out_w = out_weights(network);

    // Self-teleportation acts as an extra self-loop on every non-dangling node.
    let self_p = config.self_teleportation_probability().unwrap_or(0.0);
    let self_extra: Vec<f64> = out_w.iter().map(|&w| w * self_p / (1.0 - self_p)).collect();
    let out_total: Vec<f64> = out_w
        .iter()
        .zip(self_extra.iter())
        .map(|(w, x)| w + x)
        .collect();

    let mut transition = vec![0.0f64; m];
    for (e, p) in transition.iter_mut().enumerate() {
        let (s, _, w) = network.link(e);
        *p = w / out_total[s as usize];
    }

    let mut node_flow = teleport_weights.to_vec();
    let mut node_flow_tmp = vec![0.0f64; n];

    let max_iterations = config.max_flow_iterations();
    let tolerance = config.flow_tolerance();
    let mut alpha = config.teleportation_probability();
    let mut beta = 1.0 - alpha;
    let mut iterations = 0u32;
    let mut err = 0.0f64;
    let dangling_rank = loop {
        let old_err = err;

        let dangling_rank: f64 = (0..n)
            .filter(|&i| out_w[i] == 0.0)
            .map(|i| node_flow[i])
            .sum();

        let tele_flow = alpha + beta * dangling_rank;
        for i in 0..n {
            node_flow_tmp[i] = tele_flow * teleport_weights[i];
        }

        for (e, p) in transition.iter().enumerate() {
            let (s, t, _) = network.link(e);
            node_flow_tmp[t as usize] += beta * p * node_flow[s as usize];
        }
        for i in 0..n {
            if self_extra[i] > 0.0 {
                node_flow_tmp[i] += beta * self_extra[i] / out_total[i] * node_flow[i];
            }
        }

        let mut node_flow_diff = -1.0f64;
        err = 0.0;
        for i in 0..n {
            node_flow_diff += node_flow_tmp[i];
            err += (node_flow_tmp[i] - node_flow[i]).abs();
        }

        node_flow.copy_from_slice(&node_flow_tmp);

        if node_flow_diff.abs() > 1.0e-10 {
            let denom = node_flow_diff + 1.0;
            if denom != 0.0 {
                for x in node_flow.iter_mut() {
                    *x /= denom;
                }
            }
        }

        // Nudge alpha when stuck in an oscillating equilibrium.
        if (err - old_err).abs() < 1.0e-17 {
            alpha += 1.0e-12;
            beta = 1.0 - alpha;
        }

        iterations += 1;
        let settled = err <= tolerance && iterations >= MIN_FLOW_ITERATIONS.min(max_iterations);
        if settled || iterations >= max_iterations {
            break dangling_rank;
        }
    };

    flows.diagnostics = FlowDiagnostics {
        converged: err <= tolerance,
        iterations,
        residual: err,
    };

    let alpha = config.teleportation_probability();
    let beta = 1.0 - alpha;

    if config.flow_model() == FlowModelKind::DirectedWithTeleportation {
        for (e, p) in transition.iter().enumerate() {
            let (s, _, _) = network.link(e);
            flows.link_flow[e] = beta * p * node_flow[s as usize];
        }
        flows.node_flow.copy_from_slice(&node_flow);
        set_teleport_source(flows, &out_w, alpha);
        return;
    }

    // Unrecorded teleportation: only link steps are coded.
    let sum_node_rank = if 1.0 - dangling_rank > 0.0 {
        1.0 - dangling_rank
    } else {
        1.0
    };
    let mut total = 0.0;
    for (e, p) in transition.iter().enumerate() {
        let (s, _, _) = network.link(e);
        let f = p * node_flow[s as usize] / sum_node_rank;
        flows.link_flow[e] = f;
        total += f;
    }
    let self_flow: Vec<f64> = (0..n)
        .map(|i| {
            if self_extra[i] > 0.0 {
                self_extra[i] / out_total[i] * node_flow[i] / sum_node_rank
            } else {
                0.0
            }
        })
        .collect();
    total += self_flow.iter().sum::<f64>();

    if total <= 0.0 {
        flows.node_flow.copy_from_slice(&node_flow);
    } else {
        for f in flows.link_flow.iter_mut() {
            *f /= total;
        }
        flows.node_flow.fill(0.0);
        for e in 0..m {
            let (_, t, _) = network.link(e);
            flows.node_flow[t as usize] += flows.link_flow[e];
        }
        for (i, f) in self_flow.iter().enumerate() {
            flows.node_flow[i] += f / total;
        }
    }
    set_teleport_source(flows, &out_w, alpha);
}

fn unreachable_count(network: &Network, out_w: &[f64]) -> usize {
    let n = network.node_count();
    let has_dangling = out_w.iter().any(|&w| w == 0.0);

    let mut forward = vec![false; n];
    let mut queue = VecDeque::new();
    forward[0] = true;
    queue.push_back(0usize);
    while let Some(u) = queue.pop_front() {
        if out_w[u] == 0.0 {
            forward.fill(true);
            queue.clear();
            break;
        }
        for e in network.out_range(u) {
            let (_, t, _) = network.link(e);
            let t = t as usize;
            if !forward[t] {
                forward[t] = true;
                queue.push_back(t);
            }
        }
    }

    let mut backward = vec![false; n];
    backward[0] = true;
    queue.push_back(0);
    if has_dangling {
        for i in 0..n {
            if out_w[i] == 0.0 && !backward[i] {
                backward[i] = true;
                queue.push_back(i);
            }
        }
    }
    while let Some(u) = queue.pop_front() {
        for &e in network.in_links(u) {
            let (s, _, _) = network.link(e as usize);
            let s = s as usize;
            if !backward[s] {
                backward[s] = true;
                queue.push_back(s);
            }
        }
    }

    (0..n).filter(|&i| !(forward[i] && backward[i])).count()
}

fn stationary_walk(network: &Network, config: &Config, flows: &mut Flows) -> Result<()> {
    let n = network.node_count();
    let out_w = out_weights(network);

    let unreachable = unreachable_count(network, &out_w);
    if unreachable > 0 {
        return Err(Error::DisconnectedGraph {
            unreachable,
            nodes: n,
        });
    }

    let uniform = 1.0 / n as f64;
    let mut node_flow = vec![uniform; n];
    let mut next = vec![0.0f64; n];
    let max_iterations = config.max_flow_iterations();
    let tolerance = config.flow_tolerance();
    let mut iterations = 0u32;
    let mut err;

    // Lazy walk: same stationary distribution, no periodic oscillation.
    loop {
        let dangling_rank: f64 = (0..n)
            .filter(|&i| out_w[i] == 0.0)
            .map(|i| node_flow[i])
            .sum();
        let spread = dangling_rank * uniform;
        for i in 0..n {
            next[i] = 0.5 * node_flow[i] + 0.5 * spread;
        }
        for e in 0..network.link_count() {
            let (s, t, w) = network.link(e);
            let s = s as usize;
            next[t as usize] += 0.5 * node_flow[s] * w / out_w[s];
        }

        let sum: f64 = next.iter().sum();
        err = 0.0;
        for i in 0..n {
            next[i] /= sum;
            err += (next[i] - node_flow[i]).abs();
        }
        std::mem::swap(&mut node_flow, &mut next);

        iterations += 1;
        if err <= tolerance || iterations >= max_iterations {
            break;
        }
    }

    flows.diagnostics = FlowDiagnostics {
        converged: err <= tolerance,
        iterations,
        residual: err,
    };

    for e in 0..network.link_count() {
        let (s, _, w) = network.link(e);
        let s = s as usize;
        flows.link_flow[e] = node_flow[s] * w / out_w[s];
    }
    flows.node_flow.copy_from_slice(&node_flow);
    set_teleport_source(flows, &out_w, 0.0);
    Ok(())
}

fn closed_form_directed(network: &Network, strategy: FlowStrategy, flows: &mut Flows) {
    let n = network.node_count();
    let total = network.sum_link_weight();
    let out_w = out_weights(network);

    if total <= 0.0 {
        flows.node_flow.copy_from_slice(network.teleport_weights());
        set_teleport_source(flows, &out_w, 0.0);
        return;
    }

    let mut in_w = vec![0.0f64; n];
    for e in 0..network.link_count() {
        let (_, t, w) = network.link(e);
        in_w[t as usize] += w;
        flows.link_flow[e] = w / total;
    }

    for i in 0..n {
        flows.node_flow[i] = match strategy {
            FlowStrategy::UndirectedDegree => (out_w[i] + in_w[i]) / (2.0 * total),
            FlowStrategy::OutDegree => out_w[i] / total,
            _ => in_w[i] / total,
        };
    }
    set_teleport_source(flows, &out_w, 0.0);
}
