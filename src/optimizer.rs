use crate::config::Config;
use crate::error::Result;
use crate::flow::FlowState;
use crate::level::LevelNetwork;
use crate::objective::{DeltaFlow, MapEquation};
use crate::rng::TrialRng;
use crate::trial::CancelToken;

const MIN_SINGLE_NODE_IMPROVEMENT: f64 = 1e-16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchState {
    Initialized,
    Searching,
    Converged,
}

#[derive(Debug, Clone)]
pub(crate) struct LevelPartition<F> {
    pub assignment: Vec<u32>,
    pub modules: Vec<F>,
    pub codelength: f64,
    pub index_codelength: f64,
}

impl<F> LevelPartition<F> {
    pub(crate) fn module_count(&self) -> usize {
        self.modules.len()
    }
}

pub(crate) fn loop_limit(config: &Config, rng: &mut TrialRng) -> u32 {
    let limit = config.core_loop_limit();
    if config.randomize_core_loop_limit() && limit > 0 {
        (rng.next_f64() * limit as f64) as u32 + 1
    } else {
        limit
    }
}

pub(crate) struct LocalSearch<'a, F> {
    network: &'a LevelNetwork<F>,
    objective: MapEquation<F>,
    node_module: Vec<u32>,
    modules: Vec<F>,
    module_members: Vec<u32>,
    // Candidate empty module is always the back of this stack.
    empty_modules: Vec<u32>,
    state: SearchState,
    sweep_codelengths: Vec<f64>,

    node_order: Vec<u32>,
    redirect: Vec<u32>,
    cand_modules: Vec<u32>,
    cand_delta_exit: Vec<f64>,
    cand_delta_enter: Vec<f64>,
    cand_order: Vec<u32>,
}

impl<'a, F: FlowState> LocalSearch<'a, F> {
    pub(crate) fn new(network: &'a LevelNetwork<F>, exit_network_flow: f64) -> Self {
        let n = network.node_count();
        let modules = network.nodes().to_vec();
        let mut objective = MapEquation::new(network.node_flow_log_node_flow(), exit_network_flow);
        objective.init_partition(&modules);

        Self {
            network,
            objective,
            node_module: (0..n as u32).collect(),
            modules,
            module_members: vec![1; n],
            empty_modules: Vec::with_capacity(n),
            state: SearchState::Initialized,
            sweep_codelengths: Vec::new(),
            node_order: vec![0; n],
            redirect: vec![u32::MAX; n],
            cand_modules: Vec::new(),
            cand_delta_exit: Vec::new(),
            cand_delta_enter: Vec::new(),
            cand_order: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn codelength(&self) -> f64 {
        self.objective.codelength
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> SearchState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn sweep_codelengths(&self) -> &[f64] {
        &self.sweep_codelengths
    }

    pub(crate) fn move_to_predefined(&mut self, assignment: &[u32]) {
        debug_assert_eq!(assignment.len(), self.network.node_count());
        for (node, &module) in assignment.iter().enumerate() {
            self.move_node(node, module);
        }
    }

    fn move_node(&mut self, node_idx: usize, new_module: u32) {
        let old_module = self.node_module[node_idx];
        if old_module == new_module {
            return;
        }

        let mut old_delta = DeltaFlow::new(old_module);
        let mut new_delta = DeltaFlow::new(new_module);
        for (nbr, flow) in self.network.out_links(node_idx) {
            let m = self.node_module[nbr as usize];
            if m == old_module {
                old_delta.delta_exit += flow;
            } else if m == new_module {
                new_delta.delta_exit += flow;
            }
        }
        for (nbr, flow) in self.network.in_links(node_idx) {
            let m = self.node_module[nbr as usize];
            if m == old_module {
                old_delta.delta_enter += flow;
            } else if m == new_module {
                new_delta.delta_enter += flow;
            }
        }

        let current = self.network.nodes()[node_idx];
        old_delta.delta_exit += current.teleport_delta_old(&self.modules[old_module as usize]);
        new_delta.delta_exit += current.teleport_delta_new(&self.modules[new_module as usize]);

        self.apply_move(node_idx, &current, &old_delta, &new_delta);
    }

    fn apply_move(&mut self, node_idx: usize, current: &F, old_delta: &DeltaFlow, new_delta: &DeltaFlow) {
        let old_module = old_delta.module as usize;
        let new_module = new_delta.module as usize;

        if self.module_members[new_module] == 0 {
            // The target may come from anywhere in a predefined move.
            if let Some(pos) = self.empty_modules.iter().rposition(|&m| m as usize == new_module) {
                self.empty_modules.remove(pos);
            }
        }
        if self.module_members[old_module] == 1 {
            self.empty_modules.push(old_module as u32);
        }

        self.objective
            .update_on_move(current, old_delta, new_delta, &mut self.modules);

        self.module_members[old_module] -= 1;
        self.module_members[new_module] += 1;
        self.node_module[node_idx] = new_module as u32;
    }

    #[inline]
    fn add_candidate(&mut self, module: u32, delta_exit: f64, delta_enter: f64) {
        let m = module as usize;
        if self.redirect[m] == u32::MAX {
            self.redirect[m] = self.cand_modules.len() as u32;
            self.cand_modules.push(module);
            self.cand_delta_exit.push(delta_exit);
            self.cand_delta_enter.push(delta_enter);
        } else {
            let idx = self.redirect[m] as usize;
            self.cand_delta_exit[idx] += delta_exit;
            self.cand_delta_enter[idx] += delta_enter;
        }
    }

    fn sweep(&mut self, rng: &mut TrialRng) -> u32 {
        let network = self.network;
        let mut node_order = std::mem::take(&mut self.node_order);
        rng.randomized_index_vector(&mut node_order);

        let mut moved = 0u32;
        for &node_u32 in node_order.iter() {
            let node_idx = node_u32 as usize;
            if !network.has_links(node_idx) {
                continue;
            }
            let current_module = self.node_module[node_idx];

            self.cand_modules.clear();
            self.cand_delta_exit.clear();
            self.cand_delta_enter.clear();

            for (nbr, flow) in network.out_links(node_idx) {
                let m = self.node_module[nbr as usize];
                self.add_candidate(m, flow, 0.0);
            }
            for (nbr, flow) in network.in_links(node_idx) {
                let m = self.node_module[nbr as usize];
                self.add_candidate(m, 0.0, flow);
            }
            self.add_candidate(current_module, 0.0, 0.0);
            if self.module_members[current_module as usize] > 1 {
                if let Some(&empty) = self.empty_modules.last() {
                    self.add_candidate(empty, 0.0, 0.0);
                }
            }

            let current = network.nodes()[node_idx];
            let old_idx = self.redirect[current_module as usize] as usize;
            let mut old_delta = DeltaFlow {
                module: current_module,
                delta_exit: self.cand_delta_exit[old_idx],
                delta_enter: self.cand_delta_enter[old_idx],
            };
            old_delta.delta_exit += current.teleport_delta_old(&self.modules[current_module as usize]);
            let context = self
                .objective
                .prepare_move_context(&current, &old_delta, &self.modules);

            // Ascending module id, so the first of equally good moves wins.
            self.cand_order.clear();
            self.cand_order.extend(0..self.cand_modules.len() as u32);
            let cand_modules = &self.cand_modules;
            self.cand_order
                .sort_unstable_by_key(|&c| cand_modules[c as usize]);

            let mut best_delta = old_delta;
            let mut best_codelength_delta = 0.0f64;
            for &c in self.cand_order.iter() {
                let cidx = c as usize;
                let module = self.cand_modules[cidx];
                if module == current_module {
                    continue;
                }
                let mut cand = DeltaFlow {
                    module,
                    delta_exit: self.cand_delta_exit[cidx],
                    delta_enter: self.cand_delta_enter[cidx],
                };
                cand.delta_exit += current.teleport_delta_new(&self.modules[module as usize]);

                let delta = self
                    .objective
                    .delta_on_move_with_context(&context, &cand, &self.modules);
                if delta < best_codelength_delta - MIN_SINGLE_NODE_IMPROVEMENT {
                    best_delta = cand;
                    best_codelength_delta = delta;
                }
            }

            for &m in self.cand_modules.iter() {
                self.redirect[m as usize] = u32::MAX;
            }

            if best_delta.module != current_module {
                self.apply_move(node_idx, &current, &old_delta, &best_delta);
                moved += 1;
            }
        }

        self.node_order = node_order;
        moved
    }

    pub(crate) fn run(
        &mut self,
        rng: &mut TrialRng,
        loop_limit: u32,
        min_improvement: f64,
        cancel: &CancelToken,
    ) -> Result<u32> {
        if self.network.node_count() == 0 {
            self.state = SearchState::Converged;
            return Ok(0);
        }
        self.state = SearchState::Searching;

        let mut sweeps = 0u32;
        let mut improving = 0u32;
        let mut old_codelength = self.objective.codelength;
        loop {
            cancel.check()?;
            sweeps += 1;

            let moved = self.sweep(rng);
            self.sweep_codelengths.push(self.objective.codelength);

            if moved == 0 || self.objective.codelength >= old_codelength - min_improvement {
                break;
            }
            improving += 1;
            old_codelength = self.objective.codelength;

            if sweeps == loop_limit {
                break;
            }
        }

        self.state = SearchState::Converged;
        Ok(improving)
    }

    pub(crate) fn into_partition(self) -> LevelPartition<F> {
        debug_assert_ne!(self.state, SearchState::Searching);
        let mut relabel = vec![u32::MAX; self.modules.len()];
        let mut modules = Vec::new();
        let mut assignment = Vec::with_capacity(self.node_module.len());
        for &m in &self.node_module {
            let slot = &mut relabel[m as usize];
            if *slot == u32::MAX {
                *slot = modules.len() as u32;
                modules.push(self.modules[m as usize]);
            }
            assignment.push(*slot);
        }

        LevelPartition {
            assignment,
            modules,
            codelength: self.objective.codelength,
            index_codelength: self.objective.index_codelength,
        }
    }
}
