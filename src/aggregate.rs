use crate::config::Config;
use crate::error::Result;
use crate::flow::FlowState;
use crate::hierarchy::{Child, HierarchyTree};
use crate::level::{module_count, LevelNetwork};
use crate::objective::{one_level_codelength, plogp, MapEquation};
use crate::optimizer::{loop_limit, LevelPartition, LocalSearch};
use crate::rng::TrialRng;
use crate::trial::CancelToken;
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub(crate) struct ModuleLevel<F> {
    pub modules: LevelNetwork<F>,
    pub codelength: f64,
    pub index_codelength: f64,
}

impl<F: FlowState> ModuleLevel<F> {
    fn from_assignment(network: &LevelNetwork<F>, exit_network_flow: f64, assignment: &[u32]) -> Self {
        let states = network.module_states(assignment, module_count(assignment));
        let mut objective = MapEquation::new(network.node_flow_log_node_flow(), exit_network_flow);
        objective.init_partition(&states);
        Self {
            modules: network.consolidate(assignment, &states),
            codelength: objective.codelength,
            index_codelength: objective.index_codelength,
        }
    }

    fn from_partition(network: &LevelNetwork<F>, partition: LevelPartition<F>) -> Self {
        Self {
            modules: network.consolidate(&partition.assignment, &partition.modules),
            codelength: partition.codelength,
            index_codelength: partition.index_codelength,
        }
    }

    pub(crate) fn module_count(&self) -> usize {
        self.modules.node_count()
    }
}

pub(crate) struct SearchContext<'a> {
    config: &'a Config,
    rng: &'a mut TrialRng,
    cancel: &'a CancelToken,
}

impl<'a> SearchContext<'a> {
    pub(crate) fn new(config: &'a Config, rng: &'a mut TrialRng, cancel: &'a CancelToken) -> Self {
        Self { config, rng, cancel }
    }

    fn optimize<F: FlowState>(
        &mut self,
        network: &LevelNetwork<F>,
        exit_network_flow: f64,
        predefined: Option<&[u32]>,
    ) -> Result<LevelPartition<F>> {
        let mut search = LocalSearch::new(network, exit_network_flow);
        if let Some(assignment) = predefined {
            search.move_to_predefined(assignment);
        }
        let limit = loop_limit(self.config, self.rng);
        let improving = search.run(
            self.rng,
            limit,
            self.config.minimum_codelength_improvement(),
            self.cancel,
        )?;
        trace!(
            nodes = network.node_count(),
            improving_sweeps = improving,
            codelength = search.codelength(),
            "local search"
        );
        Ok(search.into_partition())
    }

    fn merge_and_consolidate<F: FlowState>(
        &mut self,
        network: &LevelNetwork<F>,
        exit_network_flow: f64,
        predefined: Option<&[u32]>,
    ) -> Result<ModuleLevel<F>> {
        let min_improvement = self.config.minimum_codelength_improvement();
        let aggregation_limit = self.config.level_aggregation_limit();

        let partition = self.optimize(network, exit_network_flow, predefined)?;
        let mut current = ModuleLevel::from_partition(network, partition);
        let mut levels = 1u32;

        while current.module_count() > 1
            && (aggregation_limit == 0 || levels < aggregation_limit)
        {
            let partition = self.optimize(&current.modules, exit_network_flow, None)?;
            if partition.module_count() == current.module_count()
                || partition.codelength >= current.codelength - min_improvement
            {
                break;
            }
            current = ModuleLevel::from_partition(&current.modules, partition);
            levels += 1;
            debug!(
                level = levels,
                modules = current.module_count(),
                codelength = current.codelength,
                "consolidated level"
            );
        }
        Ok(current)
    }

    pub(crate) fn partition<F: FlowState>(
        &mut self,
        network: &LevelNetwork<F>,
        exit_network_flow: f64,
        recursive_count: u32,
        fast: bool,
    ) -> Result<ModuleLevel<F>> {
        let n = network.node_count();
        if n <= 1 {
            return Ok(ModuleLevel::from_assignment(network, exit_network_flow, &vec![0; n]));
        }

        let initial_codelength = LocalSearch::new(network, exit_network_flow).codelength();
        let mut current = self.merge_and_consolidate(network, exit_network_flow, None)?;

        let tune_limit = self.config.tune_iteration_limit();
        if !fast && tune_limit != 1 && is_non_trivial(current.module_count(), n) {
            current = self.tune(network, exit_network_flow, current, initial_codelength)?;
        }

        if !fast && recursive_count > 0 && is_non_trivial(current.module_count(), n) {
            let (fine, _) = self.partition_each_module(network, &current, recursive_count - 1, false)?;
            current = ModuleLevel::from_assignment(network, exit_network_flow, &fine);
        }
        Ok(current)
    }

    // Alternate fine and coarse tuning until an iteration stops paying off.
    fn tune<F: FlowState>(
        &mut self,
        network: &LevelNetwork<F>,
        exit_network_flow: f64,
        mut current: ModuleLevel<F>,
        initial_codelength: f64,
    ) -> Result<ModuleLevel<F>> {
        let tune_limit = self.config.tune_iteration_limit();
        let min_improvement = self.config.minimum_codelength_improvement();
        let min_relative = self.config.minimum_relative_tune_iteration_improvement();
        let coarse_tune_level = self.config.coarse_tune_level();

        let mut coarse_level = coarse_tune_level - 1;
        let mut do_fine_tune = true;
        let mut iteration = 0u32;
        while current.module_count() > 1 {
            iteration += 1;
            if iteration == tune_limit {
                break;
            }
            let old_codelength = current.codelength;

            let candidate = if do_fine_tune {
                self.fine_tune(network, exit_network_flow, &current)?
            } else {
                let recursive_count = if self.config.alternate_coarse_tune_level() {
                    coarse_level += 1;
                    coarse_level % coarse_tune_level
                } else {
                    coarse_tune_level - 1
                };
                self.coarse_tune(network, exit_network_flow, &current, recursive_count)?
            };
            let accepted = candidate.codelength < current.codelength;
            if accepted {
                current = candidate;
            }
            debug!(
                iteration,
                fine = do_fine_tune,
                modules = current.module_count(),
                codelength = current.codelength,
                "tune iteration"
            );

            if !accepted
                || current.codelength > old_codelength - initial_codelength * min_relative
                || current.codelength > old_codelength - min_improvement
            {
                break;
            }
            do_fine_tune = !do_fine_tune;
        }
        Ok(current)
    }

    fn fine_tune<F: FlowState>(
        &mut self,
        network: &LevelNetwork<F>,
        exit_network_flow: f64,
        current: &ModuleLevel<F>,
    ) -> Result<ModuleLevel<F>> {
        let assignment = current.modules.assignment_to_leaves(network.node_count());
        self.merge_and_consolidate(network, exit_network_flow, Some(&assignment))
    }

    fn coarse_tune<F: FlowState>(
        &mut self,
        network: &LevelNetwork<F>,
        exit_network_flow: f64,
        current: &ModuleLevel<F>,
        recursive_count: u32,
    ) -> Result<ModuleLevel<F>> {
        let fast = self.config.fast_coarse_tune_partition();
        let (fine, sub_to_old) = self.partition_each_module(network, current, recursive_count, fast)?;
        let states = network.module_states(&fine, sub_to_old.len());
        let sub_modules = network.consolidate(&fine, &states);
        self.merge_and_consolidate(&sub_modules, exit_network_flow, Some(&sub_to_old))
    }

    fn partition_each_module<F: FlowState>(
        &mut self,
        network: &LevelNetwork<F>,
        current: &ModuleLevel<F>,
        recursive_count: u32,
        fast: bool,
    ) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut fine = vec![0u32; network.node_count()];
        let mut sub_to_old: Vec<u32> = Vec::with_capacity(current.module_count());

        for module in 0..current.module_count() {
            let members = current.modules.members(module);
            let offset = sub_to_old.len() as u32;
            if members.len() < 2 {
                for &leaf in members {
                    fine[leaf as usize] = offset;
                }
                sub_to_old.push(module as u32);
                continue;
            }

            let sub_network = network.induced_subnetwork(members);
            let module_exit = current.modules.nodes()[module].exit_flow();
            let sub = self.partition(&sub_network, module_exit, recursive_count, fast)?;
            let local = sub.modules.assignment_to_leaves(members.len());
            for (&leaf, &m) in members.iter().zip(&local) {
                fine[leaf as usize] = offset + m;
            }
            sub_to_old.extend(std::iter::repeat(module as u32).take(sub.module_count()));
        }
        Ok((fine, sub_to_old))
    }

    pub(crate) fn find_super_modules<F: FlowState>(
        &mut self,
        current: &ModuleLevel<F>,
    ) -> Result<Vec<Vec<u32>>> {
        let min_improvement = self.config.minimum_codelength_improvement();
        let mut layers = Vec::new();
        let mut modules = current.modules.clone();
        let mut index_codelength = current.index_codelength;
        let mut non_trivial = modules.node_count();

        while modules.node_count() > 1 && non_trivial > 1 {
            let super_network = modules.with_flow_as_enter_flow();
            let n = super_network.node_count();
            let found = self.partition(&super_network, 0.0, 0, false)?;
            let k = found.module_count();
            if !is_non_trivial(k, n) || found.codelength >= index_codelength - min_improvement {
                break;
            }

            let assignment = found.modules.assignment_to_leaves(n);
            non_trivial = (0..k).filter(|&m| found.modules.members(m).len() > 1).count();
            let states = modules.module_states(&assignment, k);
            modules = modules.consolidate(&assignment, &states);
            debug!(
                modules = k,
                index_codelength = found.codelength,
                saved = index_codelength - found.codelength,
                "super level"
            );
            index_codelength = found.index_codelength;
            layers.push(assignment);
        }
        Ok(layers)
    }

    pub(crate) fn find_sub_modules<F: FlowState>(
        &mut self,
        tree: &mut HierarchyTree,
        leaf_network: &LevelNetwork<F>,
    ) -> Result<()> {
        let min_improvement = self.config.minimum_codelength_improvement();
        let mut queue: VecDeque<u32> = (0..tree.module_count() as u32)
            .filter(|&m| tree.module(m).is_bottom())
            .collect();

        while !queue.is_empty() {
            self.cancel.check()?;
            // One snapshot of module flow per queue level.
            let states = tree.module_states(leaf_network);
            let mut next = VecDeque::new();

            while let Some(module) = queue.pop_front() {
                let members: Vec<u32> = tree
                    .module(module)
                    .children
                    .iter()
                    .filter_map(|c| match *c {
                        Child::Leaf(l) => Some(l),
                        Child::Module(_) => None,
                    })
                    .collect();
                if members.len() <= 2 {
                    continue;
                }

                let sub_network = leaf_network.induced_subnetwork(&members);
                let exit = states[module as usize].exit_flow();
                let found = self.partition(&sub_network, exit, 0, false)?;
                if !is_non_trivial(found.module_count(), members.len()) {
                    continue;
                }

                let bottom = found.modules.assignment_to_leaves(members.len());
                let layers = self.find_super_modules(&found)?;
                let sub_tree = HierarchyTree::from_layers(members.len(), &bottom, &layers);
                let new_codelength = sub_tree.codelength(&sub_network, exit);

                let flow: f64 = members
                    .iter()
                    .map(|&l| leaf_network.nodes()[l as usize].flow())
                    .sum();
                let old_codelength =
                    plogp(exit + flow) - plogp(exit) - sub_network.node_flow_log_node_flow();
                if new_codelength >= old_codelength - min_improvement {
                    continue;
                }

                debug!(
                    module,
                    leaves = members.len(),
                    sub_modules = found.module_count(),
                    saved = old_codelength - new_codelength,
                    "split bottom module"
                );
                next.extend(tree.graft(module, &sub_tree, &members));
            }
            queue = next;
        }
        Ok(())
    }

    pub(crate) fn find_hierarchy<F: FlowState>(
        &mut self,
        leaf_network: &LevelNetwork<F>,
    ) -> Result<HierarchyTree> {
        let n = leaf_network.node_count();
        if n <= 1 {
            return Ok(HierarchyTree::single_module(n));
        }

        let top = self.partition(leaf_network, 0.0, 0, false)?;
        let bottom = top.modules.assignment_to_leaves(n);
        debug!(
            modules = top.module_count(),
            codelength = top.codelength,
            "two-level partition"
        );

        let mut tree = if self.config.two_level() || top.module_count() <= 1 {
            HierarchyTree::from_layers(n, &bottom, &[])
        } else {
            let layers = self.find_super_modules(&top)?;
            let mut tree = HierarchyTree::from_layers(n, &bottom, &layers);
            self.find_sub_modules(&mut tree, leaf_network)?;
            tree
        };

        let one_level = one_level_codelength(leaf_network.nodes());
        if tree.codelength(leaf_network, 0.0)
            >= one_level - self.config.minimum_codelength_improvement()
        {
            tree = HierarchyTree::single_module(n);
        }
        Ok(tree)
    }
}

#[inline]
fn is_non_trivial(module_count: usize, node_count: usize) -> bool {
    module_count > 1 && module_count < node_count
}
