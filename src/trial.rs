use crate::aggregate::SearchContext;
use crate::config::{Config, FlowModelKind};
use crate::error::{Error, Result};
use crate::flow::{
    self, DirectedNonDetailedBalanceFlow, DirectedNonDetailedBalanceWithTeleportationFlow,
    DirectedWithTeleportationFlow, FlowDiagnostics, FlowState, Flows, UndirectedFlow,
};
use crate::hierarchy::HierarchyTree;
use crate::level::LevelNetwork;
use crate::network::Network;
use crate::objective::one_level_codelength;
use crate::rng::{seed_for_trial, TrialRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Cooperative stop flag, shared between the caller and running trials.
///
/// Searches check it before every sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Best hierarchy over all completed trials.
#[derive(Debug, Clone)]
pub struct ClusterResult {
    pub tree: HierarchyTree,
    pub codelength: f64,
    pub one_level_codelength: f64,
    /// Codelength of every completed trial, in trial order.
    pub trial_codelengths: Vec<f64>,
    pub best_trial: u32,
    /// Root term first, then the sum over the modules of each depth.
    pub level_codelengths: Vec<f64>,
    pub flow_diagnostics: FlowDiagnostics,
    /// Some trials were cut short by the cancel token.
    pub cancelled: bool,
    /// Input id of every node, by dense index.
    pub node_ids: Vec<u32>,
    pub node_flow: Vec<f64>,
    /// Flow on every network link, indexed like [`Network::link`].
    pub link_flow: Vec<f64>,
}

impl ClusterResult {
    /// Module of every node per level, level 0 being the top modules.
    pub fn level_assignments(&self) -> Vec<Vec<u32>> {
        self.tree.level_assignments()
    }

    pub fn num_top_modules(&self) -> usize {
        self.tree.top_modules().len()
    }

    pub fn num_levels(&self) -> usize {
        self.tree.depth() + 1
    }
}

struct TrialOutcome {
    tree: HierarchyTree,
    codelength: f64,
}

/// Runs the configured number of seeded trials over one network.
pub struct TrialRunner<'a> {
    network: &'a Network,
    config: &'a Config,
    cancel: CancelToken,
    on_trial: Option<&'a (dyn Fn(u32, f64) + Sync)>,
}

impl<'a> TrialRunner<'a> {
    pub fn new(network: &'a Network, config: &'a Config) -> Self {
        Self {
            network,
            config,
            cancel: CancelToken::new(),
            on_trial: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Call `f(trial, codelength)` as each trial completes, from the thread
    /// that ran it.
    pub fn on_trial_finished(mut self, f: &'a (dyn Fn(u32, f64) + Sync)) -> Self {
        self.on_trial = Some(f);
        self
    }

    pub fn run(&self) -> Result<ClusterResult> {
        let flows = flow::calculate_flow(self.network, self.config)?;
        match self.config.flow_model() {
            FlowModelKind::Undirected => self.run_variant::<UndirectedFlow>(flows),
            FlowModelKind::DirectedWithTeleportation => {
                self.run_variant::<DirectedWithTeleportationFlow>(flows)
            }
            FlowModelKind::DirectedNonDetailedBalance => {
                self.run_variant::<DirectedNonDetailedBalanceFlow>(flows)
            }
            FlowModelKind::DirectedNonDetailedBalanceWithTeleportation => {
                self.run_variant::<DirectedNonDetailedBalanceWithTeleportationFlow>(flows)
            }
        }
    }

    fn run_variant<F: FlowState>(&self, flows: Flows) -> Result<ClusterResult> {
        let states = flow::node_states::<F>(self.network, &flows);
        let leaf = LevelNetwork::from_network(self.network, states, &flows.link_flow);
        let one_level = one_level_codelength(leaf.nodes());

        let trials = self.config.num_trials();
        let threads = resolve_trial_threads(trials, self.config.trial_threads());
        let run_one = |trial: u32| self.single_trial(&leaf, trial);

        // Results come back in trial order whatever the scheduling.
        let outcomes: Vec<Result<TrialOutcome>> = if threads == 1 {
            (0..trials).map(run_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            pool.install(|| (0..trials).into_par_iter().map(run_one).collect())
        };

        let mut best: Option<(u32, TrialOutcome)> = None;
        let mut trial_codelengths = Vec::with_capacity(trials as usize);
        let mut cancelled = false;
        for (trial, outcome) in (0..trials).zip(outcomes) {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(Error::Cancelled) => {
                    cancelled = true;
                    continue;
                }
                Err(e) => return Err(e),
            };
            trial_codelengths.push(outcome.codelength);
            let better = best
                .as_ref()
                .map_or(true, |(_, b)| outcome.codelength < b.codelength);
            if better {
                best = Some((trial, outcome));
            }
        }

        let Some((best_trial, outcome)) = best else {
            warn!("cancelled before any trial completed");
            return Err(Error::Cancelled);
        };
        if cancelled {
            warn!(
                completed = trial_codelengths.len(),
                trials, "cancelled, returning best completed trial"
            );
        }

        let mut tree = outcome.tree;
        tree.sort_by_flow(&flows.node_flow);
        let level_codelengths = tree.level_codelengths(&leaf, 0.0);
        let codelength: f64 = level_codelengths.iter().sum();
        info!(
            best_trial,
            codelength,
            one_level_codelength = one_level,
            top_modules = tree.top_modules().len(),
            levels = tree.depth() + 1,
            "selected best trial"
        );

        Ok(ClusterResult {
            tree,
            codelength,
            one_level_codelength: one_level,
            trial_codelengths,
            best_trial,
            level_codelengths,
            flow_diagnostics: flows.diagnostics,
            cancelled,
            node_ids: self.network.node_ids().to_vec(),
            node_flow: flows.node_flow,
            link_flow: flows.link_flow,
        })
    }

    fn single_trial<F: FlowState>(&self, leaf: &LevelNetwork<F>, trial: u32) -> Result<TrialOutcome> {
        let mut rng = TrialRng::new(seed_for_trial(self.config.seed(), trial));
        let mut ctx = SearchContext::new(self.config, &mut rng, &self.cancel);
        let tree = ctx.find_hierarchy(leaf)?;
        let codelength = tree.codelength(leaf, 0.0);
        info!(
            trial,
            codelength,
            top_modules = tree.top_modules().len(),
            levels = tree.depth() + 1,
            "trial finished"
        );
        if let Some(f) = self.on_trial {
            f(trial, codelength);
        }
        Ok(TrialOutcome { tree, codelength })
    }
}

fn resolve_trial_threads(trials: u32, requested: Option<usize>) -> usize {
    let threads = match requested {
        Some(n) => n,
        None if trials == 1 => 1,
        None => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    };
    threads.min(trials as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Edge;

    fn two_triangles() -> Vec<Edge> {
        vec![
            Edge::undirected(0, 1, 1.0),
            Edge::undirected(1, 2, 1.0),
            Edge::undirected(2, 0, 1.0),
            Edge::undirected(3, 4, 1.0),
            Edge::undirected(4, 5, 1.0),
            Edge::undirected(5, 3, 1.0),
            Edge::undirected(2, 3, 1.0),
        ]
    }

    #[test]
    fn token_flips_once() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(token.check().is_ok());
        shared.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn thread_count_is_capped_by_trials() {
        assert_eq!(resolve_trial_threads(1, None), 1);
        assert_eq!(resolve_trial_threads(3, Some(8)), 3);
        assert_eq!(resolve_trial_threads(4, Some(0)), 1);
        assert!(resolve_trial_threads(4, None) >= 1);
    }

    #[test]
    fn best_trial_is_never_worse_than_any_trial() {
        let cfg = Config::builder().num_trials(4).build().unwrap();
        let net = Network::from_edges(&two_triangles(), &cfg).unwrap();
        let result = TrialRunner::new(&net, &cfg).run().unwrap();
        assert_eq!(result.trial_codelengths.len(), 4);
        for &cl in &result.trial_codelengths {
            assert!(result.codelength <= cl + 1e-12);
        }
        assert!(!result.cancelled);
        assert_eq!(result.num_top_modules(), 2);
        assert_eq!(result.node_ids, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn cancel_after_first_trial_keeps_it() {
        let cfg = Config::builder()
            .num_trials(3)
            .trial_threads(Some(1))
            .build()
            .unwrap();
        let net = Network::from_edges(&two_triangles(), &cfg).unwrap();
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        let stop = move |_: u32, _: f64| trip.cancel();
        let result = TrialRunner::new(&net, &cfg)
            .with_cancel(cancel)
            .on_trial_finished(&stop)
            .run()
            .unwrap();
        assert!(result.cancelled);
        assert_eq!(result.trial_codelengths.len(), 1);
        assert_eq!(result.best_trial, 0);
        assert_eq!(result.num_top_modules(), 2);
    }

    #[test]
    fn pre_cancelled_run_fails() {
        let cfg = Config::builder().num_trials(2).build().unwrap();
        let net = Network::from_edges(&two_triangles(), &cfg).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = TrialRunner::new(&net, &cfg)
            .with_cancel(cancel)
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
