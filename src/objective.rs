use crate::flow::FlowState;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaFlow {
    pub module: u32,
    pub delta_exit: f64,
    pub delta_enter: f64,
}

impl DeltaFlow {
    pub fn new(module: u32) -> Self {
        Self {
            module,
            delta_exit: 0.0,
            delta_enter: 0.0,
        }
    }

    #[inline]
    fn boundary(&self) -> f64 {
        self.delta_exit + self.delta_enter
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MoveDeltaContext {
    // Old-module terms reused across all candidate destinations of one node.
    de_old: f64,
    current_flow: f64,
    current_enter_flow: f64,
    current_exit_flow: f64,
    old_enter_before: f64,
    old_enter_after: f64,
    old_exit_before: f64,
    old_exit_after: f64,
    old_total_before: f64,
    old_total_after: f64,
}

#[inline]
pub fn plogp(p: f64) -> f64 {
    if p > 0.0 {
        p * p.log2()
    } else {
        0.0
    }
}

pub fn node_flow_log_node_flow<F: FlowState>(nodes: &[F]) -> f64 {
    nodes.iter().map(|n| plogp(n.flow())).sum()
}

pub fn one_level_codelength<F: FlowState>(nodes: &[F]) -> f64 {
    -node_flow_log_node_flow(nodes)
}

pub fn codelength<F: FlowState>(
    node_flow_log_node_flow: f64,
    modules: &[F],
    exit_network_flow: f64,
) -> f64 {
    let mut objective = MapEquation::new(node_flow_log_node_flow, exit_network_flow);
    objective.init_partition(modules);
    objective.codelength
}

#[derive(Debug, Clone)]
pub struct MapEquation<F> {
    pub codelength: f64,
    pub index_codelength: f64,
    pub module_codelength: f64,

    node_flow_log_node_flow: f64,
    flow_log_flow: f64,
    exit_log_exit: f64,
    enter_log_enter: f64,
    enter_flow: f64,
    enter_flow_log_enter_flow: f64,

    exit_network_flow: f64,
    exit_network_flow_log_exit_network_flow: f64,
    _state: PhantomData<F>,
}

impl<F: FlowState> MapEquation<F> {
    pub fn new(node_flow_log_node_flow: f64, exit_network_flow: f64) -> Self {
        Self {
            codelength: 0.0,
            index_codelength: 0.0,
            module_codelength: 0.0,
            node_flow_log_node_flow,
            flow_log_flow: 0.0,
            exit_log_exit: 0.0,
            enter_log_enter: 0.0,
            enter_flow: 0.0,
            enter_flow_log_enter_flow: 0.0,
            exit_network_flow,
            exit_network_flow_log_exit_network_flow: plogp(exit_network_flow),
            _state: PhantomData,
        }
    }

    pub fn init_partition(&mut self, modules: &[F]) {
        self.flow_log_flow = 0.0;
        self.exit_log_exit = 0.0;
        self.enter_log_enter = 0.0;
        self.enter_flow = self.exit_network_flow;

        for d in modules {
            self.flow_log_flow += plogp(d.flow() + d.exit_flow());
            self.enter_log_enter += plogp(d.enter_flow());
            self.exit_log_exit += plogp(d.exit_flow());
            self.enter_flow += d.enter_flow();
        }

        self.refresh();
    }

    fn refresh(&mut self) {
        self.enter_flow_log_enter_flow = plogp(self.enter_flow);
        self.index_codelength = self.enter_flow_log_enter_flow
            - self.enter_log_enter
            - self.exit_network_flow_log_exit_network_flow;
        self.module_codelength =
            -self.exit_log_exit + self.flow_log_flow - self.node_flow_log_node_flow;
        self.codelength = self.index_codelength + self.module_codelength;
    }

    pub fn delta_on_move(
        &self,
        current: &F,
        old_delta: &DeltaFlow,
        new_delta: &DeltaFlow,
        modules: &[F],
    ) -> f64 {
        let context = self.prepare_move_context(current, old_delta, modules);
        self.delta_on_move_with_context(&context, new_delta, modules)
    }

    pub(crate) fn prepare_move_context(
        &self,
        current: &F,
        old_delta: &DeltaFlow,
        modules: &[F],
    ) -> MoveDeltaContext {
        let old = &modules[old_delta.module as usize];
        let de_old = old_delta.boundary();

        MoveDeltaContext {
            de_old,
            current_flow: current.flow(),
            current_enter_flow: current.enter_flow(),
            current_exit_flow: current.exit_flow(),
            old_enter_before: plogp(old.enter_flow()),
            old_enter_after: plogp(old.enter_flow() - current.enter_flow() + de_old),
            old_exit_before: plogp(old.exit_flow()),
            old_exit_after: plogp(old.exit_flow() - current.exit_flow() + de_old),
            old_total_before: plogp(old.exit_flow() + old.flow()),
            old_total_after: plogp(
                old.exit_flow() + old.flow() - current.exit_flow() - current.flow() + de_old,
            ),
        }
    }

    pub(crate) fn delta_on_move_with_context(
        &self,
        context: &MoveDeltaContext,
        new_delta: &DeltaFlow,
        modules: &[F],
    ) -> f64 {
        let new = &modules[new_delta.module as usize];
        let de_new = new_delta.boundary();

        let delta_enter =
            plogp(self.enter_flow + context.de_old - de_new) - self.enter_flow_log_enter_flow;

        let delta_enter_log_enter = -context.old_enter_before - plogp(new.enter_flow())
            + context.old_enter_after
            + plogp(new.enter_flow() + context.current_enter_flow - de_new);

        let delta_exit_log_exit = -context.old_exit_before - plogp(new.exit_flow())
            + context.old_exit_after
            + plogp(new.exit_flow() + context.current_exit_flow - de_new);

        let delta_flow_log_flow = -context.old_total_before
            - plogp(new.exit_flow() + new.flow())
            + context.old_total_after
            + plogp(
                new.exit_flow() + new.flow() + context.current_exit_flow + context.current_flow
                    - de_new,
            );

        delta_enter - delta_enter_log_enter - delta_exit_log_exit + delta_flow_log_flow
    }

    pub fn update_on_move(
        &mut self,
        current: &F,
        old_delta: &DeltaFlow,
        new_delta: &DeltaFlow,
        modules: &mut [F],
    ) {
        let old_m = old_delta.module as usize;
        let new_m = new_delta.module as usize;

        self.remove_terms(&modules[old_m]);
        self.remove_terms(&modules[new_m]);

        modules[old_m].subtract(current);
        modules[new_m].add(current);
        modules[old_m].shift_boundary(old_delta.boundary());
        modules[new_m].shift_boundary(-new_delta.boundary());

        self.add_terms(&modules[old_m]);
        self.add_terms(&modules[new_m]);

        self.refresh();
    }

    #[inline]
    fn remove_terms(&mut self, d: &F) {
        self.enter_flow -= d.enter_flow();
        self.enter_log_enter -= plogp(d.enter_flow());
        self.exit_log_exit -= plogp(d.exit_flow());
        self.flow_log_flow -= plogp(d.exit_flow() + d.flow());
    }

    #[inline]
    fn add_terms(&mut self, d: &F) {
        self.enter_flow += d.enter_flow();
        self.enter_log_enter += plogp(d.enter_flow());
        self.exit_log_exit += plogp(d.exit_flow());
        self.flow_log_flow += plogp(d.exit_flow() + d.flow());
    }
}
