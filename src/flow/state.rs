use crate::config::FlowModelKind;
use std::fmt::Debug;

/// Flow bookkeeping of a node or module.
///
/// A run is monomorphized over one implementation; the hooks below are the
/// only places where the variants differ in how boundary flow is counted.
pub trait FlowState: Copy + Default + Debug + Send + Sync + 'static {
    const KIND: FlowModelKind;

    fn with_node(flow: f64, teleport_weight: f64, dangling_flow: f64, teleport_source_flow: f64)
        -> Self;

    fn flow(&self) -> f64;
    fn set_flow(&mut self, flow: f64);
    fn exit_flow(&self) -> f64;
    fn set_exit_flow(&mut self, exit: f64);
    fn enter_flow(&self) -> f64;

    fn add(&mut self, other: &Self);
    fn subtract(&mut self, other: &Self);

    fn shift_boundary(&mut self, delta: f64);

    fn on_exit_link(&mut self, link_flow: f64);
    fn on_enter_link(&mut self, link_flow: f64);

    fn teleport_exit(&self) -> f64 {
        0.0
    }

    fn teleport_delta_old(&self, _module: &Self) -> f64 {
        0.0
    }

    fn teleport_delta_new(&self, _module: &Self) -> f64 {
        0.0
    }
}

pub trait SeparateEnterFlow: FlowState {
    fn set_enter_flow(&mut self, enter: f64);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UndirectedFlow {
    pub flow: f64,
    pub exit_flow: f64,
}

impl FlowState for UndirectedFlow {
    const KIND: FlowModelKind = FlowModelKind::Undirected;

    fn with_node(flow: f64, _: f64, _: f64, _: f64) -> Self {
        Self {
            flow,
            exit_flow: 0.0,
        }
    }

    #[inline]
    fn flow(&self) -> f64 {
        self.flow
    }
    #[inline]
    fn set_flow(&mut self, flow: f64) {
        self.flow = flow;
    }
    #[inline]
    fn exit_flow(&self) -> f64 {
        self.exit_flow
    }
    #[inline]
    fn set_exit_flow(&mut self, exit: f64) {
        self.exit_flow = exit;
    }
    #[inline]
    fn enter_flow(&self) -> f64 {
        self.exit_flow
    }

    fn add(&mut self, other: &Self) {
        self.flow += other.flow;
        self.exit_flow += other.exit_flow;
    }

    fn subtract(&mut self, other: &Self) {
        self.flow -= other.flow;
        self.exit_flow -= other.exit_flow;
    }

    #[inline]
    fn shift_boundary(&mut self, delta: f64) {
        self.exit_flow += delta;
    }

    // An undirected link is stored once; each side sees half of it.
    #[inline]
    fn on_exit_link(&mut self, link_flow: f64) {
        self.exit_flow += link_flow / 2.0;
    }
    #[inline]
    fn on_enter_link(&mut self, link_flow: f64) {
        self.exit_flow += link_flow / 2.0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectedWithTeleportationFlow {
    pub flow: f64,
    pub exit_flow: f64,
    pub teleport_weight: f64,
    pub dangling_flow: f64,
    pub teleport_source_flow: f64,
}

impl FlowState for DirectedWithTeleportationFlow {
    const KIND: FlowModelKind = FlowModelKind::DirectedWithTeleportation;

    fn with_node(
        flow: f64,
        teleport_weight: f64,
        dangling_flow: f64,
        teleport_source_flow: f64,
    ) -> Self {
        Self {
            flow,
            exit_flow: 0.0,
            teleport_weight,
            dangling_flow,
            teleport_source_flow,
        }
    }

    #[inline]
    fn flow(&self) -> f64 {
        self.flow
    }
    #[inline]
    fn set_flow(&mut self, flow: f64) {
        self.flow = flow;
    }
    #[inline]
    fn exit_flow(&self) -> f64 {
        self.exit_flow
    }
    #[inline]
    fn set_exit_flow(&mut self, exit: f64) {
        self.exit_flow = exit;
    }
    #[inline]
    fn enter_flow(&self) -> f64 {
        self.exit_flow
    }

    fn add(&mut self, other: &Self) {
        self.flow += other.flow;
        self.exit_flow += other.exit_flow;
        self.teleport_weight += other.teleport_weight;
        self.dangling_flow += other.dangling_flow;
        self.teleport_source_flow += other.teleport_source_flow;
    }

    fn subtract(&mut self, other: &Self) {
        self.flow -= other.flow;
        self.exit_flow -= other.exit_flow;
        self.teleport_weight -= other.teleport_weight;
        self.dangling_flow -= other.dangling_flow;
        self.teleport_source_flow -= other.teleport_source_flow;
    }

    #[inline]
    fn shift_boundary(&mut self, delta: f64) {
        self.exit_flow += delta;
    }

    #[inline]
    fn on_exit_link(&mut self, link_flow: f64) {
        self.exit_flow += link_flow;
    }
    #[inline]
    fn on_enter_link(&mut self, _link_flow: f64) {}

    fn teleport_exit(&self) -> f64 {
        self.teleport_source_flow * (1.0 - self.teleport_weight)
    }

    fn teleport_delta_old(&self, module: &Self) -> f64 {
        self.teleport_source_flow * (module.teleport_weight - self.teleport_weight)
            + (module.teleport_source_flow - self.teleport_source_flow) * self.teleport_weight
    }

    fn teleport_delta_new(&self, module: &Self) -> f64 {
        self.teleport_source_flow * module.teleport_weight
            + module.teleport_source_flow * self.teleport_weight
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectedNonDetailedBalanceFlow {
    pub flow: f64,
    pub enter_flow: f64,
    pub exit_flow: f64,
}

impl FlowState for DirectedNonDetailedBalanceFlow {
    const KIND: FlowModelKind = FlowModelKind::DirectedNonDetailedBalance;

    fn with_node(flow: f64, _: f64, _: f64, _: f64) -> Self {
        Self {
            flow,
            enter_flow: 0.0,
            exit_flow: 0.0,
        }
    }

    #[inline]
    fn flow(&self) -> f64 {
        self.flow
    }
    #[inline]
    fn set_flow(&mut self, flow: f64) {
        self.flow = flow;
    }
    #[inline]
    fn exit_flow(&self) -> f64 {
        self.exit_flow
    }
    #[inline]
    fn set_exit_flow(&mut self, exit: f64) {
        self.exit_flow = exit;
    }
    #[inline]
    fn enter_flow(&self) -> f64 {
        self.enter_flow
    }

    fn add(&mut self, other: &Self) {
        self.flow += other.flow;
        self.enter_flow += other.enter_flow;
        self.exit_flow += other.exit_flow;
    }

    fn subtract(&mut self, other: &Self) {
        self.flow -= other.flow;
        self.enter_flow -= other.enter_flow;
        self.exit_flow -= other.exit_flow;
    }

    #[inline]
    fn shift_boundary(&mut self, delta: f64) {
        self.enter_flow += delta;
        self.exit_flow += delta;
    }

    #[inline]
    fn on_exit_link(&mut self, link_flow: f64) {
        self.exit_flow += link_flow;
    }
    #[inline]
    fn on_enter_link(&mut self, link_flow: f64) {
        self.enter_flow += link_flow;
    }
}

impl SeparateEnterFlow for DirectedNonDetailedBalanceFlow {
    fn set_enter_flow(&mut self, enter: f64) {
        self.enter_flow = enter;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectedNonDetailedBalanceWithTeleportationFlow {
    pub flow: f64,
    pub enter_flow: f64,
    pub exit_flow: f64,
    pub teleport_weight: f64,
    pub dangling_flow: f64,
    pub teleport_source_flow: f64,
}

impl FlowState for DirectedNonDetailedBalanceWithTeleportationFlow {
    const KIND: FlowModelKind = FlowModelKind::DirectedNonDetailedBalanceWithTeleportation;

    fn with_node(
        flow: f64,
        teleport_weight: f64,
        dangling_flow: f64,
        teleport_source_flow: f64,
    ) -> Self {
        Self {
            flow,
            enter_flow: 0.0,
            exit_flow: 0.0,
            teleport_weight,
            dangling_flow,
            teleport_source_flow,
        }
    }

    #[inline]
    fn flow(&self) -> f64 {
        self.flow
    }
    #[inline]
    fn set_flow(&mut self, flow: f64) {
        self.flow = flow;
    }
    #[inline]
    fn exit_flow(&self) -> f64 {
        self.exit_flow
    }
    #[inline]
    fn set_exit_flow(&mut self, exit: f64) {
        self.exit_flow = exit;
    }
    #[inline]
    fn enter_flow(&self) -> f64 {
        self.enter_flow
    }

    fn add(&mut self, other: &Self) {
        self.flow += other.flow;
        self.enter_flow += other.enter_flow;
        self.exit_flow += other.exit_flow;
        self.teleport_weight += other.teleport_weight;
        self.dangling_flow += other.dangling_flow;
        self.teleport_source_flow += other.teleport_source_flow;
    }

    fn subtract(&mut self, other: &Self) {
        self.flow -= other.flow;
        self.enter_flow -= other.enter_flow;
        self.exit_flow -= other.exit_flow;
        self.teleport_weight -= other.teleport_weight;
        self.dangling_flow -= other.dangling_flow;
        self.teleport_source_flow -= other.teleport_source_flow;
    }

    #[inline]
    fn shift_boundary(&mut self, delta: f64) {
        self.enter_flow += delta;
        self.exit_flow += delta;
    }

    #[inline]
    fn on_exit_link(&mut self, link_flow: f64) {
        self.exit_flow += link_flow;
    }
    #[inline]
    fn on_enter_link(&mut self, link_flow: f64) {
        self.enter_flow += link_flow;
    }
}

impl SeparateEnterFlow for DirectedNonDetailedBalanceWithTeleportationFlow {
    fn set_enter_flow(&mut self, enter: f64) {
        self.enter_flow = enter;
    }
}
