//! Table-driven edge state machine engine.
//!
//! A machine is an enumerated state plus an immutable table indexed by
//! `(state, line slot, edge)`. Each cell names the next state and an
//! optional action tag; actions are executed by an [`ActionHandler`] owned
//! by the engine, so the only mutable state of a machine lives on the
//! thread that runs it.
//!
//! ```text
//!  EdgeSource::wait_edges ──► lockout filter ──► table[state][slot][edge]
//!                                                   │
//!                                      ┌────────────┴───────────┐
//!                                      ▼                        ▼
//!                              handler.handle(action)    state = next
//! ```

use crate::gpio::{EdgeSource, Interrupt};
use amp::hal::edge::{Edge, EdgeEvent, LineId};
use amp::hal::error::HalResult;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace};

/// One cell of a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S, A> {
    /// State after the edge.
    pub next: S,
    /// Action executed before the state changes.
    pub action: Option<A>,
}

impl<S, A> Transition<S, A> {
    /// Plain state change.
    pub const fn to(next: S) -> Self {
        Self { next, action: None }
    }

    /// State change with an action.
    pub const fn with(next: S, action: A) -> Self {
        Self {
            next,
            action: Some(action),
        }
    }
}

/// Transitions of one state: per line slot, `[rising, falling]`.
pub type Row<S, A, const L: usize> = [[Transition<S, A>; 2]; L];

/// Dense index of a state enum into its transition table.
pub trait StateIndex: Copy + Eq + Debug + Send + Sync + 'static {
    /// Number of states, and rows of every table over this type.
    const COUNT: usize;

    /// Row of this state.
    fn index(self) -> usize;
}

/// Current state plus the immutable table it walks.
#[derive(Debug)]
pub struct StateMachine<S: 'static, A: 'static, const L: usize> {
    table: &'static [Row<S, A, L>],
    current: S,
}

impl<S: StateIndex, A: Copy + Debug + 'static, const L: usize> StateMachine<S, A, L> {
    /// # Panics
    /// Panics if the table does not have one row per state.
    pub fn new(table: &'static [Row<S, A, L>], initial: S) -> Self {
        assert_eq!(
            table.len(),
            S::COUNT,
            "transition table has {} rows for {} states",
            table.len(),
            S::COUNT
        );
        Self {
            table,
            current: initial,
        }
    }

    /// Current state.
    pub fn current(&self) -> S {
        self.current
    }

    /// Look up the transition for `edge` on line `slot` and advance.
    pub fn dispatch(&mut self, slot: usize, edge: Edge) -> Transition<S, A> {
        let transition = self.table[self.current.index()][slot][edge.index()];
        self.current = transition.next;
        transition
    }
}

/// Executes the action tags of a machine.
pub trait ActionHandler<A>: Send {
    /// Run `action`, triggered by `event`.
    fn handle(&mut self, action: A, event: &EdgeEvent);
}

/// Cooperative stop request for a running engine.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    interrupter: Arc<dyn Interrupt>,
}

impl Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl StopHandle {
    /// Set the stop flag and wake the engine's pending wait.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
        self.interrupter.interrupt();
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counters reported when an engine exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Events that reached the transition table.
    pub dispatched: u64,
    /// Events dropped inside the debounce window.
    pub discarded: u64,
}

/// Engine binding an edge source to a state machine over `L` lines.
pub struct EdgeEngine<Src, S: 'static, A: 'static, H, const L: usize> {
    name: String,
    source: Src,
    lines: [LineId; L],
    machine: StateMachine<S, A, L>,
    handler: H,
    lockout_ns: u64,
    last_action_ns: Option<u64>,
    stop: StopHandle,
    stats: EngineStats,
}

impl<Src, S, A, H, const L: usize> EdgeEngine<Src, S, A, H, L>
where
    Src: EdgeSource,
    S: StateIndex,
    A: Copy + Debug + Send + 'static,
    H: ActionHandler<A>,
{
    /// Bind `lines` (slot order) on `source` to `table`, starting in
    /// `initial`.
    ///
    /// # Panics
    /// Panics if `source` does not deliver every line in `lines`, or if the
    /// table shape does not match the state type.
    pub fn configure(
        name: impl Into<String>,
        source: Src,
        lines: [LineId; L],
        initial: S,
        table: &'static [Row<S, A, L>],
        handler: H,
    ) -> Self {
        let name = name.into();
        for line in &lines {
            assert!(
                source.lines().contains(line),
                "{name}: {line} is not served by the edge source"
            );
        }
        let stop = StopHandle {
            flag: Arc::new(AtomicBool::new(false)),
            interrupter: source.interrupter(),
        };
        debug!(engine = %name, ?lines, ?initial, "edge engine configured");
        Self {
            name,
            source,
            lines,
            machine: StateMachine::new(table, initial),
            handler,
            lockout_ns: 0,
            last_action_ns: None,
            stop,
            stats: EngineStats::default(),
        }
    }

    /// Discard events arriving within `window` after a transition that
    /// carried an action. Action-less transitions never open the window.
    pub fn with_lockout(mut self, window: Duration) -> Self {
        self.lockout_ns = window.as_nanos() as u64;
        self
    }

    /// Engine name, used for logs and the thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current machine state.
    pub fn state(&self) -> S {
        self.machine.current()
    }

    /// Action handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Counters so far.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Handle for stopping [`run`](Self::run) from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request termination and interrupt the pending wait.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Feed one event through the lockout filter and the table.
    ///
    /// Returns whether the event was dispatched.
    ///
    /// # Panics
    /// Panics if `event.line` is not one of the configured lines.
    pub fn dispatch(&mut self, event: &EdgeEvent) -> bool {
        let slot = match self.lines.iter().position(|line| *line == event.line) {
            Some(slot) => slot,
            None => panic!("{}: edge event for unconfigured line {}", self.name, event.line),
        };

        if let Some(last) = self.last_action_ns {
            if event.timestamp_ns.saturating_sub(last) < self.lockout_ns {
                self.stats.discarded += 1;
                trace!(engine = %self.name, line = event.line.0, edge = %event.edge, "bounce discarded");
                return false;
            }
        }

        let from = self.machine.current();
        let transition = self.machine.dispatch(slot, event.edge);
        if let Some(action) = transition.action {
            self.handler.handle(action, event);
            if self.lockout_ns > 0 {
                self.last_action_ns = Some(event.timestamp_ns);
            }
        }
        self.stats.dispatched += 1;
        trace!(
            engine = %self.name,
            line = event.line.0,
            edge = %event.edge,
            ?from,
            to = ?transition.next,
            action = ?transition.action,
            "transition"
        );
        true
    }

    /// Wait for and dispatch events until stopped.
    ///
    /// Events already collected when the stop arrives are still dispatched.
    pub fn run(&mut self) -> HalResult<EngineStats> {
        info!(engine = %self.name, "edge engine running");
        let mut events = Vec::with_capacity(16);
        while !self.stop.is_stopped() {
            events.clear();
            if self.source.wait_edges(&mut events)? == 0 {
                continue;
            }
            for event in &events {
                self.dispatch(event);
            }
        }
        info!(
            engine = %self.name,
            dispatched = self.stats.dispatched,
            discarded = self.stats.discarded,
            "edge engine stopped"
        );
        Ok(self.stats)
    }
}

/// An input peripheral that can be driven on its own thread.
pub trait Peripheral: Send + 'static {
    /// Name used for the thread and logs.
    fn name(&self) -> &str;

    /// Handle for stopping [`run`](Self::run).
    fn stop_handle(&self) -> StopHandle;

    /// Blocking event loop.
    fn run(&mut self) -> HalResult<EngineStats>;
}

impl<Src, S, A, H, const L: usize> Peripheral for EdgeEngine<Src, S, A, H, L>
where
    Src: EdgeSource + 'static,
    S: StateIndex,
    A: Copy + Debug + Send + Sync + 'static,
    H: ActionHandler<A> + 'static,
{
    fn name(&self) -> &str {
        EdgeEngine::name(self)
    }

    fn stop_handle(&self) -> StopHandle {
        EdgeEngine::stop_handle(self)
    }

    fn run(&mut self) -> HalResult<EngineStats> {
        EdgeEngine::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{SimulatedInjector, SimulatedLines};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Level {
        Low,
        High,
    }

    impl StateIndex for Level {
        const COUNT: usize = 2;

        fn index(self) -> usize {
            self as usize
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Toggle {
        Rose,
    }

    static LEVEL_TABLE: [Row<Level, Toggle, 1>; 2] = [
        [[Transition::with(Level::High, Toggle::Rose), Transition::to(Level::Low)]],
        [[Transition::to(Level::High), Transition::to(Level::Low)]],
    ];

    #[derive(Default)]
    struct Count(u32);

    impl ActionHandler<Toggle> for Count {
        fn handle(&mut self, _action: Toggle, _event: &EdgeEvent) {
            self.0 += 1;
        }
    }

    const LINE: LineId = LineId(3);

    fn engine() -> (
        EdgeEngine<SimulatedLines, Level, Toggle, Count, 1>,
        SimulatedInjector,
    ) {
        let (lines, inject) = SimulatedLines::new(&[LINE]);
        let engine = EdgeEngine::configure(
            "level",
            lines,
            [LINE],
            Level::Low,
            &LEVEL_TABLE,
            Count::default(),
        );
        (engine, inject)
    }

    #[test]
    fn test_transition_without_action_only_moves() {
        let (mut engine, _) = engine();
        assert!(engine.dispatch(&EdgeEvent::new(LINE, Edge::Falling, 1)));
        assert_eq!(engine.state(), Level::Low);
        assert_eq!(engine.handler().0, 0);
    }

    #[test]
    fn test_action_runs_once_per_transition() {
        let (mut engine, _) = engine();
        engine.dispatch(&EdgeEvent::new(LINE, Edge::Rising, 1));
        engine.dispatch(&EdgeEvent::new(LINE, Edge::Rising, 2));
        assert_eq!(engine.state(), Level::High);
        assert_eq!(engine.handler().0, 1);
        assert_eq!(engine.stats().dispatched, 2);
    }

    #[test]
    #[should_panic(expected = "unconfigured line")]
    fn test_unconfigured_line_panics() {
        let (mut engine, _) = engine();
        engine.dispatch(&EdgeEvent::new(LineId(99), Edge::Rising, 1));
    }

    #[test]
    #[should_panic(expected = "not served")]
    fn test_configure_rejects_foreign_line() {
        let (lines, _inject) = SimulatedLines::new(&[LINE]);
        let _ = EdgeEngine::configure(
            "level",
            lines,
            [LineId(4)],
            Level::Low,
            &LEVEL_TABLE,
            Count::default(),
        );
    }

    #[test]
    fn test_lockout_discards_bounces() {
        let (engine, _) = engine();
        let mut engine = engine.with_lockout(Duration::from_millis(100));
        assert!(engine.dispatch(&EdgeEvent::new(LINE, Edge::Rising, 0)));
        assert!(!engine.dispatch(&EdgeEvent::new(LINE, Edge::Falling, 5_000_000)));
        assert!(!engine.dispatch(&EdgeEvent::new(LINE, Edge::Rising, 99_999_999)));
        assert!(engine.dispatch(&EdgeEvent::new(LINE, Edge::Falling, 100_000_000)));
        assert_eq!(
            engine.stats(),
            EngineStats {
                dispatched: 2,
                discarded: 2
            }
        );
    }

    #[test]
    fn test_lockout_opened_only_by_actions() {
        let (engine, _) = engine();
        let mut engine = engine.with_lockout(Duration::from_millis(100));
        // Low -> Low carries no action, so the rising edge 10 ms later counts.
        assert!(engine.dispatch(&EdgeEvent::new(LINE, Edge::Falling, 0)));
        assert!(engine.dispatch(&EdgeEvent::new(LINE, Edge::Rising, 10_000_000)));
        assert_eq!(engine.handler().0, 1);
        // High -> Low carries no action either, but the window from the
        // rising edge is still open.
        assert!(!engine.dispatch(&EdgeEvent::new(LINE, Edge::Falling, 20_000_000)));
        assert_eq!(engine.state(), Level::High);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_engine_is_a_sendable_peripheral() {
        let (engine, _) = engine();
        assert_send(&engine);
        let peripheral: Box<dyn Peripheral> = Box::new(engine);
        assert_eq!(peripheral.name(), "level");
    }

    #[test]
    fn test_run_until_stopped() {
        let (mut engine, inject) = engine();
        let stop = engine.stop_handle();
        inject.edge(LINE, Edge::Rising).unwrap();
        inject.edge(LINE, Edge::Falling).unwrap();
        inject.edge(LINE, Edge::Rising).unwrap();

        let worker = std::thread::spawn(move || {
            let stats = engine.run();
            (stats, engine.handler().0)
        });
        std::thread::sleep(Duration::from_millis(50));
        stop.stop();

        let (stats, actions) = worker.join().unwrap();
        assert!(stop.is_stopped());
        assert_eq!(stats.unwrap().dispatched, 3);
        assert_eq!(actions, 2);
    }

    #[test]
    fn test_stop_interrupts_blocked_run() {
        let (mut engine, _inject) = engine();
        let stop = engine.stop_handle();
        let worker = std::thread::spawn(move || engine.run());
        std::thread::sleep(Duration::from_millis(20));
        stop.stop();
        let stats = worker.join().unwrap().unwrap();
        assert_eq!(stats, EngineStats::default());
    }

    #[test]
    #[should_panic(expected = "rows")]
    fn test_table_shape_checked() {
        static SHORT: [Row<Level, Toggle, 1>; 1] =
            [[[Transition::to(Level::Low), Transition::to(Level::Low)]]];
        let _ = StateMachine::new(&SHORT, Level::Low);
    }
}
