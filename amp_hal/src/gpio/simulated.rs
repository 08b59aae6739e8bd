//! In-process edge source.
//!
//! [`SimulatedLines`] is fed through a [`SimulatedInjector`] that keeps its
//! own clock, so injected events carry realistic, strictly increasing
//! timestamps and the debounce window behaves as it does on hardware.

use super::{EdgeSource, Interrupt};
use amp::hal::edge::{Edge, EdgeEvent, LineId};
use amp::hal::error::{HalError, HalResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

/// Spacing between consecutive injected edges.
pub const DEFAULT_EDGE_SPACING: Duration = Duration::from_millis(1);

/// Idle time before a simulated button press.
pub const DEFAULT_BUTTON_GAP: Duration = Duration::from_millis(150);

/// How long a simulated button is held down. A quick tap, shorter than the
/// default debounce window.
pub const DEFAULT_BUTTON_HOLD: Duration = Duration::from_millis(40);

enum Message {
    Edge(EdgeEvent),
    Wake,
}

struct ChannelWake(Sender<Message>);

impl Interrupt for ChannelWake {
    fn interrupt(&self) {
        // The receiver is gone once the engine has exited.
        let _ = self.0.send(Message::Wake);
    }
}

/// Channel-backed edge source.
pub struct SimulatedLines {
    lines: Vec<LineId>,
    rx: Receiver<Message>,
    wake: Arc<ChannelWake>,
}

impl std::fmt::Debug for SimulatedLines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedLines")
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

impl SimulatedLines {
    /// Create a source for `lines` and the injector that drives it.
    pub fn new(lines: &[LineId]) -> (Self, SimulatedInjector) {
        let (tx, rx) = mpsc::channel();
        let injector = SimulatedInjector {
            tx: tx.clone(),
            clock_ns: Arc::new(AtomicU64::new(0)),
            spacing: DEFAULT_EDGE_SPACING,
            button_gap: DEFAULT_BUTTON_GAP,
            button_hold: DEFAULT_BUTTON_HOLD,
        };
        let source = Self {
            lines: lines.to_vec(),
            rx,
            wake: Arc::new(ChannelWake(tx)),
        };
        (source, injector)
    }
}

impl EdgeSource for SimulatedLines {
    fn lines(&self) -> &[LineId] {
        &self.lines
    }

    fn wait_edges(&mut self, out: &mut Vec<EdgeEvent>) -> HalResult<usize> {
        let first = self
            .rx
            .recv()
            .map_err(|_| HalError::Wait("simulated lines disconnected".to_string()))?;
        let mut count = 0;
        match first {
            Message::Edge(event) => {
                out.push(event);
                count += 1;
            }
            Message::Wake => return Ok(0),
        }
        loop {
            match self.rx.try_recv() {
                Ok(Message::Edge(event)) => {
                    out.push(event);
                    count += 1;
                }
                Ok(Message::Wake) => {
                    // Deliver what we have; the engine sees the stop flag
                    // after dispatching it.
                    return Ok(count);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(count),
            }
        }
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.wake.clone()
    }
}

/// Handle for injecting edges into a [`SimulatedLines`].
///
/// Clones share the clock, so edges injected from several clones stay
/// ordered by the order of the calls.
#[derive(Clone)]
pub struct SimulatedInjector {
    tx: Sender<Message>,
    clock_ns: Arc<AtomicU64>,
    spacing: Duration,
    button_gap: Duration,
    button_hold: Duration,
}

impl std::fmt::Debug for SimulatedInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedInjector")
            .field("clock_ns", &self.now_ns())
            .field("spacing", &self.spacing)
            .field("button_gap", &self.button_gap)
            .field("button_hold", &self.button_hold)
            .finish()
    }
}

impl SimulatedInjector {
    /// Use `spacing` between consecutive edges.
    pub fn with_edge_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Idle for `gap` before each press.
    pub fn with_button_gap(mut self, gap: Duration) -> Self {
        self.button_gap = gap;
        self
    }

    /// Hold each press for `hold` before releasing.
    pub fn with_button_hold(mut self, hold: Duration) -> Self {
        self.button_hold = hold;
        self
    }

    /// Current simulated time.
    pub fn now_ns(&self) -> u64 {
        self.clock_ns.load(Ordering::Acquire)
    }

    /// Move the clock forward without emitting anything.
    pub fn advance(&self, by: Duration) {
        self.clock_ns
            .fetch_add(by.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Emit an edge with an explicit timestamp. The clock is not changed.
    pub fn edge_at(&self, line: LineId, edge: Edge, timestamp_ns: u64) -> HalResult<()> {
        self.tx
            .send(Message::Edge(EdgeEvent::new(line, edge, timestamp_ns)))
            .map_err(|_| HalError::Wait("simulated lines dropped".to_string()))
    }

    /// Advance the clock by the edge spacing and emit an edge at the new time.
    pub fn edge(&self, line: LineId, edge: Edge) -> HalResult<()> {
        let step = self.spacing.as_nanos() as u64;
        let ts = self.clock_ns.fetch_add(step, Ordering::AcqRel) + step;
        self.edge_at(line, edge, ts)
    }

    /// One clockwise detent: A falls, B falls, A rises, B rises.
    pub fn cw_detent(&self, a: LineId, b: LineId) -> HalResult<()> {
        self.edge(a, Edge::Falling)?;
        self.edge(b, Edge::Falling)?;
        self.edge(a, Edge::Rising)?;
        self.edge(b, Edge::Rising)
    }

    /// One counter-clockwise detent: B falls, A falls, B rises, A rises.
    pub fn ccw_detent(&self, a: LineId, b: LineId) -> HalResult<()> {
        self.edge(b, Edge::Falling)?;
        self.edge(a, Edge::Falling)?;
        self.edge(b, Edge::Rising)?;
        self.edge(a, Edge::Rising)
    }

    /// Idle, then tap an active-low button: press, hold briefly, release.
    pub fn press_release(&self, line: LineId) -> HalResult<()> {
        self.advance(self.button_gap);
        self.edge(line, Edge::Falling)?;
        self.advance(self.button_hold);
        self.edge(line, Edge::Rising)
    }

    /// Interrupt the consumer's wait, as `stop()` would.
    pub fn wake(&self) {
        let _ = self.tx.send(Message::Wake);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: LineId = LineId(7);
    const B: LineId = LineId(8);

    #[test]
    fn test_events_drained_in_order() {
        let (mut lines, inject) = SimulatedLines::new(&[A, B]);
        inject.cw_detent(A, B).unwrap();

        let mut out = Vec::new();
        assert_eq!(lines.wait_edges(&mut out).unwrap(), 4);
        let edges: Vec<_> = out.iter().map(|e| (e.line, e.edge)).collect();
        assert_eq!(
            edges,
            vec![
                (A, Edge::Falling),
                (B, Edge::Falling),
                (A, Edge::Rising),
                (B, Edge::Rising)
            ]
        );
        assert!(out.windows(2).all(|w| w[0].timestamp_ns < w[1].timestamp_ns));
    }

    #[test]
    fn test_wake_returns_zero() {
        let (mut lines, _inject) = SimulatedLines::new(&[A]);
        lines.interrupter().interrupt();
        let mut out = Vec::new();
        assert_eq!(lines.wait_edges(&mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_press_release_spacing() {
        let (mut lines, inject) = SimulatedLines::new(&[A]);
        inject.press_release(A).unwrap();

        let mut out = Vec::new();
        lines.wait_edges(&mut out).unwrap();
        assert_eq!(out[0].edge, Edge::Falling);
        assert_eq!(out[1].edge, Edge::Rising);
        let held = out[1].timestamp_ns - out[0].timestamp_ns;
        assert_eq!(held, (DEFAULT_BUTTON_HOLD + DEFAULT_EDGE_SPACING).as_nanos() as u64);
        assert!(out[0].timestamp_ns >= DEFAULT_BUTTON_GAP.as_nanos() as u64);
    }

    #[test]
    fn test_clones_share_clock() {
        let (_lines, inject) = SimulatedLines::new(&[A]);
        let other = inject.clone();
        inject.advance(Duration::from_millis(5));
        assert_eq!(other.now_ns(), 5_000_000);
    }

    #[test]
    fn test_send_after_drop_fails() {
        let (lines, inject) = SimulatedLines::new(&[A]);
        drop(lines);
        assert!(inject.edge(A, Edge::Rising).is_err());
    }
}
