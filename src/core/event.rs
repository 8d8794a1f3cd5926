use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Kinds of events the engine schedules.
///
/// Wall and corner contacts name a single particle; explicit variants let
/// the resolver match exhaustively. `Bootstrap` names no particle and exists
/// only to force the initial snapshot.
///
/// Tie-breaking for deterministic ordering prefers pair collisions over wall
/// contacts when times are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Collision between particles `i` and `j`.
    Pair { i: u32, j: u32 },
    /// Contact of particle `i` with the leftmost, dividing, or rightmost wall.
    VerticalWall { i: u32 },
    /// Contact of particle `i` with a top or bottom bound.
    HorizontalWall { i: u32 },
    /// Clip of particle `i` against the nearer opening corner.
    Corner { i: u32 },
    /// Zero-time event with no participants, always valid.
    Bootstrap,
}

impl EventKind {
    #[inline]
    fn order_key(&self) -> (u8, u32, u32) {
        match *self {
            EventKind::Pair { i, j } => (0, i, j),
            EventKind::VerticalWall { i } => (1, i, 0),
            EventKind::HorizontalWall { i } => (2, i, 0),
            EventKind::Corner { i } => (3, i, 0),
            EventKind::Bootstrap => (4, 0, 0),
        }
    }

    /// The up-to-two particle ids this event names.
    #[inline]
    pub fn participants(&self) -> (Option<u32>, Option<u32>) {
        match *self {
            EventKind::Pair { i, j } => (Some(i), Some(j)),
            EventKind::VerticalWall { i }
            | EventKind::HorizontalWall { i }
            | EventKind::Corner { i } => (Some(i), None),
            EventKind::Bootstrap => (None, None),
        }
    }
}

/// A scheduled event with deterministic ordering.
///
/// Events are immutable once created; they hold particle ids rather than
/// references, plus a snapshot of each named participant's collision count.
/// A mismatch between a snapshot and the live count at pop time marks the
/// event as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: NotNan<f64>,
    pub kind: EventKind,
    cc_a: Option<u64>,
    cc_b: Option<u64>,
}

impl Event {
    /// Create a new event, validating that time is finite and non-NaN.
    pub fn new(time: f64, kind: EventKind, cc_a: Option<u64>, cc_b: Option<u64>) -> Result<Self> {
        if !time.is_finite() {
            return Err(Error::MathError(format!(
                "event time must be finite, got {time}"
            )));
        }
        let time =
            NotNan::new(time).map_err(|_| Error::MathError("event time cannot be NaN".into()))?;
        Ok(Self {
            time,
            kind,
            cc_a,
            cc_b,
        })
    }

    /// A pair collision between `i` and `j` with both fingerprints captured.
    pub fn pair(time: f64, i: u32, j: u32, cc_i: u64, cc_j: u64) -> Result<Self> {
        Self::new(time, EventKind::Pair { i, j }, Some(cc_i), Some(cc_j))
    }

    /// A vertical-wall contact for particle `i`.
    pub fn vertical_wall(time: f64, i: u32, cc_i: u64) -> Result<Self> {
        Self::new(time, EventKind::VerticalWall { i }, Some(cc_i), None)
    }

    /// A horizontal-wall contact for particle `i`.
    pub fn horizontal_wall(time: f64, i: u32, cc_i: u64) -> Result<Self> {
        Self::new(time, EventKind::HorizontalWall { i }, Some(cc_i), None)
    }

    /// A corner clip for particle `i`.
    pub fn corner(time: f64, i: u32, cc_i: u64) -> Result<Self> {
        Self::new(time, EventKind::Corner { i }, Some(cc_i), None)
    }

    /// The participant-free bootstrap event.
    pub fn bootstrap(time: f64) -> Result<Self> {
        Self::new(time, EventKind::Bootstrap, None, None)
    }

    /// Returns the raw f64 event time.
    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }

    /// Validate against the named participants' current collision counts.
    ///
    /// Callers pass the live count for each side that names a particle and
    /// `None` where the event names none; an event with no participants is
    /// always valid.
    #[inline]
    pub fn is_valid(&self, cc_a_now: Option<u64>, cc_b_now: Option<u64>) -> bool {
        self.cc_a == cc_a_now && self.cc_b == cc_b_now
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {
                let a = self.kind.order_key();
                let b = other.kind.order_key();
                match a.cmp(&b) {
                    Ordering::Equal => {
                        // Final tie-breaker on fingerprints to ensure a total order.
                        (self.cc_a, self.cc_b).cmp(&(other.cc_a, other.cc_b))
                    }
                    o => o,
                }
            }
            o => o,
        }
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority schedule of candidate events ordered by time.
///
/// Superseded events are never removed in place; staleness is detected via
/// the fingerprint check when an event is popped. Duplicate times are allowed
/// and broken by the deterministic `Event` order.
#[derive(Debug, Default)]
pub struct EventSchedule {
    heap: BinaryHeap<Reverse<Event>>,
}

impl EventSchedule {
    /// An empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate event.
    #[inline]
    pub fn push(&mut self, event: Event) {
        self.heap.push(Reverse(event));
    }

    /// Remove and return the earliest event, if any.
    #[inline]
    pub fn pop_min(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(ev)| ev)
    }

    /// Whether no events remain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of outstanding events, stale entries included.
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drop all outstanding events.
    #[inline]
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
