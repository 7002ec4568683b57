//! The tick clock and state hashing.
//!
//! The [`TickClock`] owns the monotonic tick counter. Real time is fed in via
//! [`TickClock::accumulate`]; every time the accumulator crosses the interval
//! one tick becomes due. The world then runs each due tick in turn, and the
//! clock fans the tick number out to external observers.

use crate::fixed::{Fixed64, Ticks};
use crate::id::ObserverId;
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Clock state
// ---------------------------------------------------------------------------

/// Lifecycle of the clock. `Idle -> Running` on start; `Running <-> Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ClockState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// A tick observer. Called once per tick after every component has run.
pub type TickObserver = Box<dyn FnMut(Ticks)>;

// ---------------------------------------------------------------------------
// TickClock
// ---------------------------------------------------------------------------

/// Monotonic tick source with an accumulated-time counter.
pub struct TickClock {
    state: ClockState,
    current_tick: Ticks,
    /// Time carried toward the next tick, in seconds.
    accumulator: Fixed64,
    /// Seconds per tick.
    interval: Fixed64,
    /// Lower bound for `interval`.
    min_interval: Fixed64,
    observers: SlotMap<ObserverId, TickObserver>,
}

impl std::fmt::Debug for TickClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickClock")
            .field("state", &self.state)
            .field("current_tick", &self.current_tick)
            .field("accumulator", &self.accumulator)
            .field("interval", &self.interval)
            .field("min_interval", &self.min_interval)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl TickClock {
    /// Create an idle clock at tick 0. `min_interval` is itself floored at
    /// the smallest positive Fixed64 so a step is never zero.
    pub fn new(interval: Fixed64, min_interval: Fixed64) -> Self {
        let min_interval = min_interval.max(Fixed64::DELTA);
        Self {
            state: ClockState::Idle,
            current_tick: 0,
            accumulator: Fixed64::ZERO,
            interval: interval.max(min_interval),
            min_interval,
            observers: SlotMap::with_key(),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == ClockState::Paused
    }

    /// The most recently started tick. 0 before the first tick.
    pub fn current_tick(&self) -> Ticks {
        self.current_tick
    }

    pub fn accumulator(&self) -> Fixed64 {
        self.accumulator
    }

    pub fn interval(&self) -> Fixed64 {
        self.interval
    }

    pub fn min_interval(&self) -> Fixed64 {
        self.min_interval
    }

    // -- Lifecycle --

    /// `Idle -> Running`. No effect otherwise.
    pub fn start(&mut self) {
        if self.state == ClockState::Idle {
            self.state = ClockState::Running;
        }
    }

    /// Suspend advancement. Counters are preserved.
    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ClockState::Paused {
            self.state = ClockState::Running;
        }
    }

    /// Change the tick interval. Values below the floor are clamped.
    /// Returns the interval actually applied.
    pub fn set_interval(&mut self, interval: Fixed64) -> Fixed64 {
        self.interval = interval.max(self.min_interval);
        self.interval
    }

    // -- Advancement --

    /// Add elapsed time and return how many ticks are now due. The remainder
    /// carries forward. Returns 0 unless running; negative time is ignored.
    pub fn accumulate(&mut self, dt: Fixed64) -> u64 {
        if !self.is_running() || dt <= Fixed64::ZERO {
            return 0;
        }
        self.accumulator = self.accumulator.saturating_add(dt);
        let mut due = 0;
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            due += 1;
        }
        due
    }

    /// Start the next tick and return its number.
    pub(crate) fn next_tick(&mut self) -> Ticks {
        self.current_tick += 1;
        self.current_tick
    }

    /// Restore counters from a snapshot.
    pub(crate) fn restore(&mut self, tick: Ticks, accumulator: Fixed64) {
        self.current_tick = tick;
        self.accumulator = accumulator;
    }

    // -- Observers --

    /// Register an observer called with every tick number.
    pub fn subscribe(&mut self, observer: TickObserver) -> ObserverId {
        self.observers.insert(observer)
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn notify(&mut self, tick: Ticks) {
        for (_, observer) in self.observers.iter_mut() {
            observer(tick);
        }
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write(&[v]);
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
