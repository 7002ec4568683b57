//! Typed event system with pre-allocated ring buffers.
//!
//! Events are emitted while a tick runs (and by placement/removal between
//! ticks) and delivered to passive listeners in batch at the end of each
//! tick. Each event kind has its own [`EventBuffer`] ring buffer. Buffers keep
//! the most recent events as history after delivery, so callers can also
//! inspect them directly; listeners see every surviving event exactly once.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::component::{ComponentKind, PortHeading};
use crate::fixed::Ticks;
use crate::grid::Wall;
use crate::id::{ComponentId, GridId, ItemId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred
/// (the last completed tick for events raised between ticks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Construction --
    ComponentPlaced {
        component: ComponentId,
        grid: GridId,
        kind: ComponentKind,
        tick: Ticks,
    },
    ComponentRemoved {
        component: ComponentId,
        grid: GridId,
        tick: Ticks,
    },

    // -- Transfer --
    ItemTransferred {
        from: ComponentId,
        to: ComponentId,
        item: ItemId,
        tick: Ticks,
    },
    ItemCollected {
        collector: ComponentId,
        item: ItemId,
        tick: Ticks,
    },
    ItemsCombined {
        combiner: ComponentId,
        output: ItemId,
        tick: Ticks,
    },
    TunnelTraversed {
        entrance: ComponentId,
        exit: ComponentId,
        item: ItemId,
        tick: Ticks,
    },
    BoundaryCrossed {
        module: ComponentId,
        wall: Wall,
        heading: PortHeading,
        item: ItemId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ComponentPlaced,
    ComponentRemoved,
    ItemTransferred,
    ItemCollected,
    ItemsCombined,
    TunnelTraversed,
    BoundaryCrossed,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 7;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ComponentPlaced { .. } => EventKind::ComponentPlaced,
            Event::ComponentRemoved { .. } => EventKind::ComponentRemoved,
            Event::ItemTransferred { .. } => EventKind::ItemTransferred,
            Event::ItemCollected { .. } => EventKind::ItemCollected,
            Event::ItemsCombined { .. } => EventKind::ItemsCombined,
            Event::TunnelTraversed { .. } => EventKind::TunnelTraversed,
            Event::BoundaryCrossed { .. } => EventKind::BoundaryCrossed,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::ComponentPlaced { tick, .. }
            | Event::ComponentRemoved { tick, .. }
            | Event::ItemTransferred { tick, .. }
            | Event::ItemCollected { tick, .. }
            | Event::ItemsCombined { tick, .. }
            | Event::TunnelTraversed { tick, .. }
            | Event::BoundaryCrossed { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer — pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    /// Pre-allocated storage.
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    /// Number of events currently stored (may be less than capacity).
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event into the ring buffer. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    /// The total capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    /// Number of events currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.len as u64)
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head points to the next write position, which is the oldest entry
            self.head
        };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    /// Iterate over stored events whose sequence number is at least `seq`
    /// (the first event ever written has sequence 0).
    pub fn iter_since(&self, seq: u64) -> impl Iterator<Item = &Event> {
        let oldest = self.total_written - self.len as u64;
        let skip = seq.saturating_sub(oldest) as usize;
        self.iter().skip(skip)
    }

    /// Clear all events from the buffer. `total_written` is preserved.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventBuffer`], from oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// The central event bus. Holds one ring buffer per event kind, listener
/// lists, and suppression flags.
pub struct EventBus {
    /// One ring buffer per event kind, allocated on first emit.
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],

    /// Suppressed event kinds. Suppressed events are never buffered.
    suppressed: [bool; EVENT_KIND_COUNT],

    /// Listeners indexed by event kind, in registration order.
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],

    /// Per-kind sequence number of the next undelivered event.
    delivered: [u64; EVENT_KIND_COUNT],

    /// Capacity for new event buffers.
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("delivered", &self.delivered)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            delivered: [0; EVENT_KIND_COUNT],
            default_capacity,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        // Drop the buffer if it exists -- zero allocation for suppressed events.
        self.buffers[kind.index()] = None;
        self.delivered[kind.index()] = 0;
    }

    /// Check if an event kind is suppressed.
    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event. No-ops if the event kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a passive listener. Listeners are called in registration
    /// order during delivery.
    pub fn on(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Deliver every not-yet-delivered event to the listeners of its kind.
    /// Called by the world at the end of each tick.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_ref() else {
                continue;
            };
            let from = self.delivered[idx];
            self.delivered[idx] = buffer.total_written();
            if self.listeners[idx].is_empty() {
                continue;
            }
            for event in buffer.iter_since(from) {
                for listener in &mut self.listeners[idx] {
                    listener(event);
                }
            }
        }
    }

    /// Get the event buffer for a specific event kind (read-only).
    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Buffered events of one kind, oldest first.
    pub fn events(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.buffers[kind.index()].iter().flat_map(EventBuffer::iter)
    }

    /// Get the count of events currently buffered for a kind.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map(EventBuffer::len).unwrap_or(0)
    }

    /// Get the total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map(EventBuffer::total_written).unwrap_or(0)
    }

    /// Clear all buffers. Does not remove listeners or suppression settings.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_component_id() -> ComponentId {
        let mut sm = SlotMap::<ComponentId, ()>::with_key();
        sm.insert(())
    }

    fn collected(tick: Ticks) -> Event {
        Event::ItemCollected {
            collector: make_component_id(),
            item: ItemId(0),
            tick,
        }
    }

    #[test]
    fn event_buffer_push_and_iterate() {
        let mut buf = EventBuffer::new(8);
        buf.push(collected(1));
        buf.push(collected(2));

        let ticks: Vec<_> = buf.iter().map(Event::tick).collect();
        assert_eq!(ticks, vec![1, 2]);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn event_buffer_drops_oldest_when_full() {
        let mut buf = EventBuffer::new(3);
        for tick in 1..=5 {
            buf.push(collected(tick));
        }
        let ticks: Vec<_> = buf.iter().map(Event::tick).collect();
        assert_eq!(ticks, vec![3, 4, 5]);
        assert_eq!(buf.total_written(), 5);
        assert_eq!(buf.dropped_count(), 2);
    }

    #[test]
    fn iter_since_skips_delivered_and_dropped() {
        let mut buf = EventBuffer::new(3);
        for tick in 1..=5 {
            buf.push(collected(tick));
        }
        // seq 0..=4; stored are seq 2, 3, 4.
        let ticks: Vec<_> = buf.iter_since(4).map(Event::tick).collect();
        assert_eq!(ticks, vec![5]);
        let ticks: Vec<_> = buf.iter_since(0).map(Event::tick).collect();
        assert_eq!(ticks, vec![3, 4, 5]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buf = EventBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
    }

    #[test]
    fn suppressed_events_are_not_buffered() {
        let mut bus = EventBus::new(16);
        bus.suppress(EventKind::ItemCollected);
        bus.emit(collected(1));
        assert!(bus.is_suppressed(EventKind::ItemCollected));
        assert_eq!(bus.buffered_count(EventKind::ItemCollected), 0);
        assert!(bus.buffer(EventKind::ItemCollected).is_none());
    }

    #[test]
    fn listeners_see_each_event_once() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.on(
            EventKind::ItemCollected,
            Box::new(move |e| sink.borrow_mut().push(e.tick())),
        );

        bus.emit(collected(1));
        bus.deliver();
        bus.emit(collected(2));
        bus.deliver();
        bus.deliver();

        assert_eq!(*seen.borrow(), vec![1, 2]);
        // History is kept after delivery.
        assert_eq!(bus.buffered_count(EventKind::ItemCollected), 2);
        assert_eq!(bus.total_emitted(EventKind::ItemCollected), 2);
    }

    #[test]
    fn listener_only_receives_its_kind() {
        let mut bus = EventBus::new(16);
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        bus.on(
            EventKind::ItemsCombined,
            Box::new(move |_| *sink.borrow_mut() += 1),
        );
        bus.emit(collected(1));
        bus.deliver();
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn clear_all_keeps_listeners() {
        let mut bus = EventBus::new(16);
        bus.emit(collected(1));
        bus.clear_all();
        assert_eq!(bus.buffered_count(EventKind::ItemCollected), 0);
        assert_eq!(bus.total_emitted(EventKind::ItemCollected), 1);
        assert_eq!(bus.events(EventKind::ItemCollected).count(), 0);
    }
}
