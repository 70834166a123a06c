//! Signal notifications.
//!
//! Every [`AnalogTimeSignal`](crate::data::signal::AnalogTimeSignal) owns a
//! [`SignalNotifier`]. Each notification carries a set of [`SignalEventKind`]
//! flags. Consumers either register a synchronous listener callback (this is
//! how math channels chain) or subscribe to an `mpsc` channel filtered by an
//! [`EventFilter`] (convenient for UI or logging threads).
//!
//! Listeners run on the thread that performed the append, after the signal's
//! storage lock has been released.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ─────────────────────────────────────────────────────────────────────────────
// SignalEventKind – bitflags
// ─────────────────────────────────────────────────────────────────────────────

/// Bitflags describing the categories a [`SignalEvent`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalEventKind(pub u32);

impl SignalEventKind {
    /// One or more samples were appended (one event per batch).
    pub const SAMPLE_APPENDED: Self = Self(1 << 0);
    /// Display precision (digits / decimal places) changed.
    pub const DIGITS_CHANGED: Self = Self(1 << 1);
    /// All samples were removed.
    pub const SAMPLES_CLEARED: Self = Self(1 << 2);
    /// The reference timestamp for relative time changed.
    pub const START_TIMESTAMP_CHANGED: Self = Self(1 << 3);

    pub const ALL: Self = Self(u32::MAX);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for SignalEventKind {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SignalEventKind {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for SignalEventKind {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::fmt::Display for SignalEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        if *self == SignalEventKind::ALL {
            return write!(f, "ALL");
        }

        let pairs: &[(SignalEventKind, &str)] = &[
            (SignalEventKind::SAMPLE_APPENDED, "SAMPLE_APPENDED"),
            (SignalEventKind::DIGITS_CHANGED, "DIGITS_CHANGED"),
            (SignalEventKind::SAMPLES_CLEARED, "SAMPLES_CLEARED"),
            (SignalEventKind::START_TIMESTAMP_CHANGED, "START_TIMESTAMP_CHANGED"),
        ];

        let mut names = Vec::new();
        let mut known_bits: u32 = 0;
        for (kind, name) in pairs {
            known_bits |= kind.0;
            if self.contains(*kind) {
                names.push((*name).to_string());
            }
        }
        let extra = self.0 & !known_bits;
        if extra != 0 {
            names.push(format!("0x{:x}", extra));
        }
        write!(f, "{}", names.join("|"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SignalEvent
// ─────────────────────────────────────────────────────────────────────────────

/// A notification emitted by a signal.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub kinds: SignalEventKind,
    /// Display name of the emitting signal.
    pub signal: String,
    /// Sample count right after the change.
    pub sample_count: usize,
    /// New `(digits, decimal_places)` for `DIGITS_CHANGED`.
    pub digits: Option<(i32, i32)>,
    /// New start timestamp for `START_TIMESTAMP_CHANGED`.
    pub start_timestamp: Option<f64>,
}

impl SignalEvent {
    pub fn new(kinds: SignalEventKind, signal: impl Into<String>, sample_count: usize) -> Self {
        Self {
            kinds,
            signal: signal.into(),
            sample_count,
            digits: None,
            start_timestamp: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventFilter
// ─────────────────────────────────────────────────────────────────────────────

/// OR-mask selecting which events a listener or subscriber receives.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub mask: SignalEventKind,
}

impl EventFilter {
    pub const fn all() -> Self {
        Self {
            mask: SignalEventKind::ALL,
        }
    }

    pub const fn only(mask: SignalEventKind) -> Self {
        Self { mask }
    }

    #[inline]
    pub fn matches(&self, event: &SignalEvent) -> bool {
        event.kinds.intersects(self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SignalNotifier
// ─────────────────────────────────────────────────────────────────────────────

/// Callback invoked synchronously for matching events.
pub type Listener = Arc<dyn Fn(&SignalEvent) + Send + Sync>;

/// Handle returned by [`SignalNotifier::connect`], used to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscriber {
    filter: EventFilter,
    sender: Sender<SignalEvent>,
}

struct ConnectedListener {
    id: ListenerId,
    filter: EventFilter,
    callback: Listener,
}

#[derive(Default)]
struct NotifierInner {
    next_id: u64,
    listeners: Vec<ConnectedListener>,
    subscribers: Vec<Subscriber>,
}

/// Publish/subscribe hub owned by one signal.
#[derive(Default)]
pub struct SignalNotifier {
    inner: Mutex<NotifierInner>,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SignalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous listener.
    pub fn connect<F>(&self, filter: EventFilter, callback: F) -> ListenerId
    where
        F: Fn(&SignalEvent) + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push(ConnectedListener {
            id,
            filter,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut inner = lock(&self.inner);
        let before = inner.listeners.len();
        inner.listeners.retain(|l| l.id != id);
        inner.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// Subscribe to events on an `mpsc` channel.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<SignalEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        lock(&self.inner).subscribers.push(Subscriber { filter, sender: tx });
        rx
    }

    /// Deliver an event to subscribers, then to listeners.
    ///
    /// Dead subscribers (dropped receivers) are pruned. Listener callbacks are
    /// invoked after the internal lock is released, so a listener may connect
    /// further listeners or trigger emits on other signals.
    pub fn emit(&self, event: &SignalEvent) {
        let callbacks: Vec<Listener> = {
            let mut inner = lock(&self.inner);
            inner.subscribers.retain(|sub| {
                if sub.filter.matches(event) {
                    sub.sender.send(event.clone()).is_ok()
                } else {
                    true
                }
            });
            inner
                .listeners
                .iter()
                .filter(|l| l.filter.matches(event))
                .map(|l| Arc::clone(&l.callback))
                .collect()
        };
        for cb in callbacks {
            cb(event);
        }
    }
}

impl std::fmt::Debug for SignalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("SignalNotifier")
            .field("listeners", &inner.listeners.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────────────────────────
