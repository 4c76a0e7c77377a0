//! State-change notification for render loops and UI panels.
//!
//! A subscriber is either a single callback that receives every event, or a
//! keyed table with one handler per event kind. A handler that returns an
//! error is logged and skipped; delivery to the remaining subscribers
//! continues.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use lifebox_sim::{Cell, Generation, LiveCells};
use tracing::warn;

use crate::coordinator::EngineMode;
use crate::history::CellChange;
use crate::performance::PerformanceSettings;
use crate::ui::{Overlay, Tool};
use crate::viewport::Viewport;

/// Error returned by a failing subscriber.
pub type ObserverError = Box<dyn Error + Send + Sync>;

/// Result of delivering one event to one handler.
pub type ObserverResult = Result<(), ObserverError>;

/// A boxed event handler.
pub type Handler = Box<dyn FnMut(&Event<'_>) -> ObserverResult>;

/// Subscriber identifier, unique per bus.
pub type SubscriberId = u64;

// ============================================================================
// Events
// ============================================================================

/// Event discriminant, used to key handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CellChanged,
    CellsChangedBulk,
    GameStep,
    GameCleared,
    RunningStateChanged,
    ViewportChanged,
    SelectedToolChanged,
    SelectedShapeChanged,
    OverlayChanged,
    CursorPositionChanged,
    ColorSchemeChanged,
    EngineModeChanged,
    PerformanceSettingsChanged,
    ShapePlaced,
    StateImported,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CellChanged => "cellChanged",
            Self::CellsChangedBulk => "cellsChangedBulk",
            Self::GameStep => "gameStep",
            Self::GameCleared => "gameCleared",
            Self::RunningStateChanged => "runningStateChanged",
            Self::ViewportChanged => "viewportChanged",
            Self::SelectedToolChanged => "selectedToolChanged",
            Self::SelectedShapeChanged => "selectedShapeChanged",
            Self::OverlayChanged => "overlayChanged",
            Self::CursorPositionChanged => "cursorPositionChanged",
            Self::ColorSchemeChanged => "colorSchemeChanged",
            Self::EngineModeChanged => "engineModeChanged",
            Self::PerformanceSettingsChanged => "performanceSettingsChanged",
            Self::ShapePlaced => "shapePlaced",
            Self::StateImported => "stateImported",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, borrowing from the engine for the duration of delivery.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    CellChanged {
        cell: Cell,
        alive: bool,
    },
    /// Several cells changed in one action (bulk edit, undo, redo).
    CellsChangedBulk {
        changes: &'a [CellChange],
    },
    GameStep {
        generation: Generation,
        population: usize,
        live_cells: &'a LiveCells,
    },
    GameCleared,
    RunningStateChanged {
        running: bool,
    },
    ViewportChanged {
        viewport: Viewport,
    },
    SelectedToolChanged {
        tool: Tool,
    },
    SelectedShapeChanged {
        shape: Option<&'a str>,
    },
    OverlayChanged {
        overlay: Option<&'a Overlay>,
    },
    CursorPositionChanged {
        position: Option<Cell>,
    },
    ColorSchemeChanged {
        scheme: Option<&'a str>,
    },
    EngineModeChanged {
        mode: EngineMode,
    },
    PerformanceSettingsChanged {
        settings: PerformanceSettings,
    },
    ShapePlaced {
        origin: Cell,
        cells_placed: usize,
    },
    StateImported {
        generation: Generation,
        population: usize,
    },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CellChanged { .. } => EventKind::CellChanged,
            Self::CellsChangedBulk { .. } => EventKind::CellsChangedBulk,
            Self::GameStep { .. } => EventKind::GameStep,
            Self::GameCleared => EventKind::GameCleared,
            Self::RunningStateChanged { .. } => EventKind::RunningStateChanged,
            Self::ViewportChanged { .. } => EventKind::ViewportChanged,
            Self::SelectedToolChanged { .. } => EventKind::SelectedToolChanged,
            Self::SelectedShapeChanged { .. } => EventKind::SelectedShapeChanged,
            Self::OverlayChanged { .. } => EventKind::OverlayChanged,
            Self::CursorPositionChanged { .. } => EventKind::CursorPositionChanged,
            Self::ColorSchemeChanged { .. } => EventKind::ColorSchemeChanged,
            Self::EngineModeChanged { .. } => EventKind::EngineModeChanged,
            Self::PerformanceSettingsChanged { .. } => EventKind::PerformanceSettingsChanged,
            Self::ShapePlaced { .. } => EventKind::ShapePlaced,
            Self::StateImported { .. } => EventKind::StateImported,
        }
    }
}

// ============================================================================
// Subscribers
// ============================================================================

/// Either a catch-all callback or a per-event handler table.
pub enum Subscriber {
    Callback(Handler),
    Keyed(HashMap<EventKind, Handler>),
}

impl Subscriber {
    /// A callback receiving every event.
    pub fn callback(handler: impl FnMut(&Event<'_>) -> ObserverResult + 'static) -> Self {
        Self::Callback(Box::new(handler))
    }

    /// An empty handler table; add entries with [`Subscriber::on`].
    pub fn keyed() -> Self {
        Self::Keyed(HashMap::new())
    }

    /// Add a handler for one event kind. A no-op on callback subscribers.
    pub fn on(
        mut self,
        kind: EventKind,
        handler: impl FnMut(&Event<'_>) -> ObserverResult + 'static,
    ) -> Self {
        if let Self::Keyed(ref mut table) = self {
            table.insert(kind, Box::new(handler));
        }
        self
    }

    fn deliver(&mut self, event: &Event<'_>) -> ObserverResult {
        match self {
            Self::Callback(handler) => handler(event),
            Self::Keyed(table) => match table.get_mut(&event.kind()) {
                Some(handler) => handler(event),
                None => Ok(()),
            },
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Subscriber::Callback"),
            Self::Keyed(table) => f
                .debug_tuple("Subscriber::Keyed")
                .field(&table.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Ordered set of subscribers.
#[derive(Debug, Default)]
pub struct ObserverBus {
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_id: SubscriberId,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriberId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver an event to every subscriber in subscription order.
    ///
    /// Returns the number of subscribers that failed.
    pub fn notify(&mut self, event: &Event<'_>) -> usize {
        let mut failures = 0;
        for (id, subscriber) in &mut self.subscribers {
            if let Err(error) = subscriber.deliver(event) {
                failures += 1;
                warn!(
                    subscriber = *id,
                    event = event.kind().as_str(),
                    %error,
                    "observer failed"
                );
            }
        }
        failures
    }
}

// ============================================================================
// Tests
// ============================================================================
