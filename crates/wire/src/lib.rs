//! Lifebox Wire Types
//!
//! This crate defines the Protobuf message types used to persist and exchange
//! a game's state (live cells, generation, viewport, population history).
//! Both the persistence layer and any transport that ships saved grids
//! depend on these definitions.
//!
//! Tool, selection and other UI state is never part of these messages.

#![deny(unsafe_code)]

use prost::Message;

use lifebox_sim::Cell;

// ============================================================================
// Type Aliases (matching simulation crate)
// ============================================================================

/// Generation type alias for wire protocol.
pub type Generation = u64;

/// Current persisted-state format version.
pub const SAVED_GAME_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Messages
// ============================================================================

/// A single live cell.
///
/// Coordinates use zigzag encoding; negative coordinates are as common as
/// positive ones on an unbounded grid.
#[derive(Clone, PartialEq, Message)]
pub struct CellProto {
    #[prost(sint64, tag = "1")]
    pub x: i64,

    #[prost(sint64, tag = "2")]
    pub y: i64,
}

/// Pan/zoom state. Offsets are in cell units, not pixels.
#[derive(Clone, PartialEq, Message)]
pub struct ViewportProto {
    #[prost(double, tag = "1")]
    pub offset_x: f64,

    #[prost(double, tag = "2")]
    pub offset_y: f64,

    #[prost(double, tag = "3")]
    pub cell_size: f64,

    #[prost(double, tag = "4")]
    pub zoom: f64,
}

/// Exported game state.
#[derive(Clone, PartialEq, Message)]
pub struct GameStateProto {
    /// Live cells, row-major order.
    #[prost(message, repeated, tag = "1")]
    pub live_cells: Vec<CellProto>,

    #[prost(uint64, tag = "2")]
    pub generation: Generation,

    #[prost(message, optional, tag = "3")]
    pub viewport: Option<ViewportProto>,

    /// Population per applied step, most recent last.
    #[prost(uint64, repeated, tag = "4")]
    pub population_history: Vec<u64>,
}

/// Envelope written to disk or sent to a grids backend.
#[derive(Clone, PartialEq, Message)]
pub struct SavedGame {
    /// Schema version (starts at 1).
    #[prost(uint32, tag = "1")]
    pub format_version: u32,

    #[prost(message, optional, tag = "2")]
    pub state: Option<GameStateProto>,

    /// Lowercase hex SHA-256 of the encoded `state` message.
    #[prost(string, tag = "3")]
    pub state_sha256: String,
}

impl SavedGame {
    /// Encoded bytes of the embedded state, as covered by the checksum.
    pub fn state_bytes(&self) -> Vec<u8> {
        self.state
            .as_ref()
            .map(Message::encode_to_vec)
            .unwrap_or_default()
    }
}

// ============================================================================
// Conversion Traits
// ============================================================================

impl From<Cell> for CellProto {
    fn from(cell: Cell) -> Self {
        Self {
            x: cell.x,
            y: cell.y,
        }
    }
}

impl From<CellProto> for Cell {
    fn from(proto: CellProto) -> Self {
        Cell::new(proto.x, proto.y)
    }
}

// ============================================================================
// Tests
// ============================================================================
