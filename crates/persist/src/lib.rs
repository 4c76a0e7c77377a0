//! Lifebox Persistence
//!
//! This crate turns a game's exportable state into bytes and back.
//!
//! # Architecture
//!
//! - `GameState`: the export/import payload (cells, generation, viewport,
//!   population history). UI and tool state are never part of it.
//! - `encode` / `decode`: Protobuf envelope with a SHA-256 checksum over the
//!   encoded state, verified on decode.
//! - `write_state` / `read_state`: file I/O on top of the envelope.

#![deny(unsafe_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lifebox_sim::{Cell, Generation};
use lifebox_wire::{CellProto, GameStateProto, SAVED_GAME_FORMAT_VERSION, SavedGame, ViewportProto};
use prost::Message;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced while decoding or storing a saved game.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Bytes are not a valid saved-game message.
    #[error("failed to decode saved game: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Envelope written by an unknown format version.
    #[error("unsupported saved game format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Envelope carries no state.
    #[error("saved game has no state")]
    MissingState,

    /// State bytes do not hash to the recorded checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// A field holds a value the engine cannot accept.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Refusing to overwrite an existing file.
    #[error("saved game already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

// ============================================================================
// Game State
// ============================================================================

/// Default cell size (logical pixels) when a payload carries no viewport.
pub const DEFAULT_CELL_SIZE: f64 = 20.0;

/// Persisted pan/zoom state. Offsets are in cell units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub offset_x: f64,
    pub offset_y: f64,
    pub cell_size: f64,
    pub zoom: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            cell_size: DEFAULT_CELL_SIZE,
            zoom: 1.0,
        }
    }
}

/// Export/import payload.
///
/// `live_cells` is in row-major order when produced by an export.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub live_cells: Vec<Cell>,
    pub generation: Generation,
    pub viewport: ViewportState,
    pub population_history: Vec<u64>,
}

impl GameState {
    /// Hex SHA-256 of the encoded state. Equal states share a fingerprint.
    pub fn fingerprint(&self) -> String {
        sha256_hex(&GameStateProto::from(self.clone()).encode_to_vec())
    }
}

impl From<ViewportState> for ViewportProto {
    fn from(v: ViewportState) -> Self {
        Self {
            offset_x: v.offset_x,
            offset_y: v.offset_y,
            cell_size: v.cell_size,
            zoom: v.zoom,
        }
    }
}

impl TryFrom<ViewportProto> for ViewportState {
    type Error = PersistError;

    fn try_from(proto: ViewportProto) -> Result<Self, Self::Error> {
        let fields = [
            ("viewport.offset_x", proto.offset_x),
            ("viewport.offset_y", proto.offset_y),
            ("viewport.cell_size", proto.cell_size),
            ("viewport.zoom", proto.zoom),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(PersistError::InvalidField {
                    field,
                    reason: format!("{value} is not finite"),
                });
            }
        }
        Ok(Self {
            offset_x: proto.offset_x,
            offset_y: proto.offset_y,
            cell_size: proto.cell_size,
            zoom: proto.zoom,
        })
    }
}

impl From<GameState> for GameStateProto {
    fn from(state: GameState) -> Self {
        Self {
            live_cells: state.live_cells.into_iter().map(CellProto::from).collect(),
            generation: state.generation,
            viewport: Some(state.viewport.into()),
            population_history: state.population_history,
        }
    }
}

impl TryFrom<GameStateProto> for GameState {
    type Error = PersistError;

    fn try_from(proto: GameStateProto) -> Result<Self, Self::Error> {
        let viewport = match proto.viewport {
            Some(viewport) => viewport.try_into()?,
            None => ViewportState::default(),
        };
        Ok(Self {
            live_cells: proto.live_cells.into_iter().map(Cell::from).collect(),
            generation: proto.generation,
            viewport,
            population_history: proto.population_history,
        })
    }
}

// ============================================================================
// Encode / Decode
// ============================================================================

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Encode a state into a checksummed envelope.
pub fn encode(state: &GameState) -> Vec<u8> {
    let state_proto = GameStateProto::from(state.clone());
    let state_sha256 = sha256_hex(&state_proto.encode_to_vec());
    SavedGame {
        format_version: SAVED_GAME_FORMAT_VERSION,
        state: Some(state_proto),
        state_sha256,
    }
    .encode_to_vec()
}

/// Decode and verify a checksummed envelope.
///
/// # Verification Steps
/// 1. Decode the envelope
/// 2. Check the format version
/// 3. Recompute the state checksum and compare
/// 4. Validate and convert the state
pub fn decode(bytes: &[u8]) -> Result<GameState, PersistError> {
    let saved = SavedGame::decode(bytes)?;

    if saved.format_version != SAVED_GAME_FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found: saved.format_version,
            supported: SAVED_GAME_FORMAT_VERSION,
        });
    }

    let actual = sha256_hex(&saved.state_bytes());
    let state = saved.state.ok_or(PersistError::MissingState)?;
    if actual != saved.state_sha256 {
        return Err(PersistError::ChecksumMismatch {
            expected: saved.state_sha256,
            actual,
        });
    }

    let state = GameState::try_from(state)?;
    debug!(
        cells = state.live_cells.len(),
        generation = state.generation,
        "decoded saved game"
    );
    Ok(state)
}

// ============================================================================
// File I/O
// ============================================================================

/// Write a saved game to a file. Never overwrites an existing file.
pub fn write_state(state: &GameState, path: &Path) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    if path.exists() {
        return Err(PersistError::AlreadyExists(path.to_path_buf()));
    }

    let encoded = encode(state);
    let mut file = fs::File::create(path)?;
    file.write_all(&encoded)?;

    Ok(())
}

/// Read and verify a saved game from a file.
pub fn read_state(path: &Path) -> Result<GameState, PersistError> {
    let data = fs::read(path)?;
    decode(&data)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn sample_state() -> GameState {
        GameState {
            live_cells: vec![Cell::new(-1, 0), Cell::new(0, 0), Cell::new(1, 0)],
            generation: 17,
            viewport: ViewportState {
                offset_x: 4.5,
                offset_y: -2.0,
                cell_size: 12.0,
                zoom: 1.5,
            },
            population_history: vec![5, 4, 3, 3],
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("lifebox-persist-{}-{n}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_decode_verifies_encoded_state() {
        let state = sample_state();
        let decoded = decode(&encode(&state)).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut saved = SavedGame::decode(encode(&sample_state()).as_slice()).unwrap();
        if let Some(ref mut state) = saved.state {
            state.generation += 1;
        }

        let result = decode(&saved.encode_to_vec());
        assert!(matches!(result, Err(PersistError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut saved = SavedGame::decode(encode(&sample_state()).as_slice()).unwrap();
        saved.format_version = 99;

        let result = decode(&saved.encode_to_vec());
        assert!(matches!(
            result,
            Err(PersistError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_missing_state_rejected() {
        let saved = SavedGame {
            format_version: SAVED_GAME_FORMAT_VERSION,
            state: None,
            state_sha256: sha256_hex(&[]),
        };
        let result = decode(&saved.encode_to_vec());
        assert!(matches!(result, Err(PersistError::MissingState)));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let result = decode(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(PersistError::Decode(_))));
    }

    #[test]
    fn test_non_finite_viewport_rejected() {
        let mut state = sample_state();
        state.viewport.cell_size = f64::NAN;

        let result = decode(&encode(&state));
        assert!(matches!(
            result,
            Err(PersistError::InvalidField {
                field: "viewport.cell_size",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_viewport_uses_default() {
        let proto = GameStateProto {
            live_cells: vec![],
            generation: 3,
            viewport: None,
            population_history: vec![],
        };
        let state = GameState::try_from(proto).unwrap();
        assert_eq!(state.viewport, ViewportState::default());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = sample_state();
        let mut b = sample_state();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.live_cells.pop();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_write_then_read_file() {
        let path = temp_path("grid.lifebox");
        let state = sample_state();

        write_state(&state, &path).unwrap();
        assert_eq!(read_state(&path).unwrap(), state);

        let again = write_state(&state, &path);
        assert!(matches!(again, Err(PersistError::AlreadyExists(_))));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    proptest! {
        #[test]
        fn prop_encode_decode_preserves_state(
            coords in proptest::collection::vec((any::<i64>(), any::<i64>()), 0..32),
            generation in any::<u64>(),
            offset_x in -1.0e9f64..1.0e9,
            offset_y in -1.0e9f64..1.0e9,
            history in proptest::collection::vec(0u64..10_000, 0..50),
        ) {
            let state = GameState {
                live_cells: coords.into_iter().map(Cell::from).collect(),
                generation,
                viewport: ViewportState { offset_x, offset_y, ..ViewportState::default() },
                population_history: history,
            };
            prop_assert_eq!(decode(&encode(&state)).unwrap(), state);
        }
    }
}
