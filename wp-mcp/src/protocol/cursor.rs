// Cursor codec
//
// Cursors are URL-safe base64 of a minimal JSON position. Anything that does
// not decode cleanly is treated as the start of the sequence.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

/// Resume point of a paginated listing
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    /// Index of the sub-sequence (resource type) being walked
    #[serde(default, skip_serializing_if = "is_zero")]
    pub segment: usize,
    /// Offset inside the current sub-sequence
    #[serde(default)]
    pub offset: usize,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl Position {
    pub const START: Position = Position { segment: 0, offset: 0 };

    pub fn at(offset: usize) -> Self {
        Self { segment: 0, offset }
    }

    pub fn in_segment(segment: usize, offset: usize) -> Self {
        Self { segment, offset }
    }

    pub fn is_start(&self) -> bool {
        *self == Self::START
    }
}

/// Encode a position as an opaque cursor string
pub fn encode(position: Position) -> String {
    // Serializing two integers cannot fail
    let json = serde_json::to_vec(&position).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a cursor, falling back to the start of the sequence
pub fn decode(cursor: &str) -> Position {
    URL_SAFE_NO_PAD
        .decode(cursor.trim().as_bytes())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Position>(&bytes).ok())
        .unwrap_or_else(|| {
            log::debug!("Ignoring malformed cursor {:?}", cursor);
            Position::START
        })
}

/// Decode an optional cursor argument
pub fn decode_opt(cursor: Option<&str>) -> Position {
    cursor.map(decode).unwrap_or(Position::START)
}
