//! PGN input and output.
//!
//! Reading is deliberately thin: a game is its tag pairs plus the SAN
//! tokens of the main line, with comments, variations, and annotation
//! glyphs stripped (the annotator regenerates all commentary). Writing
//! produces the full annotated game per the emitter's tag-ordering and
//! wrapping rules.

pub mod read;
pub mod write;

pub use read::{parse_games, RawGame};
pub use write::write_game;
