//! Opening classification against a tab-separated ECO book.
//!
//! Each book row names an ECO code, an opening name, and the move sequence
//! that reaches it (`B33\tSicilian Defense: Sveshnikov\t1. e4 c5 …`). Rows
//! are replayed from the initial position and indexed by the resulting
//! counter-stripped FEN, so transpositions hit the same record regardless
//! of move order. An optional fourth column carries an alternate (Scid)
//! code.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};
use shakmaty::{fen::Fen, san::SanPlus, Chess, EnPassantMode, Position as _};

use crate::error::Result;
use crate::position::strip_counters;

#[derive(Debug, Clone)]
pub struct EcoRecord {
    pub code: String,
    pub opening: String,
    pub variation: String,
    pub alt_code: Option<String>,
}

/// Read-only opening book, shared by every game of a run.
#[derive(Debug, Default)]
pub struct EcoBook {
    by_fen: HashMap<String, EcoRecord>,
}

impl EcoBook {
    /// A book with no entries; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let book = Self::from_reader(File::open(path)?)?;
        info!("loaded {} opening positions from {}", book.len(), path.display());
        Ok(book)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut by_fen = HashMap::new();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(reader);
        for row in rdr.records() {
            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping malformed opening row: {e}");
                    continue;
                }
            };
            let (Some(code), Some(name), Some(moves)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                continue;
            };
            let Some(fen) = fingerprint(moves) else {
                warn!("skipping opening with unplayable moves: {name}");
                continue;
            };
            let (opening, variation) = split_name(name);
            let alt_code = record
                .get(3)
                .filter(|alt| !alt.is_empty())
                .map(str::to_string);
            // Later rows win, so deeper files can refine earlier ones.
            by_fen.insert(
                fen,
                EcoRecord {
                    code: code.to_string(),
                    opening,
                    variation,
                    alt_code,
                },
            );
        }
        Ok(Self { by_fen })
    }

    pub fn len(&self) -> usize {
        self.by_fen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fen.is_empty()
    }

    /// Looks a position up by its counter-stripped FEN.
    pub fn lookup(&self, eco_fen: &str) -> Option<&EcoRecord> {
        self.by_fen.get(eco_fen)
    }
}

/// Replays a book line and returns the reached position's fingerprint.
/// Move numbers and annotations are skipped; an illegal move voids the row.
fn fingerprint(movetext: &str) -> Option<String> {
    let mut pos = Chess::default();
    for token in movetext.split_whitespace() {
        let Ok(san) = token.parse::<SanPlus>() else {
            continue;
        };
        match san.san.to_move(&pos) {
            Ok(m) => pos.play_unchecked(&m),
            Err(_) => {
                debug!("illegal book move {token}");
                return None;
            }
        }
    }
    let fen = Fen::from_position(pos, EnPassantMode::Legal).to_string();
    Some(strip_counters(&fen))
}

/// Book names read `Opening: Variation, Sub-variation`; everything after
/// the first colon is the variation.
fn split_name(name: &str) -> (String, String) {
    match name.split_once(':') {
        Some((opening, variation)) => (opening.trim().to_string(), variation.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    }
}
