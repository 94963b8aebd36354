//! Per-game analysis: drives the engine over every half-move, compares the
//! played move to the engine's preferred one, classifies the difference,
//! and aggregates per-side statistics.

use log::{debug, info, warn};
use shakmaty::Color;

use crate::eco::{EcoBook, EcoRecord};
use crate::engine::{Evaluation, GoMode, Score, UciEngine};
use crate::error::{Error, Result};
use crate::outcome::{self, RepetitionTable, Termination};
use crate::pgn::read::RawGame;
use crate::position::Position;

/// Centipawn loss thresholds for mistake classification.
pub const ERROR_THRESHOLD: i32 = 50;
pub const BLUNDER_THRESHOLD: i32 = 100;

/// Verdict on one played move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Ok,
    Error { loss: i32 },
    Blunder { loss: i32 },
}

/// Annotation record for one half-move.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    /// Fullmove number the move was played at.
    pub number: u32,
    pub color: Color,
    pub san: String,
    /// SAN of the engine's preferred move, when it differs from the played one.
    pub best_san: Option<String>,
    /// Engine's best line from before the move, converted to SAN and
    /// prefixed with move numbers.
    pub pv: Vec<String>,
    /// Evaluation of the position the move was played from, mover's view.
    pub best_score: Score,
    /// Evaluation of the position the move produced, mover's view. Absent
    /// for the final move of a game.
    pub played_score: Option<Score>,
    pub judgment: Judgment,
}

/// Running totals for one side.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerSide {
    pub moves: u32,
    pub forced: u32,
    pub errors: u32,
    pub blunders: u32,
    pub loss: i64,
}

impl PerSide {
    pub fn errors_per_move(&self) -> f64 {
        ratio(self.errors as f64, self.moves as f64)
    }

    pub fn blunders_per_move(&self) -> f64 {
        ratio(self.blunders as f64, self.moves as f64)
    }

    /// Average centipawn loss over the side's unforced moves.
    pub fn loss_per_move(&self) -> f64 {
        ratio(self.loss as f64, f64::from(self.moves - self.forced))
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// A fully analyzed game, ready for emission.
#[derive(Debug, Clone)]
pub struct AnnotatedGame {
    /// Original tag pairs, in input order.
    pub tags: Vec<(String, String)>,
    pub moves: Vec<MoveRecord>,
    pub termination: Option<Termination>,
    pub eco: Option<EcoRecord>,
    pub white: PerSide,
    pub black: PerSide,
    /// Engine identity, for the Analyzer tag.
    pub engine_name: String,
    /// Result token from the input, kept unless a terminal state overrides it.
    pub original_result: Option<String>,
}

impl AnnotatedGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn result_token(&self) -> &str {
        if let Some(termination) = self.termination {
            return termination.result_token();
        }
        self.original_result.as_deref().unwrap_or("*")
    }
}

/// Drives one engine over a stream of games.
pub struct Annotator<'a> {
    engine: &'a mut UciEngine,
    book: &'a EcoBook,
    go: GoMode,
}

impl<'a> Annotator<'a> {
    pub fn new(engine: &'a mut UciEngine, book: &'a EcoBook, go: GoMode) -> Self {
        Self { engine, book, go }
    }

    /// Replays and evaluates every half-move of a game. Fails only on
    /// engine loss or an unreplayable move list; everything else degrades.
    pub async fn annotate(&mut self, game: &RawGame) -> Result<AnnotatedGame> {
        let mut pos = Position::new();
        let mut repetitions = RepetitionTable::new(&pos);
        let mut records: Vec<MoveRecord> = Vec::new();
        let mut infos: Vec<Evaluation> = Vec::new();
        let mut termination = None;
        let mut eco = None;
        let mut white = PerSide::default();
        let mut black = PerSide::default();

        for (ply, token) in game.moves.iter().enumerate() {
            let mover = pos.turn();
            let number = pos.fullmove();
            if pos.legal_move_count() == 1 {
                side_mut(&mut white, &mut black, mover).forced += 1;
            }

            let info = self.engine.evaluate(&pos.fen(), self.go).await?;
            debug!(
                "ply {}: {} to move, engine prefers {} ({})",
                ply + 1,
                name_of(mover),
                info.best_move,
                info.score
            );

            let before = pos.clone();
            let played = pos.apply(token).map_err(|_| {
                Error::IllegalMove(format!("{token} at move {number} cannot be replayed"))
            })?;
            side_mut(&mut white, &mut black, mover).moves += 1;

            if let Some(terminal) = outcome::probe(&pos, &mut repetitions) {
                info!("game over after {}: {}", played.san, terminal.describe());
                records.push(MoveRecord {
                    number,
                    color: mover,
                    san: played.san,
                    best_san: None,
                    pv: Vec::new(),
                    best_score: info.score,
                    played_score: None,
                    judgment: Judgment::Ok,
                });
                infos.push(info);
                termination = Some(terminal);
                break;
            }

            let (best_san, pv) = best_line(&before, &info, &played.san);
            records.push(MoveRecord {
                number,
                color: mover,
                san: played.san,
                best_san,
                pv,
                best_score: info.score,
                played_score: None,
                judgment: Judgment::Ok,
            });
            infos.push(info);

            if let Some(hit) = self.book.lookup(&pos.eco_fen()) {
                eco = Some(hit.clone());
            }
        }

        // The played move's score is the evaluation of the position it
        // produced, which arrives with the next half-move's engine cycle.
        for i in 0..records.len() {
            if i + 1 >= infos.len() {
                break;
            }
            let played_score = infos[i + 1].score.invert();
            records[i].played_score = Some(played_score);
            let loss = infos[i].score.to_cp() - played_score.to_cp();
            let side = side_mut(&mut white, &mut black, records[i].color);
            if loss >= 0 {
                side.loss += i64::from(loss);
            }
            records[i].judgment = classify(loss);
            match records[i].judgment {
                Judgment::Error { .. } => side.errors += 1,
                Judgment::Blunder { .. } => side.blunders += 1,
                Judgment::Ok => {}
            }
        }

        Ok(AnnotatedGame {
            tags: game.tags.clone(),
            moves: records,
            termination,
            eco,
            white,
            black,
            engine_name: self.engine.name().to_string(),
            original_result: game
                .result
                .clone()
                .or_else(|| game.tag("Result").map(str::to_string)),
        })
    }
}

/// Loss below zero means the engine liked the played move better than its
/// own earlier choice; that is noise, not a mistake.
pub fn classify(loss: i32) -> Judgment {
    if loss >= BLUNDER_THRESHOLD {
        Judgment::Blunder { loss }
    } else if loss >= ERROR_THRESHOLD {
        Judgment::Error { loss }
    } else {
        Judgment::Ok
    }
}

/// SAN of the engine's preferred move (when it differs from the played one)
/// and the numbered SAN rendering of its line, both from the position the
/// move was played from.
fn best_line(before: &Position, info: &Evaluation, played_san: &str) -> (Option<String>, Vec<String>) {
    let mut probe = before.clone();
    let best_san = match probe.apply(&info.best_move) {
        Ok(best) if best.san == played_san => None,
        Ok(best) => Some(best.san),
        Err(_) => {
            warn!("engine suggested illegal move {}", info.best_move);
            None
        }
    };
    (best_san, number_pv(before, &info.pv))
}

/// Converts a long-algebraic PV into numbered SAN, stopping at the first
/// token that does not replay. White plies get `N.` prepended; a leading
/// black ply gets `N. ...`.
pub fn number_pv(start: &Position, pv: &[String]) -> Vec<String> {
    let mut pos = start.clone();
    let mut out = Vec::with_capacity(pv.len());
    for (i, token) in pv.iter().enumerate() {
        let number = pos.fullmove();
        let white_to_move = pos.turn() == Color::White;
        let Ok(played) = pos.apply(token) else {
            break;
        };
        if white_to_move {
            out.push(format!("{number}. {}", played.san));
        } else if i == 0 {
            out.push(format!("{number}. ... {}", played.san));
        } else {
            out.push(played.san);
        }
    }
    out
}

fn side_mut<'s>(white: &'s mut PerSide, black: &'s mut PerSide, color: Color) -> &'s mut PerSide {
    match color {
        Color::White => white,
        Color::Black => black,
    }
}

fn name_of(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}
