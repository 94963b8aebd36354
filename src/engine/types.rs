use std::fmt;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Wall-clock deadline for each handshake phase (`uciok`, `readyok`).
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long each rung of the shutdown ladder waits for the engine to exit.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Centipawn anchor for mate scores: mate in one converts to this value,
/// mate in k to `round(MATE_IN_ONE_CP / k)`.
pub const MATE_IN_ONE_CP: i32 = 2000;

// =============================================================================
// Scores
// =============================================================================

/// An engine evaluation, from the perspective of the side to move in the
/// position it was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns.
    Cp(i32),
    /// Forced mate in the given number of moves; negative means the side to
    /// move gets mated.
    Mate(i32),
}

impl Score {
    /// Collapses the score to centipawns for loss arithmetic.
    pub fn to_cp(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) => {
                let k = n.abs().max(1);
                let magnitude = (f64::from(MATE_IN_ONE_CP) / f64::from(k)).round() as i32;
                if n < 0 {
                    -magnitude
                } else {
                    magnitude
                }
            }
        }
    }

    /// The same score seen from the other side.
    pub fn invert(self) -> Score {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Score::Mate(n) if *n < 0 => write!(f, "-M{}", -n),
            Score::Mate(n) => write!(f, "M{n}"),
        }
    }
}

// =============================================================================
// Search limits
// =============================================================================

/// How each `go` cycle is bounded. The engine enforces the limit; the
/// driver does not time analysis cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoMode {
    /// Fixed search depth in plies.
    Depth(u32),
    /// Fixed time per move in milliseconds.
    MoveTime(u64),
}

impl GoMode {
    pub fn command(&self) -> String {
        match self {
            GoMode::Depth(depth) => format!("go depth {depth}"),
            GoMode::MoveTime(millis) => format!("go movetime {millis}"),
        }
    }
}

// =============================================================================
// Evaluation results
// =============================================================================

/// Harvest of one completed `go` cycle.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub score: Score,
    /// Principal variation in long algebraic form, the latest complete one
    /// the engine reported.
    pub pv: Vec<String>,
    /// First move of the last complete PV, or the `bestmove` token when no
    /// PV arrived.
    pub best_move: String,
    /// Depth reached when the last accepted info line was produced.
    pub depth: u32,
}
