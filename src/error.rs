use std::io;

/// Error type for the annotation pipeline.
///
/// Fatal variants (engine death, handshake timeout, an unreplayable move
/// list) abort the run after shutdown escalation; everything recoverable is
/// logged at the site where it occurs and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("engine handshake timed out")]
    HandshakeTimeout,

    #[error("engine exited unexpectedly ({0})")]
    EngineExited(String),

    #[error("no stdin handle for engine process")]
    NoStdin,

    #[error("no stdout handle for engine process")]
    NoStdout,

    #[error("engine would not terminate")]
    ShutdownFailed,

    #[error("invalid engine state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("FEN parsing error: {0}")]
    FenParsing(#[from] shakmaty::fen::ParseFenError),

    #[error("position setup error: {0}")]
    PositionSetup(#[from] shakmaty::PositionError<shakmaty::Chess>),
}

pub type Result<T> = std::result::Result<T, Error>;
