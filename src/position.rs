use shakmaty::{
    fen::Fen,
    san::SanPlus,
    uci::UciMove,
    CastlingMode, Chess, Color, EnPassantMode, Move, Piece, Position as _, Role, Square,
};

use crate::error::{Error, Result};

/// A chess position that accepts moves in SAN or long algebraic form.
///
/// Wraps `shakmaty::Chess`, which is authoritative for legality, castling
/// rights, en-passant capture, promotion handling, and the halfmove clock.
#[derive(Debug, Clone)]
pub struct Position {
    inner: Chess,
}

/// Descriptor returned by a successful [`Position::apply`].
#[derive(Debug, Clone)]
pub struct PlayedMove {
    /// SAN rendering with standard disambiguation and `+`/`#` suffix.
    pub san: String,
    pub from: Option<Square>,
    pub to: Square,
    pub capture: bool,
    pub promotion: Option<Role>,
    pub castle: bool,
    pub gives_check: bool,
    pub gives_mate: bool,
}

impl Position {
    /// The standard initial position.
    pub fn new() -> Self {
        Self {
            inner: Chess::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        let fen: Fen = fen.parse()?;
        Ok(Self {
            inner: fen.into_position(CastlingMode::Standard)?,
        })
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.inner.clone(), EnPassantMode::Legal).to_string()
    }

    /// FEN with the halfmove clock and fullmove number stripped, the
    /// fingerprint used for repetition counting and opening lookup.
    pub fn eco_fen(&self) -> String {
        strip_counters(&self.fen())
    }

    pub fn turn(&self) -> Color {
        self.inner.turn()
    }

    pub fn fullmove(&self) -> u32 {
        u32::from(self.inner.fullmoves())
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.inner.halfmoves()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.inner.legal_moves().into_iter().collect()
    }

    pub fn legal_move_count(&self) -> usize {
        self.inner.legal_moves().len()
    }

    pub fn in_check(&self) -> bool {
        self.inner.is_check()
    }

    pub fn is_mate(&self) -> bool {
        self.inner.is_checkmate()
    }

    pub fn is_stalemate(&self) -> bool {
        self.inner.is_stalemate()
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.inner.board().piece_at(square)
    }

    pub fn board(&self) -> &shakmaty::Board {
        self.inner.board()
    }

    /// Applies a move given as a SAN token (`Nf3`, `O-O`, `exd8=Q+`) or a
    /// long-algebraic token (`e2e4`, `e7e8q`).
    ///
    /// Fails with [`Error::IllegalMove`] when the token does not resolve to
    /// exactly one legal move, leaving the position unchanged.
    pub fn apply(&mut self, token: &str) -> Result<PlayedMove> {
        let m = self.resolve(token)?;
        let from = m.from();
        let to = m.to();
        let capture = m.is_capture();
        let promotion = m.promotion();
        let castle = m.is_castle();
        let san = SanPlus::from_move_and_play_unchecked(&mut self.inner, &m);
        Ok(PlayedMove {
            san: san.to_string(),
            from,
            to,
            capture,
            promotion,
            castle,
            gives_check: self.in_check(),
            gives_mate: self.is_mate(),
        })
    }

    fn resolve(&self, token: &str) -> Result<Move> {
        // Long algebraic first: a square pair is never ambiguous.
        if let Ok(uci) = UciMove::from_ascii(token.as_bytes()) {
            if let Ok(m) = uci.to_move(&self.inner) {
                return Ok(m);
            }
        }
        let san: SanPlus = token
            .parse()
            .map_err(|_| Error::IllegalMove(token.to_string()))?;
        san.san
            .to_move(&self.inner)
            .map_err(|_| Error::IllegalMove(token.to_string()))
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops the trailing halfmove clock and fullmove number from a FEN.
pub fn strip_counters(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn initial_position_fen() {
        assert_eq!(Position::new().fen(), START_FEN);
    }

    #[test]
    fn fen_round_trip() {
        let fens = [
            START_FEN,
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
            "8/8/8/4k3/8/4K3/4P3/8 w - - 12 40",
        ];
        for fen in fens {
            let pos = Position::from_fen(fen).unwrap();
            assert_eq!(pos.fen(), fen);
            let again = Position::from_fen(&pos.fen()).unwrap();
            assert_eq!(again.fen(), pos.fen());
        }
    }

    #[test]
    fn eco_fen_strips_counters() {
        assert_eq!(
            Position::new().eco_fen(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"
        );
    }

    #[test]
    fn lan_tokens_convert_to_san() {
        let mut pos = Position::new();
        let sans: Vec<String> = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6"]
            .iter()
            .map(|lan| pos.apply(lan).unwrap().san)
            .collect();
        assert_eq!(sans, vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"]);
    }

    #[test]
    fn san_tokens_apply() {
        let mut pos = Position::new();
        for san in ["e4", "e5", "Nf3", "Nc6", "Bb5"] {
            pos.apply(san).unwrap();
        }
        assert_eq!(pos.fullmove(), 3);
        assert_eq!(pos.turn(), Color::Black);
    }

    #[test]
    fn illegal_move_leaves_position_unchanged() {
        let mut pos = Position::new();
        let before = pos.fen();
        assert!(pos.apply("e5").is_err());
        assert!(pos.apply("e2e5").is_err());
        assert!(pos.apply("Nf6").is_err());
        assert_eq!(pos.fen(), before);
    }

    #[test]
    fn promotion_and_capture_flags() {
        let mut pos = Position::from_fen("3r4/4P3/8/8/8/8/8/K2k4 w - - 0 1").unwrap();
        let played = pos.apply("e7d8q").unwrap();
        assert_eq!(played.san, "exd8=Q+");
        assert!(played.capture);
        assert_eq!(played.promotion, Some(Role::Queen));
        assert!(played.gives_check);
    }

    #[test]
    fn mate_is_flagged() {
        let mut pos = Position::new();
        for san in ["e4", "e5", "Bc4", "Nc6", "Qh5", "Nf6"] {
            pos.apply(san).unwrap();
        }
        let played = pos.apply("Qxf7").unwrap();
        assert_eq!(played.san, "Qxf7#");
        assert!(played.gives_mate);
        assert!(pos.is_mate());
    }

    #[test]
    fn halfmove_clock_tracks_quiet_moves() {
        let mut pos = Position::new();
        pos.apply("Nf3").unwrap();
        pos.apply("Nf6").unwrap();
        assert_eq!(pos.halfmove_clock(), 2);
        pos.apply("e4").unwrap();
        assert_eq!(pos.halfmove_clock(), 0);
    }
}
