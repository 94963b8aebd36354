use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r#"^\[([^\s"\]]+)\s+"((?:[^"\\]|\\.)*)"\]"#).unwrap();
    static ref COMMENT_RE: Regex = Regex::new(r"\{[^}]*\}").unwrap();
    static ref VARIATION_RE: Regex = Regex::new(r"\([^()]*\)").unwrap();
    static ref NAG_RE: Regex = Regex::new(r"\$\d+").unwrap();
    static ref MOVE_RE: Regex =
        Regex::new(r"O-O-O[+#]?|O-O[+#]?|[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?")
            .unwrap();
    static ref RESULT_RE: Regex = Regex::new(r"1/2-1/2|1-0|0-1|\*").unwrap();
}

/// One game as parsed from the input: ordered tag pairs and the SAN tokens
/// of the main line.
#[derive(Debug, Clone, Default)]
pub struct RawGame {
    pub tags: Vec<(String, String)>,
    pub moves: Vec<String>,
    /// Result token found in the movetext, if any.
    pub result: Option<String>,
}

impl RawGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Splits a PGN file into games. A new game starts at the first tag line
/// after movetext has been seen.
pub fn parse_games(text: &str) -> Vec<RawGame> {
    let mut games = Vec::new();
    let mut tags: Vec<(String, String)> = Vec::new();
    let mut movetext = String::new();
    let mut in_movetext = false;

    for line in text.lines() {
        let line = line.trim();
        if let Some(caps) = TAG_RE.captures(line) {
            if in_movetext {
                games.push(finish_game(
                    std::mem::take(&mut tags),
                    std::mem::take(&mut movetext),
                ));
                in_movetext = false;
            }
            tags.push((caps[1].to_string(), unescape(&caps[2])));
        } else if !line.is_empty() {
            movetext.push_str(line);
            movetext.push(' ');
            in_movetext = true;
        }
    }
    if in_movetext || !tags.is_empty() {
        games.push(finish_game(tags, movetext));
    }
    games
}

fn finish_game(tags: Vec<(String, String)>, movetext: String) -> RawGame {
    let stripped = COMMENT_RE.replace_all(&movetext, " ");
    // Variations may nest; peel them from the inside out.
    let mut stripped = stripped.into_owned();
    while VARIATION_RE.is_match(&stripped) {
        stripped = VARIATION_RE.replace_all(&stripped, " ").into_owned();
    }
    let stripped = NAG_RE.replace_all(&stripped, " ");

    let moves = MOVE_RE
        .find_iter(&stripped)
        .map(|m| m.as_str().to_string())
        .collect();
    let result = RESULT_RE
        .find_iter(&stripped)
        .last()
        .map(|m| m.as_str().to_string());
    RawGame {
        tags,
        moves,
        result,
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_game_parses() {
        let pgn = r#"[Event "Casual Game"]
[White "Player1"]
[Black "Player2"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 1-0"#;

        let games = parse_games(pgn);
        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert_eq!(game.tag("White"), Some("Player1"));
        assert_eq!(game.tag("Event"), Some("Casual Game"));
        assert_eq!(game.moves, vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(game.result.as_deref(), Some("1-0"));
    }

    #[test]
    fn comments_variations_and_nags_are_stripped() {
        let pgn = "[White \"A\"]\n\n1. e4 {best by test} e5 $1 (1... c5 (1... e6)) 2. Nf3 *";
        let games = parse_games(pgn);
        assert_eq!(games[0].moves, vec!["e4", "e5", "Nf3"]);
        assert_eq!(games[0].result.as_deref(), Some("*"));
    }

    #[test]
    fn multiple_games_split_on_tag_lines() {
        let pgn = "[White \"A\"]\n\n1. e4 e5 *\n\n[White \"B\"]\n\n1. d4 d5 1/2-1/2\n";
        let games = parse_games(pgn);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].tag("White"), Some("A"));
        assert_eq!(games[0].moves, vec!["e4", "e5"]);
        assert_eq!(games[1].tag("White"), Some("B"));
        assert_eq!(games[1].moves, vec!["d4", "d5"]);
        assert_eq!(games[1].result.as_deref(), Some("1/2-1/2"));
    }

    #[test]
    fn castling_and_promotions_tokenize() {
        let pgn = "1. d4 d5 2. O-O-O e8=Q+ 3. O-O *";
        let games = parse_games(pgn);
        assert_eq!(games[0].moves, vec!["d4", "d5", "O-O-O", "e8=Q+", "O-O"]);
    }

    #[test]
    fn escaped_quotes_in_tag_values() {
        let pgn = "[Event \"The \\\"Big\\\" One\"]\n\n1. e4 *";
        let games = parse_games(pgn);
        assert_eq!(games[0].tag("Event"), Some("The \"Big\" One"));
    }

    #[test]
    fn movetext_spanning_lines_joins() {
        let pgn = "[White \"A\"]\n\n1. e4 e5\n2. Nf3 Nc6\n3. Bb5 1-0";
        let games = parse_games(pgn);
        assert_eq!(games[0].moves.len(), 5);
    }
}
