use shakmaty::Color;

use crate::analyze::{AnnotatedGame, Judgment, MoveRecord, PerSide};

/// The Seven Tag Roster, always emitted first and in this order.
const ROSTER: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];

/// Tags this tool produces itself; originals with these names are dropped
/// so no tag appears twice.
const GENERATED: [&str; 20] = [
    "Analyzer",
    "Annotator",
    "ECO",
    "Variation",
    "Scid-ECO",
    "White-Moves",
    "Black-Moves",
    "White-Forced-Moves",
    "Black-Forced-Moves",
    "White-Errors",
    "Black-Errors",
    "White-Blunders",
    "Black-Blunders",
    "White-Errors-Per-Move",
    "Black-Errors-Per-Move",
    "White-Blunders-Per-Move",
    "Black-Blunders-Per-Move",
    "White-Loss-Per-Move",
    "Black-Loss-Per-Move",
    "Game",
];

pub const WRAP_COLUMN: usize = 80;

/// Serializes an annotated game: ordered tag section, blank line, wrapped
/// move text with inline comments, trailing blank line.
pub fn write_game(game: &AnnotatedGame, annotator: &str) -> String {
    let mut out = String::new();
    let result = game.result_token();

    for name in ROSTER {
        let value = match name {
            "Result" => result,
            "Date" => game.tag(name).unwrap_or("????.??.??"),
            _ => game.tag(name).unwrap_or("?"),
        };
        push_tag(&mut out, name, value);
    }

    let mut rest: Vec<&(String, String)> = game
        .tags
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .collect();
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in rest {
        push_tag(&mut out, name, value);
    }

    push_tag(&mut out, "Annotator", annotator);
    if !game.engine_name.is_empty() {
        push_tag(&mut out, "Analyzer", &game.engine_name);
    }
    if let Some(eco) = &game.eco {
        push_tag(&mut out, "ECO", &eco.code);
        if !eco.variation.is_empty() {
            push_tag(&mut out, "Variation", &eco.variation);
        }
        if let Some(alt) = &eco.alt_code {
            push_tag(&mut out, "Scid-ECO", alt);
        }
    }
    push_side_tags(&mut out, "White", &game.white);
    push_side_tags(&mut out, "Black", &game.black);

    out.push('\n');
    out.push_str(&wrap_movetext(&movetext(game)));
    out.push('\n');
    out.push('\n');
    out
}

fn is_reserved(name: &str) -> bool {
    ROSTER.contains(&name) || GENERATED.contains(&name)
}

fn push_tag(out: &mut String, name: &str, value: &str) {
    out.push('[');
    out.push_str(&escape(name, ']'));
    out.push_str(" \"");
    out.push_str(&escape(value, '"'));
    out.push_str("\"]\n");
}

/// Backslash-escapes `\` and the given delimiter.
fn escape(text: &str, delimiter: char) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || c == delimiter {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_side_tags(out: &mut String, side: &str, stats: &PerSide) {
    push_tag(out, &format!("{side}-Moves"), &stats.moves.to_string());
    push_tag(out, &format!("{side}-Forced-Moves"), &stats.forced.to_string());
    push_tag(out, &format!("{side}-Errors"), &stats.errors.to_string());
    push_tag(out, &format!("{side}-Blunders"), &stats.blunders.to_string());
    push_tag(
        out,
        &format!("{side}-Errors-Per-Move"),
        &format!("{:.2}", stats.errors_per_move()),
    );
    push_tag(
        out,
        &format!("{side}-Blunders-Per-Move"),
        &format!("{:.2}", stats.blunders_per_move()),
    );
    push_tag(
        out,
        &format!("{side}-Loss-Per-Move"),
        &format!("{:.2}", stats.loss_per_move()),
    );
}

fn movetext(game: &AnnotatedGame) -> String {
    let mut text = String::new();
    let last = game.moves.len().checked_sub(1);
    for (i, record) in game.moves.iter().enumerate() {
        if record.color == Color::White {
            text.push_str(&format!("{}. ", record.number));
        } else if i == 0 {
            text.push_str(&format!("{}. ... ", record.number));
        }
        text.push_str(&record.san);
        text.push_str(&comment_for(record));
        if Some(i) == last {
            if let Some(termination) = game.termination {
                text.push_str(&format!(" {{ {} }}", termination.describe()));
            }
        }
        text.push(' ');
    }
    text.push_str(game.result_token());
    text
}

fn comment_for(record: &MoveRecord) -> String {
    match record.judgment {
        Judgment::Ok => {
            let score = record.played_score.unwrap_or(record.best_score);
            format!(" {{ ({score}) }}")
        }
        Judgment::Error { .. } | Judgment::Blunder { .. } => {
            let label = match record.judgment {
                Judgment::Blunder { .. } => "Blunder!",
                _ => "Error!",
            };
            let played = record.played_score.unwrap_or(record.best_score);
            let mut comment = format!(" {{ ({played}/{}) {label}", record.best_score);
            if let Some(best) = &record.best_san {
                comment.push_str(&format!(" Better: {best}"));
            }
            comment.push_str(" }");
            if !record.pv.is_empty() {
                comment.push_str(&format!(" ({})", record.pv.join(" ")));
            }
            comment
        }
    }
}

/// Breaks the assembled move text at the last whitespace not immediately
/// preceded by a `.`, whenever the running column reaches the limit. Lines
/// only exceed the limit where no safe break exists, and move-number dots
/// stay glued to their numerals.
pub fn wrap_movetext(text: &str) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(text.len() + 8);
    let mut column = 0usize;
    let mut safe: Option<usize> = None;
    for &byte in text.as_bytes() {
        out.push(byte);
        column += 1;
        if byte == b' ' {
            let preceding = out.len().checked_sub(2).map(|i| out[i]);
            if preceding != Some(b'.') {
                safe = Some(out.len() - 1);
            }
        }
        if column >= WRAP_COLUMN {
            if let Some(index) = safe.take() {
                out[index] = b'\n';
                column = out.len() - index - 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{AnnotatedGame, Judgment, MoveRecord, PerSide};
    use crate::eco::EcoRecord;
    use crate::engine::Score;
    use crate::outcome::Termination;

    fn record(number: u32, color: Color, san: &str) -> MoveRecord {
        MoveRecord {
            number,
            color,
            san: san.to_string(),
            best_san: None,
            pv: Vec::new(),
            best_score: Score::Cp(20),
            played_score: Some(Score::Cp(15)),
            judgment: Judgment::Ok,
        }
    }

    fn fixture() -> AnnotatedGame {
        AnnotatedGame {
            tags: vec![
                ("Event".to_string(), "Club Championship".to_string()),
                ("WhiteElo".to_string(), "2100".to_string()),
                ("Annotator".to_string(), "someone else".to_string()),
                ("BlackElo".to_string(), "2050".to_string()),
                ("Result".to_string(), "1-0".to_string()),
            ],
            moves: vec![
                record(1, Color::White, "e4"),
                record(1, Color::Black, "e5"),
            ],
            termination: None,
            eco: Some(EcoRecord {
                code: "C20".to_string(),
                opening: "King's Pawn Game".to_string(),
                variation: "Open".to_string(),
                alt_code: None,
            }),
            white: PerSide::default(),
            black: PerSide::default(),
            engine_name: "Stockfish 16".to_string(),
            original_result: Some("1-0".to_string()),
        }
    }

    fn tag_names(output: &str) -> Vec<String> {
        output
            .lines()
            .take_while(|line| line.starts_with('['))
            .map(|line| {
                line.trim_start_matches('[')
                    .split_whitespace()
                    .next()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn roster_comes_first_in_order() {
        let output = write_game(&fixture(), "pgn-annotator 0.3.1");
        let names = tag_names(&output);
        assert_eq!(
            &names[..7],
            &["Event", "Site", "Date", "Round", "White", "Black", "Result"]
        );
    }

    #[test]
    fn remaining_tags_sort_and_tool_tags_never_duplicate() {
        let output = write_game(&fixture(), "pgn-annotator 0.3.1");
        let names = tag_names(&output);
        // Original extra tags, sorted, right after the roster.
        assert_eq!(&names[7..9], &["BlackElo", "WhiteElo"]);
        // The input's own Annotator tag is superseded, not duplicated.
        assert_eq!(names.iter().filter(|n| *n == "Annotator").count(), 1);
        for name in &names {
            assert_eq!(
                names.iter().filter(|n| n == &name).count(),
                1,
                "duplicated tag {name}"
            );
        }
    }

    #[test]
    fn sentinel_defaults_fill_missing_roster_tags() {
        let mut game = fixture();
        game.tags.clear();
        let output = write_game(&game, "pgn-annotator 0.3.1");
        assert!(output.contains("[Site \"?\"]"));
        assert!(output.contains("[Date \"????.??.??\"]"));
        assert!(output.contains("[Round \"?\"]"));
    }

    #[test]
    fn eco_and_analyzer_tags_are_stamped() {
        let output = write_game(&fixture(), "pgn-annotator 0.3.1");
        assert!(output.contains("[Analyzer \"Stockfish 16\"]"));
        assert!(output.contains("[ECO \"C20\"]"));
        assert!(output.contains("[Variation \"Open\"]"));
        assert!(output.contains("[White-Moves \"0\"]"));
        assert!(output.contains("[Black-Loss-Per-Move \"0.00\"]"));
    }

    #[test]
    fn tag_values_are_escaped() {
        let mut game = fixture();
        game.tags
            .push(("Site".to_string(), "The \"Dive\" \\ Bar".to_string()));
        let output = write_game(&game, "pgn-annotator 0.3.1");
        assert!(output.contains("[Site \"The \\\"Dive\\\" \\\\ Bar\"]"));
    }

    #[test]
    fn movetext_carries_score_comments() {
        let output = write_game(&fixture(), "pgn-annotator 0.3.1");
        assert!(output.contains("1. e4 { (+0.15) } e5 { (+0.15) } 1-0"));
    }

    #[test]
    fn blunders_carry_better_move_and_pv() {
        let mut game = fixture();
        game.moves[1].judgment = Judgment::Blunder { loss: 320 };
        game.moves[1].played_score = Some(Score::Cp(-305));
        game.moves[1].best_score = Score::Cp(15);
        game.moves[1].best_san = Some("Nc6".to_string());
        game.moves[1].pv = vec!["1. ... Nc6".to_string()];
        let output = write_game(&game, "pgn-annotator 0.3.1");
        assert!(output.contains("e5 { (-3.05/+0.15) Blunder! Better: Nc6 } (1. ... Nc6)"));
    }

    #[test]
    fn termination_overrides_result_and_adds_a_comment() {
        let mut game = fixture();
        game.termination = Some(Termination::Stalemate);
        let output = write_game(&game, "pgn-annotator 0.3.1");
        assert!(output.contains("[Result \"1/2-1/2\"]"));
        assert!(output.contains("{ Stalemate } 1/2-1/2"));
    }

    #[test]
    fn wrapping_respects_the_column_limit() {
        let mut text = String::new();
        for number in 1..=17 {
            text.push_str(&format!("{number}. e4e5 d4d5 "));
        }
        text.push_str("18. Kd2# 1-0");
        let wrapped = wrap_movetext(&text);
        assert!(wrapped.lines().count() >= 2);
        for line in wrapped.lines() {
            assert!(line.len() <= WRAP_COLUMN, "line too long: {line:?}");
            assert!(!line.ends_with('.'), "broke after a move number: {line:?}");
        }
        assert_eq!(wrapped.replace('\n', " "), text);
    }

    #[test]
    fn wrapping_never_detaches_move_numbers() {
        // Spaces after "N." are unsafe; the wrapper must back up to the
        // previous token boundary instead.
        let text = "111. Qa8 ".repeat(30);
        let wrapped = wrap_movetext(text.trim_end());
        for line in wrapped.lines() {
            assert!(!line.ends_with("111."));
        }
    }

    #[test]
    fn short_text_is_untouched() {
        let text = "1. e4 e5 2. Nf3 1/2-1/2";
        assert_eq!(wrap_movetext(text), text);
    }
}
