//! UCI commands, search parameters and `bestmove` parsing

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use shared::MovePayload;
use std::fmt;
use std::time::Duration;

/// Highest value Stockfish accepts for its `Skill Level` option
pub const MAX_SKILL_LEVEL: u8 = 20;

/// Default fixed search depth
pub const DEFAULT_DEPTH: u8 = 15;

/// Engine strength, always within `0..=20`
///
/// Out-of-range inputs are clamped rather than rejected, both when
/// constructed and when deserialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct SkillLevel(u8);

impl SkillLevel {
    pub const MIN: SkillLevel = SkillLevel(0);
    pub const MAX: SkillLevel = SkillLevel(MAX_SKILL_LEVEL);

    #[must_use]
    pub fn new(level: i64) -> Self {
        Self(level.clamp(0, i64::from(MAX_SKILL_LEVEL)) as u8)
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<i64> for SkillLevel {
    fn from(level: i64) -> Self {
        Self::new(level)
    }
}

impl From<SkillLevel> for u8 {
    fn from(level: SkillLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands sent to the engine, one per line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    SetOption { name: String, value: String },
    Position { fen: String },
    GoDepth(u8),
    Stop,
    Quit,
}

impl UciCommand {
    #[must_use]
    pub fn skill(level: SkillLevel) -> Self {
        UciCommand::SetOption {
            name: "Skill Level".to_string(),
            value: level.to_string(),
        }
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::UciNewGame => f.write_str("ucinewgame"),
            UciCommand::SetOption { name, value } => {
                write!(f, "setoption name {name} value {value}")
            }
            UciCommand::Position { fen } => {
                // One command per line, whatever the caller passed in
                f.write_str("position fen")?;
                let tokens = fen
                    .split(|c: char| c.is_whitespace() || c.is_control())
                    .filter(|t| !t.is_empty());
                for token in tokens {
                    write!(f, " {token}")?;
                }
                Ok(())
            }
            UciCommand::GoDepth(depth) => write!(f, "go depth {depth}"),
            UciCommand::Stop => f.write_str("stop"),
            UciCommand::Quit => f.write_str("quit"),
        }
    }
}

/// One bot-move request: a position and the strength to play it at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Position in FEN
    pub position: String,
    pub skill_level: SkillLevel,
}

impl SearchRequest {
    pub fn new(position: impl Into<String>, skill_level: SkillLevel) -> Self {
        Self {
            position: position.into(),
            skill_level,
        }
    }

    /// Check that `position` is a well-formed FEN before it reaches an engine
    ///
    /// Only the shape is checked; whether the
    /// position is legal chess is left to the engine.
    pub fn validate(&self) -> BridgeResult<()> {
        check_fen(&self.position).map_err(|reason| BridgeError::InvalidPosition {
            position: self.position.clone(),
            reason,
        })
    }
}

fn check_fen(fen: &str) -> Result<(), &'static str> {
    if fen.chars().any(|c| c.is_control()) {
        return Err("control characters are not allowed");
    }
    let fields: Vec<&str> = fen.split(' ').collect();
    let [placement, side, castling, en_passant, halfmove, fullmove] = fields[..] else {
        return Err("expected six space-separated fields");
    };

    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err("expected eight ranks");
    }
    for rank in ranks {
        let mut files = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => files += c.to_digit(10).unwrap_or(0),
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => files += 1,
                _ => return Err("unexpected character in piece placement"),
            }
        }
        if files != 8 {
            return Err("rank does not cover eight files");
        }
    }

    if side != "w" && side != "b" {
        return Err("side to move must be w or b");
    }
    let castling_ok = castling == "-"
        || (!castling.is_empty()
            && castling.len() <= 4
            && castling.chars().all(|c| matches!(c, 'K' | 'Q' | 'k' | 'q' | 'A'..='H' | 'a'..='h')));
    if !castling_ok {
        return Err("malformed castling rights");
    }
    let ep_ok = en_passant == "-"
        || matches!(en_passant.as_bytes(), [b'a'..=b'h', b'3' | b'6']);
    if !ep_ok {
        return Err("malformed en passant square");
    }
    let counter_ok = |field: &str| !field.is_empty() && field.len() <= 6 && field.bytes().all(|b| b.is_ascii_digit());
    if !counter_ok(halfmove) || !counter_ok(fullmove) {
        return Err("move counters must be numbers");
    }
    Ok(())
}

/// Answer of the `/bot/move` endpoint
///
/// `move` is `null` both when the engine found no legal move and when it
/// failed; `error` tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMoveResponse {
    #[serde(rename = "move")]
    pub best_move: Option<MovePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BotMoveResponse {
    #[must_use]
    pub fn found(best_move: Option<MovePayload>) -> Self {
        Self {
            best_move,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl ToString) -> Self {
        Self {
            best_move: None,
            error: Some(error.to_string()),
        }
    }
}

/// How searches are run, independent of the position searched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub depth: u8,
    /// Upper bound on one search; `None` waits for the engine indefinitely
    pub timeout: Option<Duration>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            timeout: None,
        }
    }
}

/// Interpret one line of engine output
///
/// Returns `None` for anything that is not a `bestmove` line. For a
/// `bestmove` line, `Ok(None)` means the engine has no move to offer
/// (the side to move is mated or stalemated).
pub fn parse_best_move(line: &str) -> Option<BridgeResult<Option<MovePayload>>> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return None;
    }
    let result = match tokens.next() {
        None | Some("(none)") | Some("0000") => Ok(None),
        Some(text) => MovePayload::from_uci(text)
            .map(Some)
            .map_err(|_| BridgeError::MalformedBestMove(line.to_string())),
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_level_is_clamped() {
        assert_eq!(SkillLevel::new(-3).get(), 0);
        assert_eq!(SkillLevel::new(7).get(), 7);
        assert_eq!(SkillLevel::new(99).get(), 20);
        assert_eq!(SkillLevel::default(), SkillLevel::MIN);
    }

    #[test]
    fn test_skill_level_deserialization_clamps() {
        let level: SkillLevel = serde_json::from_str("35").unwrap();
        assert_eq!(level, SkillLevel::MAX);
        assert_eq!(serde_json::to_string(&SkillLevel::new(4)).unwrap(), "4");
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(UciCommand::Uci.to_string(), "uci");
        assert_eq!(
            UciCommand::skill(SkillLevel::new(3)).to_string(),
            "setoption name Skill Level value 3"
        );
        assert_eq!(
            UciCommand::Position {
                fen: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string()
            }
            .to_string(),
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1"
        );
        assert_eq!(UciCommand::GoDepth(12).to_string(), "go depth 12");
    }

    #[test]
    fn test_position_command_stays_on_one_line() {
        let line = UciCommand::Position {
            fen: "8/8/8/8/8/8/8/K6k w - - 0 1\nsetoption name Debug Log File value /tmp/x".to_string(),
        }
        .to_string();
        assert!(!line.contains('\n'));
        assert!(line.starts_with("position fen 8/8/8/8/8/8/8/K6k w - - 0 1 setoption"));
    }

    #[test]
    fn test_validate_accepts_well_formed_fens() {
        for fen in [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "7k/5Q2/6K1/8/8/8/8/8 b - - 12 40",
        ] {
            assert!(SearchRequest::new(fen, SkillLevel::MIN).validate().is_ok(), "{fen}");
        }
    }

    #[test]
    fn test_validate_rejects_injection_and_junk() {
        let start = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        for fen in [
            format!("{start}\nsetoption name Debug Log File value /tmp/x"),
            format!("{start}\r"),
            "startpos".to_string(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1".to_string(),
            "rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1".to_string(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e4 0 1".to_string(),
            format!("{start} moves e2e4"),
        ] {
            let err = SearchRequest::new(fen.clone(), SkillLevel::MIN).validate().unwrap_err();
            assert!(matches!(err, BridgeError::InvalidPosition { .. }), "{fen:?}");
        }
    }

    #[test]
    fn test_parse_best_move_variants() {
        assert!(parse_best_move("info depth 3 score cp 12").is_none());
        assert!(parse_best_move("readyok").is_none());

        let mv = parse_best_move("bestmove e2e4 ponder e7e5").unwrap().unwrap().unwrap();
        assert_eq!(mv.to_uci(), "e2e4");

        let promo = parse_best_move("bestmove a7a8q").unwrap().unwrap().unwrap();
        assert_eq!(promo.to_uci(), "a7a8q");

        assert!(parse_best_move("bestmove (none)").unwrap().unwrap().is_none());
        assert!(parse_best_move("bestmove 0000").unwrap().unwrap().is_none());
        assert!(parse_best_move("bestmove").unwrap().unwrap().is_none());

        let malformed = parse_best_move("bestmove zz99").unwrap();
        assert!(matches!(malformed, Err(BridgeError::MalformedBestMove(_))));
    }

    #[test]
    fn test_search_request_wire_names() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"position":"startpos-fen","skillLevel":25}"#).unwrap();
        assert_eq!(request.skill_level.get(), 20);
        assert_eq!(request.position, "startpos-fen");
    }

    #[test]
    fn test_bot_move_response_shape() {
        let none = serde_json::to_value(BotMoveResponse::found(None)).unwrap();
        assert_eq!(none, serde_json::json!({"move": null}));

        let failed = serde_json::to_value(BotMoveResponse::failed("engine exited")).unwrap();
        assert_eq!(failed, serde_json::json!({"move": null, "error": "engine exited"}));

        let decoded: BotMoveResponse = serde_json::from_str(
            r#"{"move":{"source":"g8","destination":"f6"}}"#,
        )
        .unwrap();
        assert_eq!(decoded.best_move.unwrap().to_uci(), "g8f6");
    }
}
