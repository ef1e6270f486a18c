//! Line-oriented terminal front end
//!
//! ```text
//! e2e4 / e7e8q   play a move (promotion defaults to queen)
//! moves e2       list legal destinations from a square
//! undo           take back the last move
//! resign         give up the game
//! rematch        ask for (or accept) a new game
//! accept         accept the opponent's rematch request
//! retry          ask the computer again after a failure
//! say <text>     chat with the opponent
//! exit           leave
//! ```

use crate::game::{GameOverReason, SessionStatus};
use crate::networking::{SessionSnapshot, UserCommand};
use shared::{MovePayload, PieceColor, Square};
use std::fmt::Write as _;

pub const HELP: &str = "commands: <move e.g. e2e4>, moves <square>, undo, resign, rematch, accept, retry, say <text>, exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(UserCommand),
    ShowMoves(Square),
    Help,
    Exit,
    Empty,
}

/// Interpret one line typed by the user
pub fn parse_line(line: &str) -> Result<ConsoleInput, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "" => ConsoleInput::Empty,
        "help" | "?" => ConsoleInput::Help,
        "exit" | "quit" => ConsoleInput::Exit,
        "undo" => ConsoleInput::Command(UserCommand::Undo),
        "resign" => ConsoleInput::Command(UserCommand::Resign),
        "rematch" => ConsoleInput::Command(UserCommand::RequestRematch),
        "accept" => ConsoleInput::Command(UserCommand::AcceptRematch),
        "retry" => ConsoleInput::Command(UserCommand::RetryBot),
        "say" => ConsoleInput::Command(UserCommand::Chat(rest.to_string())),
        "moves" => {
            let square = rest
                .parse::<Square>()
                .map_err(|_| format!("not a square: {rest:?}"))?;
            ConsoleInput::ShowMoves(square)
        }
        other => {
            let mv = MovePayload::from_uci(other).map_err(|_| format!("unknown command {other:?}; {HELP}"))?;
            ConsoleInput::Command(UserCommand::Move(mv))
        }
    };
    Ok(input)
}

/// Board diagram from the local player's side, followed by status lines
pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let ranks = board_ranks(snapshot.position.fen());
    let flip = snapshot.local_color == PieceColor::Black;

    let rank_order: Vec<usize> = if flip {
        (0..8).rev().collect()
    } else {
        (0..8).collect()
    };
    for row in rank_order {
        let rank_number = 8 - row;
        let _ = write!(out, "{rank_number} ");
        let mut squares = ranks[row].clone();
        if flip {
            squares.reverse();
        }
        for piece in squares {
            let _ = write!(out, " {piece}");
        }
        out.push('\n');
    }
    out.push_str(if flip {
        "   h g f e d c b a\n"
    } else {
        "   a b c d e f g h\n"
    });

    if let Some(last) = &snapshot.last_move {
        let _ = writeln!(out, "last move: {} ({})", last.payload, last.mover);
    }
    let white_took = snapshot.captures.captured_by(PieceColor::White);
    let black_took = snapshot.captures.captured_by(PieceColor::Black);
    if !white_took.is_empty() || !black_took.is_empty() {
        let letters = |kinds: Vec<shared::PieceKind>| kinds.iter().map(|k| k.letter()).collect::<String>();
        let _ = writeln!(
            out,
            "captured: white {} / black {} (material {:+})",
            letters(white_took),
            letters(black_took),
            snapshot.captures.material_advantage()
        );
    }
    let _ = writeln!(out, "{}", status_line(snapshot));
    if let Some(error) = &snapshot.last_error {
        let _ = writeln!(out, "! {error}");
    }
    out
}

fn status_line(snapshot: &SessionSnapshot) -> String {
    match snapshot.status {
        SessionStatus::Active if snapshot.bot_thinking => "computer is thinking...".to_string(),
        SessionStatus::Active if snapshot.is_my_turn() => {
            format!("your move ({}), ply {}", snapshot.local_color, snapshot.ply)
        }
        SessionStatus::Active => format!("waiting for {}", snapshot.turn),
        SessionStatus::Over(GameOverReason::Checkmate { winner }) if winner == snapshot.local_color => {
            "Checkmate, you win. Type 'rematch' to play again".to_string()
        }
        SessionStatus::Over(_) => format!("{}. Type 'rematch' to play again", snapshot.status.message()),
    }
}

/// Piece letters per rank, rank 8 first; `.` for empty squares
fn board_ranks(fen: &str) -> Vec<Vec<char>> {
    let placement = fen.split_whitespace().next().unwrap_or_default();
    let mut ranks: Vec<Vec<char>> = placement
        .split('/')
        .map(|rank| {
            let mut squares = Vec::with_capacity(8);
            for c in rank.chars() {
                match c.to_digit(10) {
                    Some(empty) => squares.extend(std::iter::repeat('.').take(empty as usize)),
                    None => squares.push(c),
                }
            }
            squares.resize(8, '.');
            squares
        })
        .collect();
    ranks.resize(8, vec!['.'; 8]);
    ranks
}
