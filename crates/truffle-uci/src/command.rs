//! UCI command parsing.

use std::str::FromStr;
use std::time::Duration;

use chess::{Board, ChessMove, Piece};

use crate::error::UciError;

/// A position plus the bookkeeping the search needs for draw detection:
/// the Zobrist hashes of every earlier position and the fifty-move clock.
/// The `chess` crate's `Board` carries neither.
#[derive(Debug, Clone)]
pub struct GamePosition {
    /// The position to search.
    pub board: Board,
    /// Hashes of all positions before `board`, game start first.
    pub history: Vec<u64>,
    /// Halfmove clock of `board`.
    pub halfmove_clock: u32,
}

impl GamePosition {
    /// The standard starting position with empty history.
    pub fn startpos() -> Self {
        Self {
            board: Board::default(),
            history: Vec::new(),
            halfmove_clock: 0,
        }
    }
}

/// Parameters for the `go` command. All fields optional; bare `go`
/// searches at the default depth cap without a clock.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    /// White's remaining time.
    pub wtime: Option<Duration>,
    /// Black's remaining time.
    pub btime: Option<Duration>,
    /// White's increment per move.
    pub winc: Option<Duration>,
    /// Black's increment per move.
    pub binc: Option<Duration>,
    /// Moves until the next time control.
    pub movestogo: Option<u32>,
    /// Search to this depth only.
    pub depth: Option<i32>,
    /// Search for exactly this duration.
    pub movetime: Option<Duration>,
    /// Search until `stop`.
    pub infinite: bool,
}

/// An engine option set via `setoption`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOption {
    /// `Threads` — root-split worker count.
    Threads(usize),
    /// `Hash` — transposition table size in megabytes.
    Hash(usize),
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` — identify the engine.
    Uci,
    /// `isready` — synchronization ping.
    IsReady,
    /// `ucinewgame` — reset engine state.
    UciNewGame,
    /// `setoption name <name> value <value>`.
    SetOption(EngineOption),
    /// `position` — set up a position with optional moves applied.
    Position(GamePosition),
    /// `go` — start searching.
    Go(GoParams),
    /// `stop` — halt the current search.
    Stop,
    /// `quit` — exit.
    Quit,
    /// Unrecognized command (ignored per UCI convention).
    Unknown(String),
}

/// Parse a single line of UCI input.
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        "setoption" => parse_setoption(&tokens[1..]),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse `setoption name <name> value <value>`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.len() < 4 || tokens[0] != "name" || tokens[2] != "value" {
        return Err(UciError::MalformedOption);
    }
    let value = tokens[3];
    match tokens[1].to_ascii_lowercase().as_str() {
        "threads" => {
            let threads = value.parse().map_err(|_| UciError::MalformedOption)?;
            Ok(Command::SetOption(EngineOption::Threads(threads)))
        }
        "hash" => {
            let mb = value.parse().map_err(|_| UciError::MalformedOption)?;
            Ok(Command::SetOption(EngineOption::Hash(mb)))
        }
        _ => Ok(Command::Unknown(format!("setoption {}", tokens[1]))),
    }
}

/// Parse the `position` command.
///
/// Supports `position startpos [moves ...]` and
/// `position fen <6 fields> [moves ...]`. Applied moves maintain the
/// halfmove clock and the hash history for repetition detection.
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (mut position, rest) = if tokens[0] == "startpos" {
        (GamePosition::startpos(), &tokens[1..])
    } else if tokens[0] == "fen" {
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let board = Board::from_str(&fen).map_err(|_| UciError::InvalidFen { fen: fen.clone() })?;
        // The chess crate drops the halfmove field; recover it ourselves.
        let halfmove_clock = tokens[5].parse().unwrap_or(0);
        (
            GamePosition {
                board,
                history: Vec::new(),
                halfmove_clock,
            },
            &tokens[7..],
        )
    } else {
        return Err(UciError::MalformedPosition);
    };

    if !rest.is_empty() && rest[0] == "moves" {
        for uci_move in &rest[1..] {
            let mv = ChessMove::from_str(uci_move).map_err(|_| UciError::InvalidMove {
                uci_move: uci_move.to_string(),
            })?;
            if !position.board.legal(mv) {
                return Err(UciError::InvalidMove {
                    uci_move: uci_move.to_string(),
                });
            }

            let resets_clock = position.board.piece_on(mv.get_dest()).is_some()
                || position.board.piece_on(mv.get_source()) == Some(Piece::Pawn);
            position.halfmove_clock = if resets_clock {
                0
            } else {
                position.halfmove_clock + 1
            };

            position.history.push(position.board.get_hash());
            position.board = position.board.make_move_new(mv);
        }
    }

    Ok(Command::Position(position))
}

/// Parse the `go` command parameters.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();
    let mut index = 0;

    fn value<'a>(tokens: &[&'a str], index: usize, param: &str) -> Result<&'a str, UciError> {
        tokens.get(index + 1).copied().ok_or(UciError::MissingGoValue {
            param: param.to_string(),
        })
    }

    fn millis(raw: &str, param: &str) -> Result<Duration, UciError> {
        raw.parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| UciError::InvalidGoValue {
                param: param.to_string(),
                value: raw.to_string(),
            })
    }

    while index < tokens.len() {
        match tokens[index] {
            "wtime" => {
                params.wtime = Some(millis(value(tokens, index, "wtime")?, "wtime")?);
                index += 2;
            }
            "btime" => {
                params.btime = Some(millis(value(tokens, index, "btime")?, "btime")?);
                index += 2;
            }
            "winc" => {
                params.winc = Some(millis(value(tokens, index, "winc")?, "winc")?);
                index += 2;
            }
            "binc" => {
                params.binc = Some(millis(value(tokens, index, "binc")?, "binc")?);
                index += 2;
            }
            "movestogo" => {
                let raw = value(tokens, index, "movestogo")?;
                params.movestogo = Some(raw.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "movestogo".to_string(),
                    value: raw.to_string(),
                })?);
                index += 2;
            }
            "depth" => {
                let raw = value(tokens, index, "depth")?;
                params.depth = Some(raw.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "depth".to_string(),
                    value: raw.to_string(),
                })?);
                index += 2;
            }
            "movetime" => {
                params.movetime = Some(millis(value(tokens, index, "movetime")?, "movetime")?);
                index += 2;
            }
            "infinite" => {
                params.infinite = true;
                index += 1;
            }
            // Unsupported parameters (ponder, nodes, mate, searchmoves)
            // are skipped without their values breaking the parse.
            _ => {
                index += 1;
            }
        }
    }

    Ok(Command::Go(params))
}
