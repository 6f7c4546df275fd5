//! Event-driven, multi-threaded UCI engine.
//!
//! The main thread runs an event loop fed by a stdin reader thread;
//! searches run on a worker thread that hands the searcher back when done,
//! so `stop` and `quit` stay responsive mid-search.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use tracing::{debug, info, warn};

use truffle_engine::{
    game_outcome, limits_from_go, GameOutcome, SearchParams, SearchResult, Searcher,
    ENGINE_DEPTH, MATE_SCORE, MATE_THRESHOLD,
};

use crate::command::{parse_command, Command, EngineOption, GamePosition, GoParams};
use crate::error::UciError;

/// Engine state: idle or searching.
enum EngineState {
    Idle,
    Searching,
}

/// Events processed by the main engine loop.
enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone(SearchDone),
    InputClosed,
}

/// Payload returned by the search thread when it finishes.
struct SearchDone {
    result: SearchResult,
    searcher: Searcher,
}

/// The UCI engine, holding the current position and searcher.
pub struct UciEngine {
    position: GamePosition,
    searcher: Option<Searcher>,
    state: EngineState,
    stop_flag: Arc<AtomicBool>,
    threads: usize,
    pending_clear: bool,
}

impl UciEngine {
    /// Create a new engine at the starting position.
    pub fn new() -> Self {
        Self {
            position: GamePosition::startpos(),
            searcher: Some(Searcher::new()),
            state: EngineState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
            threads: 4,
            pending_clear: false,
        }
    }

    /// Run the UCI event loop until `quit` or stdin closes.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        // Stdin reader thread.
        let stdin_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim().to_string();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(cmd = %trimmed, "received UCI command");
                        if stdin_tx
                            .send(EngineEvent::UciCommand(parse_command(&trimmed)))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = stdin_tx.send(EngineEvent::InputClosed);
        });

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(command)) => match command {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => println!("readyok"),
                    Command::UciNewGame => self.handle_ucinewgame(),
                    Command::SetOption(option) => self.handle_setoption(option),
                    Command::Position(position) => self.position = position,
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::Stop => self.handle_stop(),
                    Command::Quit => {
                        if !matches!(self.state, EngineState::Idle) {
                            self.handle_stop();
                            for event in &rx {
                                if let EngineEvent::SearchDone(done) = event {
                                    self.finish_search(done);
                                    break;
                                }
                            }
                        }
                        break;
                    }
                    Command::Unknown(_) => {}
                },
                EngineEvent::UciCommand(Err(error)) => {
                    warn!(error = %error, "UCI parse error");
                }
                EngineEvent::SearchDone(done) => self.finish_search(done),
                EngineEvent::InputClosed => break,
            }
        }

        info!("truffle shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name truffle");
        println!("id author the truffle developers");
        println!("option name Threads type spin default 4 min 1 max 64");
        println!("option name Hash type spin default 64 min 1 max 4096");
        println!("uciok");
    }

    fn handle_ucinewgame(&mut self) {
        self.position = GamePosition::startpos();
        if let Some(ref searcher) = self.searcher {
            searcher.clear_tables();
        } else {
            // Search thread owns the searcher; clear when it comes back.
            self.pending_clear = true;
        }
    }

    fn handle_setoption(&mut self, option: EngineOption) {
        match option {
            EngineOption::Threads(threads) => {
                self.threads = threads.clamp(1, 64);
            }
            EngineOption::Hash(mb) => match self.searcher {
                Some(ref mut searcher) => searcher.resize_tt(mb.clamp(1, 4096)),
                None => warn!("cannot resize hash during search"),
            },
        }
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if !matches!(self.state, EngineState::Idle) {
            warn!("go received while searching, ignoring");
            return;
        }

        // Terminal positions have no move to search for.
        let outcome = game_outcome(
            &self.position.board,
            &self.position.history,
            self.position.halfmove_clock,
        );
        if matches!(outcome, GameOutcome::Checkmate | GameOutcome::Stalemate) {
            println!("info string {}", outcome_string(outcome));
            println!("bestmove 0000");
            return;
        }

        self.stop_flag = Arc::new(AtomicBool::new(false));

        let side = self.position.board.side_to_move();
        let search_control = limits_from_go(
            params.wtime,
            params.btime,
            params.winc,
            params.binc,
            params.movestogo,
            params.movetime,
            params.infinite,
            side,
            Arc::clone(&self.stop_flag),
        );

        let search_params = SearchParams {
            threads: self.threads,
            max_depth: params.depth.unwrap_or(ENGINE_DEPTH),
            q_depth: 10,
        };

        let searcher = self.searcher.take().unwrap_or_default();
        let position = self.position.clone();
        let tx = tx.clone();

        std::thread::spawn(move || {
            let result = searcher.search(
                &position.board,
                &position.history,
                position.halfmove_clock,
                &search_params,
                &search_control,
                |depth, score, nodes, pv| {
                    let elapsed_ms = search_control.elapsed().as_millis().max(1);
                    let nps = (nodes as u128 * 1000) / elapsed_ms;
                    let pv_line: String = pv
                        .iter()
                        .map(|mv| mv.to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    println!(
                        "info depth {} score {} nodes {} nps {} time {} pv {}",
                        depth,
                        format_score(score),
                        nodes,
                        nps,
                        elapsed_ms,
                        pv_line
                    );
                },
            );
            let _ = tx.send(EngineEvent::SearchDone(SearchDone { result, searcher }));
        });

        self.state = EngineState::Searching;
    }

    fn handle_stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    fn finish_search(&mut self, done: SearchDone) {
        let searcher = done.searcher;
        if self.pending_clear {
            searcher.clear_tables();
            self.pending_clear = false;
        }
        self.searcher = Some(searcher);

        match done.result.best_move {
            Some(mv) => println!("bestmove {mv}"),
            None => println!("bestmove 0000"),
        }

        self.state = EngineState::Idle;
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a score for an `info` line: `cp N`, or `mate N` in full moves.
fn format_score(score: i32) -> String {
    if score > MATE_THRESHOLD {
        let plies = MATE_SCORE - score;
        format!("mate {}", (plies + 1) / 2)
    } else if score < -MATE_THRESHOLD {
        let plies = MATE_SCORE + score;
        format!("mate -{}", (plies + 1) / 2)
    } else {
        format!("cp {score}")
    }
}

fn outcome_string(outcome: GameOutcome) -> &'static str {
    match outcome {
        GameOutcome::Ongoing => "ongoing",
        GameOutcome::Checkmate => "checkmate",
        GameOutcome::Stalemate => "stalemate",
        GameOutcome::DrawFifty => "draw by fifty-move rule",
        GameOutcome::DrawRepetition => "draw by repetition",
        GameOutcome::DrawInsufficient => "draw by insufficient material",
    }
}

#[cfg(test)]
mod tests {
    use super::format_score;
    use truffle_engine::MATE_SCORE;

    #[test]
    fn centipawn_scores_format_as_cp() {
        assert_eq!(format_score(42), "cp 42");
        assert_eq!(format_score(-310), "cp -310");
    }

    #[test]
    fn mate_in_one_is_one_move() {
        assert_eq!(format_score(MATE_SCORE - 1), "mate 1");
    }

    #[test]
    fn mate_in_three_plies_is_two_moves() {
        assert_eq!(format_score(MATE_SCORE - 3), "mate 2");
    }

    #[test]
    fn getting_mated_is_negative() {
        assert_eq!(format_score(-(MATE_SCORE - 2)), "mate -1");
    }
}
