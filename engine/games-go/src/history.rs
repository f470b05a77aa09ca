//! Game history: move sequence, superko, game end, and scoring.
//!
//! `BoardHistory` owns the board snapshots for every position reached so
//! that the book's hashing can look back over the repetition window, and so
//! positional superko can be checked against recent situations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, Loc, Player};

/// Ruleset parameters relevant to the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rules {
    /// Points added to White's score.
    pub komi: f64,
}

impl Default for Rules {
    fn default() -> Self {
        Rules { komi: 7.0 }
    }
}

/// A move as recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub loc: Loc,
    pub pla: Player,
}

#[derive(Debug, Error)]
#[error("illegal move {loc} by {pla}")]
pub struct IllegalMoveError {
    pub loc: Loc,
    pub pla: Player,
}

/// The full history of a game: initial position, moves, and derived state.
#[derive(Debug, Clone)]
pub struct BoardHistory {
    pub rules: Rules,
    pub initial_board: Board,
    pub initial_pla: Player,
    pub move_history: Vec<Move>,
    /// Width of the repetition window used for superko and book hashing.
    pub rep_bound: usize,
    /// Board after each position; `boards[0]` is the initial board.
    boards: Vec<Board>,
    /// Situation hash at each position, parallel to `boards`.
    situation_hashes: Vec<u128>,
    /// Player to move at each position, parallel to `boards`.
    players: Vec<Player>,
    consecutive_passes: u32,
    pub is_game_finished: bool,
    pub is_past_normal_phase_end: bool,
    pub is_no_result: bool,
    pub winner: Option<Player>,
    pub final_white_minus_black_score: f64,
}

impl BoardHistory {
    pub fn new(initial_board: Board, initial_pla: Player, rules: Rules, rep_bound: usize) -> Self {
        let hash = initial_board.situation_hash(initial_pla);
        BoardHistory {
            rules,
            boards: vec![initial_board.clone()],
            situation_hashes: vec![hash],
            players: vec![initial_pla],
            initial_board,
            initial_pla,
            move_history: Vec::new(),
            rep_bound,
            consecutive_passes: 0,
            is_game_finished: false,
            is_past_normal_phase_end: false,
            is_no_result: false,
            winner: None,
            final_white_minus_black_score: 0.0,
        }
    }

    /// The player presumed to move next.
    #[inline]
    pub fn presumed_next_pla(&self) -> Player {
        *self.players.last().expect("history always has a position")
    }

    /// The current board.
    #[inline]
    pub fn current_board(&self) -> &Board {
        self.boards.last().expect("history always has a position")
    }

    /// Number of positions in the history (moves played + 1).
    #[inline]
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.move_history.is_empty()
    }

    /// Board snapshots of the most recent positions, oldest first, limited
    /// to the repetition window. Includes the current position.
    pub fn recent_boards(&self) -> &[Board] {
        let window = (self.rep_bound + 1).min(self.boards.len());
        &self.boards[self.boards.len() - window..]
    }

    /// Players to move for each of `recent_boards`, parallel slices.
    pub fn recent_players(&self) -> &[Player] {
        let window = (self.rep_bound + 1).min(self.players.len());
        &self.players[self.players.len() - window..]
    }

    #[inline]
    pub fn consecutive_passes(&self) -> u32 {
        self.consecutive_passes
    }

    /// Whether any capture occurred within the repetition window, or a ko
    /// point is currently active. When this is false, no position in the
    /// window can recur, so repetition state cannot affect legality.
    pub fn recent_window_is_repeatable(&self) -> bool {
        if self.current_board().ko_loc().is_some() {
            return true;
        }
        let boards = self.recent_boards();
        let moves_in_window = boards.len() - 1;
        let moves = &self.move_history[self.move_history.len() - moves_in_window..];
        for (i, m) in moves.iter().enumerate() {
            if m.loc != Loc::Pass
                && boards[i + 1].stone_count() != boards[i].stone_count() + 1
            {
                return true;
            }
        }
        false
    }

    /// Situation hash of the current position, for keying scripted search
    /// responses and transposition checks.
    pub fn current_situation_hash(&self) -> u128 {
        *self
            .situation_hashes
            .last()
            .expect("history always has a position")
    }

    /// Legality including positional superko within the repetition window.
    pub fn is_legal(&self, loc: Loc, pla: Player) -> bool {
        let board = self.current_board();
        if !board.is_legal(loc, pla) {
            return false;
        }
        if loc == Loc::Pass {
            return true;
        }
        // Superko: replaying must not recreate a recent situation.
        let mut next = board.clone();
        next.play_move_assume_legal(loc, pla);
        let next_hash = next.situation_hash(pla.opponent());
        let window = self.rep_bound.min(self.situation_hashes.len());
        !self.situation_hashes[self.situation_hashes.len() - window..]
            .iter()
            .any(|&h| h == next_hash)
    }

    /// Play a move, enforcing full legality.
    pub fn make_move(&mut self, loc: Loc, pla: Player) -> Result<(), IllegalMoveError> {
        if !self.is_legal(loc, pla) {
            return Err(IllegalMoveError { loc, pla });
        }
        self.make_move_assume_legal(loc, pla);
        Ok(())
    }

    /// Play a move checking only board-level legality. Used when replaying
    /// records that may come from a different ruleset.
    pub fn make_move_tolerant(&mut self, loc: Loc, pla: Player) -> Result<(), IllegalMoveError> {
        if !self.current_board().is_legal(loc, pla) {
            return Err(IllegalMoveError { loc, pla });
        }
        self.make_move_assume_legal(loc, pla);
        Ok(())
    }

    fn make_move_assume_legal(&mut self, loc: Loc, pla: Player) {
        let mut board = self.current_board().clone();
        board.play_move_assume_legal(loc, pla);
        let next_pla = pla.opponent();

        if loc == Loc::Pass {
            self.consecutive_passes += 1;
        } else {
            self.consecutive_passes = 0;
        }

        self.move_history.push(Move { loc, pla });
        self.situation_hashes.push(board.situation_hash(next_pla));
        self.boards.push(board);
        self.players.push(next_pla);

        // Two consecutive passes end the game under this ruleset; that is
        // also the end of the normal phase.
        if self.consecutive_passes >= 2 {
            self.is_game_finished = true;
            self.is_past_normal_phase_end = true;
            let score =
                self.current_board().area_score_white_minus_black() + self.rules.komi;
            self.final_white_minus_black_score = score;
            self.winner = if score > 0.0 {
                Some(Player::White)
            } else if score < 0.0 {
                Some(Player::Black)
            } else {
                None
            };
        }
    }
}
