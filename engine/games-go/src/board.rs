//! Go board: stones, captures, simple ko, and Zobrist position hashing.
//!
//! The board tracks a 128-bit Zobrist hash of the stone configuration that
//! is updated incrementally as stones are placed and removed. Zobrist
//! tables are generated once from a fixed ChaCha20 seed so hashes are
//! identical across processes, which the book's persistence depends on.

use once_cell::sync::Lazy;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::symmetry::Symmetry;
use crate::MAX_LEN;

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Player {
    Black,
    White,
}

impl Player {
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    #[inline]
    fn stone(self) -> u8 {
        match self {
            Player::Black => BLACK,
            Player::White => WHITE,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "black"),
            Player::White => write!(f, "white"),
        }
    }
}

/// A move location: a point on the board or a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Loc {
    Pass,
    Point { x: u8, y: u8 },
}

/// Column letters used in coordinate display, skipping `I` per Go convention.
const COL_LETTERS: &[u8] = b"ABCDEFGHJKLMNOPQRST";

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::Pass => write!(f, "pass"),
            Loc::Point { x, y } => {
                write!(f, "{}{}", COL_LETTERS[*x as usize] as char, *y as u16 + 1)
            }
        }
    }
}

pub const EMPTY: u8 = 0;
pub const BLACK: u8 = 1;
pub const WHITE: u8 = 2;

const NEIGHBORS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

struct Zobrist {
    /// Keyed by [stone - 1][y * MAX_LEN + x].
    stones: [[u128; MAX_LEN * MAX_LEN]; 2],
    /// Keyed by [y * MAX_LEN + x]; mixed in for the ko point.
    ko: [u128; MAX_LEN * MAX_LEN],
    white_to_move: u128,
}

static ZOBRIST: Lazy<Zobrist> = Lazy::new(|| {
    // Fixed seed: hashes must be stable across runs for saved books.
    let mut rng = ChaCha20Rng::seed_from_u64(0x9e3779b97f4a7c15);
    let mut next = || (rng.next_u64() as u128) << 64 | rng.next_u64() as u128;
    let mut stones = [[0u128; MAX_LEN * MAX_LEN]; 2];
    let mut ko = [0u128; MAX_LEN * MAX_LEN];
    for table in stones.iter_mut() {
        for v in table.iter_mut() {
            *v = next();
        }
    }
    for v in ko.iter_mut() {
        *v = next();
    }
    let white_to_move = next();
    Zobrist {
        stones,
        ko,
        white_to_move,
    }
});

/// A Go board position with incremental Zobrist hashing and simple-ko state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    x_size: usize,
    y_size: usize,
    stones: Vec<u8>,
    ko_loc: Option<Loc>,
    pos_hash: u128,
}

impl Board {
    pub fn new(x_size: usize, y_size: usize) -> Board {
        assert!(
            (2..=MAX_LEN).contains(&x_size) && (2..=MAX_LEN).contains(&y_size),
            "board size {x_size}x{y_size} out of range"
        );
        Board {
            x_size,
            y_size,
            stones: vec![EMPTY; x_size * y_size],
            ko_loc: None,
            pos_hash: 0,
        }
    }

    #[inline]
    pub fn x_size(&self) -> usize {
        self.x_size
    }

    #[inline]
    pub fn y_size(&self) -> usize {
        self.y_size
    }

    #[inline]
    pub fn ko_loc(&self) -> Option<Loc> {
        self.ko_loc
    }

    /// Zobrist hash of the stone configuration (ko and player excluded).
    #[inline]
    pub fn pos_hash(&self) -> u128 {
        self.pos_hash
    }

    /// Hash of the full situation: stones, ko point, and player to move.
    pub fn situation_hash(&self, next_pla: Player) -> u128 {
        let mut h = self.pos_hash;
        if let Some(Loc::Point { x, y }) = self.ko_loc {
            h ^= ZOBRIST.ko[y as usize * MAX_LEN + x as usize];
        }
        if next_pla == Player::White {
            h ^= ZOBRIST.white_to_move;
        }
        h
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.x_size + x
    }

    #[inline]
    pub fn stone(&self, x: usize, y: usize) -> u8 {
        self.stones[self.idx(x, y)]
    }

    #[inline]
    pub fn is_on_board(&self, loc: Loc) -> bool {
        match loc {
            Loc::Pass => true,
            Loc::Point { x, y } => (x as usize) < self.x_size && (y as usize) < self.y_size,
        }
    }

    fn zobrist_for(stone: u8, x: usize, y: usize) -> u128 {
        ZOBRIST.stones[(stone - 1) as usize][y * MAX_LEN + x]
    }

    /// Place or remove a stone directly, clearing any ko state.
    /// Used for initial-position setup; does not perform captures.
    pub fn set_stone(&mut self, x: usize, y: usize, stone: u8) {
        let idx = self.idx(x, y);
        let old = self.stones[idx];
        if old != EMPTY {
            self.pos_hash ^= Self::zobrist_for(old, x, y);
        }
        if stone != EMPTY {
            self.pos_hash ^= Self::zobrist_for(stone, x, y);
        }
        self.stones[idx] = stone;
        self.ko_loc = None;
    }

    fn place(&mut self, x: usize, y: usize, stone: u8) {
        let idx = self.idx(x, y);
        debug_assert_eq!(self.stones[idx], EMPTY);
        self.stones[idx] = stone;
        self.pos_hash ^= Self::zobrist_for(stone, x, y);
    }

    fn remove(&mut self, x: usize, y: usize) {
        let idx = self.idx(x, y);
        let old = self.stones[idx];
        debug_assert_ne!(old, EMPTY);
        self.stones[idx] = EMPTY;
        self.pos_hash ^= Self::zobrist_for(old, x, y);
    }

    /// Flood-fill the group containing (x, y) into `group`.
    fn find_group(&self, x: usize, y: usize, group: &mut Vec<(usize, usize)>) {
        group.clear();
        let color = self.stone(x, y);
        if color == EMPTY {
            return;
        }
        let mut visited = vec![false; self.x_size * self.y_size];
        let mut stack = vec![(x, y)];
        visited[self.idx(x, y)] = true;
        while let Some((cx, cy)) = stack.pop() {
            group.push((cx, cy));
            for &(dx, dy) in &NEIGHBORS {
                let nx = cx as i32 + dx;
                let ny = cy as i32 + dy;
                if nx >= 0 && ny >= 0 && (nx as usize) < self.x_size && (ny as usize) < self.y_size
                {
                    let (nx, ny) = (nx as usize, ny as usize);
                    if !visited[self.idx(nx, ny)] && self.stone(nx, ny) == color {
                        visited[self.idx(nx, ny)] = true;
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }

    fn group_has_liberties(&self, group: &[(usize, usize)]) -> bool {
        for &(x, y) in group {
            for &(dx, dy) in &NEIGHBORS {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx >= 0 && ny >= 0 && (nx as usize) < self.x_size && (ny as usize) < self.y_size
                {
                    if self.stone(nx as usize, ny as usize) == EMPTY {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Board-level legality: on an empty point, not the ko point, not suicide.
    /// Positional superko is enforced one level up, in `BoardHistory`.
    pub fn is_legal(&self, loc: Loc, pla: Player) -> bool {
        let (x, y) = match loc {
            Loc::Pass => return true,
            Loc::Point { x, y } => (x as usize, y as usize),
        };
        if x >= self.x_size || y >= self.y_size {
            return false;
        }
        if self.stone(x, y) != EMPTY {
            return false;
        }
        if self.ko_loc == Some(loc) {
            return false;
        }
        // Any empty neighbor means the stone has a liberty outright.
        for &(dx, dy) in &NEIGHBORS {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx >= 0 && ny >= 0 && (nx as usize) < self.x_size && (ny as usize) < self.y_size {
                if self.stone(nx as usize, ny as usize) == EMPTY {
                    return true;
                }
            }
        }
        // Otherwise the move must either capture or join a group with liberties.
        let mut copy = self.clone();
        copy.place(x, y, pla.stone());
        let captured = copy.capture_dead_neighbors(x, y, pla);
        if captured > 0 {
            return true;
        }
        let mut group = Vec::new();
        copy.find_group(x, y, &mut group);
        copy.group_has_liberties(&group)
    }

    fn capture_dead_neighbors(&mut self, x: usize, y: usize, pla: Player) -> usize {
        let opp = pla.opponent().stone();
        let mut captured = 0;
        let mut group = Vec::new();
        for &(dx, dy) in &NEIGHBORS {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx >= 0 && ny >= 0 && (nx as usize) < self.x_size && (ny as usize) < self.y_size {
                let (nx, ny) = (nx as usize, ny as usize);
                if self.stone(nx, ny) == opp {
                    self.find_group(nx, ny, &mut group);
                    if !self.group_has_liberties(&group) {
                        for &(gx, gy) in &group {
                            self.remove(gx, gy);
                        }
                        captured += group.len();
                    }
                }
            }
        }
        captured
    }

    /// Play a move that is already known to be legal. Updates captures,
    /// the hash, and the simple-ko point. Returns the number of captures.
    pub fn play_move_assume_legal(&mut self, loc: Loc, pla: Player) -> usize {
        let (x, y) = match loc {
            Loc::Pass => {
                self.ko_loc = None;
                return 0;
            }
            Loc::Point { x, y } => (x as usize, y as usize),
        };
        self.place(x, y, pla.stone());
        let captured = self.capture_dead_neighbors(x, y, pla);

        // Simple ko: a single-stone capture by a stone that now sits alone
        // with exactly one liberty forbids the immediate recapture.
        self.ko_loc = None;
        if captured == 1 {
            let mut group = Vec::new();
            self.find_group(x, y, &mut group);
            if group.len() == 1 {
                let mut liberty = None;
                let mut liberty_count = 0;
                for &(dx, dy) in &NEIGHBORS {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx >= 0
                        && ny >= 0
                        && (nx as usize) < self.x_size
                        && (ny as usize) < self.y_size
                        && self.stone(nx as usize, ny as usize) == EMPTY
                    {
                        liberty_count += 1;
                        liberty = Some(Loc::Point {
                            x: nx as u8,
                            y: ny as u8,
                        });
                    }
                }
                if liberty_count == 1 {
                    self.ko_loc = liberty;
                }
            }
        }
        captured
    }

    /// The board transformed by a symmetry. The hash is recomputed from the
    /// transformed stone layout.
    pub fn transformed(&self, sym: Symmetry) -> Board {
        let (out_x, out_y) = if sym.transposes() {
            (self.y_size, self.x_size)
        } else {
            (self.x_size, self.y_size)
        };
        let mut out = Board::new(out_x, out_y);
        for y in 0..self.y_size {
            for x in 0..self.x_size {
                let stone = self.stone(x, y);
                if stone != EMPTY {
                    if let Loc::Point { x: tx, y: ty } = sym.apply_loc(
                        Loc::Point {
                            x: x as u8,
                            y: y as u8,
                        },
                        self.x_size,
                        self.y_size,
                    ) {
                        out.place(tx as usize, ty as usize, stone);
                    }
                }
            }
        }
        out.ko_loc = self
            .ko_loc
            .map(|loc| sym.apply_loc(loc, self.x_size, self.y_size));
        out
    }

    /// Number of stones on the board.
    pub fn stone_count(&self) -> usize {
        self.stones.iter().filter(|&&s| s != EMPTY).count()
    }

    /// All empty or occupied points as `Loc`s, row by row.
    pub fn all_points(&self) -> impl Iterator<Item = Loc> + '_ {
        (0..self.y_size).flat_map(move |y| {
            (0..self.x_size).map(move |x| Loc::Point {
                x: x as u8,
                y: y as u8,
            })
        })
    }

    /// Area score from White's perspective, komi excluded: each stone counts
    /// for its owner, and an empty region bordered by only one color counts
    /// for that color.
    pub fn area_score_white_minus_black(&self) -> f64 {
        let mut white = 0i64;
        let mut black = 0i64;
        let mut visited = vec![false; self.x_size * self.y_size];
        for y in 0..self.y_size {
            for x in 0..self.x_size {
                match self.stone(x, y) {
                    BLACK => black += 1,
                    WHITE => white += 1,
                    _ => {
                        if visited[self.idx(x, y)] {
                            continue;
                        }
                        // Flood the empty region, noting which colors border it.
                        let mut region = vec![(x, y)];
                        let mut size = 0i64;
                        let mut touches_black = false;
                        let mut touches_white = false;
                        visited[self.idx(x, y)] = true;
                        while let Some((cx, cy)) = region.pop() {
                            size += 1;
                            for &(dx, dy) in &NEIGHBORS {
                                let nx = cx as i32 + dx;
                                let ny = cy as i32 + dy;
                                if nx >= 0
                                    && ny >= 0
                                    && (nx as usize) < self.x_size
                                    && (ny as usize) < self.y_size
                                {
                                    let (nx, ny) = (nx as usize, ny as usize);
                                    match self.stone(nx, ny) {
                                        BLACK => touches_black = true,
                                        WHITE => touches_white = true,
                                        _ => {
                                            if !visited[self.idx(nx, ny)] {
                                                visited[self.idx(nx, ny)] = true;
                                                region.push((nx, ny));
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        if touches_black && !touches_white {
                            black += size;
                        } else if touches_white && !touches_black {
                            white += size;
                        }
                    }
                }
            }
        }
        (white - black) as f64
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.y_size).rev() {
            for x in 0..self.x_size {
                let c = match self.stone(x, y) {
                    BLACK => 'X',
                    WHITE => 'O',
                    _ => '.',
                };
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: u8, y: u8) -> Loc {
        Loc::Point { x, y }
    }

    #[test]
    fn empty_board_has_zero_hash() {
        let board = Board::new(9, 9);
        assert_eq!(board.pos_hash(), 0);
    }

    #[test]
    fn hash_is_incremental_and_order_independent() {
        let mut a = Board::new(9, 9);
        a.play_move_assume_legal(p(2, 2), Player::Black);
        a.play_move_assume_legal(p(6, 6), Player::White);

        let mut b = Board::new(9, 9);
        b.play_move_assume_legal(p(6, 6), Player::White);
        b.play_move_assume_legal(p(2, 2), Player::Black);

        assert_eq!(a.pos_hash(), b.pos_hash());
    }

    #[test]
    fn single_stone_capture() {
        let mut board = Board::new(5, 5);
        // Surround a white stone at (1,1) on three sides, then capture.
        board.play_move_assume_legal(p(1, 1), Player::White);
        board.play_move_assume_legal(p(0, 1), Player::Black);
        board.play_move_assume_legal(p(2, 1), Player::Black);
        board.play_move_assume_legal(p(1, 0), Player::Black);
        let captured = board.play_move_assume_legal(p(1, 2), Player::Black);
        assert_eq!(captured, 1);
        assert_eq!(board.stone(1, 1), EMPTY);
    }

    #[test]
    fn suicide_is_illegal_capture_is_not() {
        let mut board = Board::new(5, 5);
        board.play_move_assume_legal(p(0, 1), Player::Black);
        board.play_move_assume_legal(p(1, 0), Player::Black);
        board.play_move_assume_legal(p(1, 2), Player::Black);
        board.play_move_assume_legal(p(2, 1), Player::Black);
        // (1,1) is an eye of black: suicide for white, fine for black.
        assert!(!board.is_legal(p(1, 1), Player::White));
        assert!(board.is_legal(p(1, 1), Player::Black));
    }

    #[test]
    fn ko_point_blocks_immediate_recapture() {
        let mut board = Board::new(5, 5);
        // Classic ko shape around (1,1)/(2,1).
        board.play_move_assume_legal(p(1, 0), Player::Black);
        board.play_move_assume_legal(p(0, 1), Player::Black);
        board.play_move_assume_legal(p(1, 2), Player::Black);
        board.play_move_assume_legal(p(2, 0), Player::White);
        board.play_move_assume_legal(p(3, 1), Player::White);
        board.play_move_assume_legal(p(2, 2), Player::White);
        board.play_move_assume_legal(p(1, 1), Player::White);
        // Black captures the ko.
        let captured = board.play_move_assume_legal(p(2, 1), Player::Black);
        assert_eq!(captured, 1);
        assert_eq!(board.ko_loc(), Some(p(1, 1)));
        assert!(!board.is_legal(p(1, 1), Player::White));
    }

    #[test]
    fn transform_preserves_stone_count_and_round_trips() {
        let mut board = Board::new(9, 9);
        board.play_move_assume_legal(p(2, 3), Player::Black);
        board.play_move_assume_legal(p(5, 7), Player::White);
        for sym in Symmetry::all(9, 9) {
            let there = board.transformed(sym);
            let back = there.transformed(sym.inverse());
            assert_eq!(back, board, "sym {:?}", sym);
        }
    }

    #[test]
    fn situation_hash_distinguishes_player_to_move() {
        let board = Board::new(9, 9);
        assert_ne!(
            board.situation_hash(Player::Black),
            board.situation_hash(Player::White)
        );
    }

    #[test]
    fn area_scoring_counts_territory() {
        let mut board = Board::new(5, 5);
        // A wall of black stones on column 2 splits the board; black owns
        // everything since white has no stones.
        for y in 0..5 {
            board.play_move_assume_legal(p(2, y), Player::Black);
        }
        assert_eq!(board.area_score_white_minus_black(), -25.0);
    }
}
