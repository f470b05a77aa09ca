//! Bonus file handling.
//!
//! The bonus file is an SGF whose node comments may contain the literal
//! marker `BONUS` followed by a decimal number. Each marked node assigns
//! that bonus to the canonical hash of the position it reaches, for every
//! book version, so the bonuses survive version migrations. The SGF also
//! fixes the initial position of a newly created book: its setup stones
//! and first player.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use book_core::hash::get_hash_and_symmetry;
use book_core::{BookHash, LATEST_BOOK_VERSION};
use games_go::{Board, BoardHistory, Loc, Move, Player, Rules, BLACK, WHITE};

/// Bonuses plus the initial position the SGF describes.
#[derive(Debug)]
pub struct BonusData {
    pub bonus_by_hash: HashMap<BookHash, f64>,
    pub initial_board: Board,
    pub initial_pla: Player,
}

// ---------------------------------------------------------------------------
// Minimal SGF parsing: just enough for sizes, placements, moves, comments.
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SgfNode {
    props: Vec<(String, Vec<String>)>,
}

impl SgfNode {
    fn values(&self, key: &str) -> Option<&[String]> {
        self.props
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.values(key).and_then(|v| v.first()).map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct SgfTree {
    nodes: Vec<SgfNode>,
    children: Vec<SgfTree>,
}

fn parse_sgf(text: &str) -> Result<SgfTree> {
    let mut chars = text.chars().peekable();
    skip_ws(&mut chars);
    if chars.next() != Some('(') {
        bail!("sgf must start with '('");
    }
    parse_tree(&mut chars)
}

fn skip_ws(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn parse_tree(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<SgfTree> {
    let mut tree = SgfTree::default();
    loop {
        skip_ws(chars);
        match chars.peek() {
            Some(';') => {
                chars.next();
                tree.nodes.push(parse_node(chars)?);
            }
            Some('(') => {
                chars.next();
                tree.children.push(parse_tree(chars)?);
            }
            Some(')') => {
                chars.next();
                return Ok(tree);
            }
            Some(c) => bail!("unexpected character {c:?} in sgf"),
            None => bail!("unterminated sgf tree"),
        }
    }
}

fn parse_node(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<SgfNode> {
    let mut node = SgfNode::default();
    loop {
        skip_ws(chars);
        match chars.peek() {
            Some(c) if c.is_ascii_uppercase() => {
                let mut key = String::new();
                while chars.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                    key.push(chars.next().unwrap());
                }
                let mut values = Vec::new();
                loop {
                    skip_ws(chars);
                    if chars.peek() != Some(&'[') {
                        break;
                    }
                    chars.next();
                    let mut value = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => {
                                if let Some(escaped) = chars.next() {
                                    value.push(escaped);
                                }
                            }
                            Some(']') => break,
                            Some(c) => value.push(c),
                            None => bail!("unterminated sgf property value"),
                        }
                    }
                    values.push(value);
                }
                node.props.push((key, values));
            }
            _ => return Ok(node),
        }
    }
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// SGF coordinates: 'a' = 0 from the top-left; our boards grow y upward.
fn parse_coord(value: &str, x_size: usize, y_size: usize) -> Loc {
    let bytes = value.as_bytes();
    if bytes.len() != 2 {
        return Loc::Pass;
    }
    let x = (bytes[0].wrapping_sub(b'a')) as usize;
    let row = (bytes[1].wrapping_sub(b'a')) as usize;
    if x >= x_size || row >= y_size {
        // Out-of-range values, including the conventional "tt" pass.
        return Loc::Pass;
    }
    Loc::Point {
        x: x as u8,
        y: (y_size - 1 - row) as u8,
    }
}

fn parse_size(value: &str) -> Result<(usize, usize)> {
    if let Some((x, y)) = value.split_once(':') {
        Ok((x.trim().parse()?, y.trim().parse()?))
    } else {
        let n: usize = value.trim().parse()?;
        Ok((n, n))
    }
}

fn parse_bonus_comment(comment: &str) -> Option<f64> {
    let rest = &comment[comment.find("BONUS")? + "BONUS".len()..];
    rest.split_whitespace().next()?.parse().ok()
}

/// Walk every variation, invoking `visit(moves-so-far, node)` per node.
fn walk(
    tree: &SgfTree,
    path: &mut Vec<Move>,
    x_size: usize,
    y_size: usize,
    visit: &mut dyn FnMut(&[Move], &SgfNode),
) {
    let depth_before = path.len();
    for node in &tree.nodes {
        for (key, pla) in [("B", Player::Black), ("W", Player::White)] {
            if let Some(value) = node.value(key) {
                path.push(Move {
                    loc: parse_coord(value, x_size, y_size),
                    pla,
                });
            }
        }
        visit(path, node);
    }
    for child in &tree.children {
        walk(child, path, x_size, y_size, visit);
    }
    path.truncate(depth_before);
}

/// Load the bonus file: parse the SGF, validate the board size against the
/// configuration, and hash every BONUS-marked position under every book
/// version.
pub fn load_bonus_file(
    path: &Path,
    board_size_x: usize,
    board_size_y: usize,
    rules: Rules,
    rep_bound: usize,
) -> Result<BonusData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bonus file {}", path.display()))?;
    let tree = parse_sgf(&text).context("failed to parse bonus sgf")?;

    let root = tree
        .nodes
        .first()
        .context("bonus sgf has no root node")?;

    if let Some(size) = root.value("SZ") {
        let (x, y) = parse_size(size)?;
        if x != board_size_x || y != board_size_y {
            bail!(
                "board size in config ({board_size_x}x{board_size_y}) does not match the \
                 board size of the bonus file ({x}x{y})"
            );
        }
    }

    let mut initial_board = Board::new(board_size_x, board_size_y);
    for (key, stone) in [("AB", BLACK), ("AW", WHITE)] {
        if let Some(values) = root.values(key) {
            for value in values {
                if let Loc::Point { x, y } = parse_coord(value, board_size_x, board_size_y) {
                    initial_board.set_stone(x as usize, y as usize, stone);
                }
            }
        }
    }
    let initial_pla = match root.value("PL") {
        Some("W") | Some("w") => Player::White,
        _ => Player::Black,
    };

    let mut bonus_by_hash = HashMap::new();
    let mut marked = 0usize;
    walk(&tree, &mut Vec::new(), board_size_x, board_size_y, &mut |path,
                                                                   node| {
        let Some(comment) = node.value("C") else {
            return;
        };
        if !comment.contains("BONUS") {
            return;
        }
        let Some(bonus) = parse_bonus_comment(comment) else {
            warn!(comment, "BONUS marker without a parseable number; ignoring");
            return;
        };

        // Replay tolerantly: a rules mismatch silently drops the mark.
        let mut hist = BoardHistory::new(initial_board.clone(), initial_pla, rules, rep_bound);
        for mv in path {
            if hist.make_move_tolerant(mv.loc, mv.pla).is_err() {
                return;
            }
        }
        marked += 1;
        for book_version in 1..=LATEST_BOOK_VERSION {
            let (hash, _, _) = get_hash_and_symmetry(&hist, book_version);
            info!(bonus, hash = %hash, book_version, "adding bonus to hash");
            bonus_by_hash.insert(hash, bonus);
        }
    });

    info!(
        marked,
        entries = bonus_by_hash.len(),
        "loaded bonus file {}",
        path.display()
    );
    Ok(BonusData {
        bonus_by_hash,
        initial_board,
        initial_pla,
    })
}
