//! Durable save/load of the book.
//!
//! One JSON file holds a header (format version, rules, initial position,
//! and the full cost/bonus parameter set) followed by the node table in
//! sorted-hash order, so identical books serialize to identical bytes.
//! Transient cost-pass state is not persisted; callers recompute after
//! loading.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use games_go::{Board, Player, Rules};

use crate::book::Book;
use crate::error::BookError;
use crate::hash::get_hash_and_symmetry;
use crate::node::BookNode;
use crate::params::BookParams;
use crate::LATEST_BOOK_VERSION;

#[derive(Debug, Serialize, Deserialize)]
struct BookFileHeader {
    book_version: u32,
    rep_bound: usize,
    rules: Rules,
    initial_board: Board,
    initial_pla: Player,
    params: BookParams,
}

#[derive(Debug, Serialize, Deserialize)]
struct BookFile {
    header: BookFileHeader,
    nodes: Vec<BookNode>,
}

impl Book {
    pub fn save_to_file(&self, path: &Path) -> Result<(), BookError> {
        let mut nodes: Vec<BookNode> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.hash.cmp(&b.hash));

        let file = BookFile {
            header: BookFileHeader {
                book_version: self.book_version,
                rep_bound: self.rep_bound,
                rules: self.rules,
                initial_board: self.initial_board.clone(),
                initial_pla: self.initial_pla,
                params: self.params.clone(),
            },
            nodes,
        };

        // Write to a sibling temp file then rename, so an interrupted save
        // never clobbers the previous book.
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &file)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), nodes = file.nodes.len(), "saved book");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Book, BookError> {
        let reader = BufReader::new(File::open(path)?);
        let file: BookFile = serde_json::from_reader(reader)?;
        let header = file.header;

        if header.book_version == 0 || header.book_version > LATEST_BOOK_VERSION {
            return Err(BookError::UnsupportedVersion(header.book_version));
        }

        let mut book = Book::new(
            header.book_version,
            header.initial_board,
            header.rules,
            header.initial_pla,
            header.rep_bound,
            header.params,
        );

        // Re-derive the root from the initial position and make sure the
        // file actually contains it.
        let hist = book.initial_hist();
        let (root_hash, _, _) = get_hash_and_symmetry(&hist, book.book_version);
        if !file.nodes.iter().any(|n| n.hash == root_hash) {
            return Err(BookError::Corrupt(format!(
                "root node {root_hash} missing from node table"
            )));
        }

        book.nodes.clear();
        book.order.clear();
        for node in file.nodes {
            book.order.push(node.hash);
            book.nodes.insert(node.hash, node);
        }

        for hash in book.order.clone() {
            let node = &book.nodes[&hash];
            for (loc, mv) in node.moves_in_book.clone() {
                if !book.nodes.contains_key(&mv.child_hash) {
                    return Err(BookError::Corrupt(format!(
                        "node {hash} has dangling child {} via {loc}",
                        mv.child_hash
                    )));
                }
            }
        }

        info!(path = %path.display(), nodes = book.size(), version = book.book_version, "loaded book");
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_go::Loc;

    fn p(x: u8, y: u8) -> Loc {
        Loc::Point { x, y }
    }

    fn build_small_book() -> Book {
        let mut book = Book::new(
            LATEST_BOOK_VERSION,
            Board::new(9, 9),
            Rules::default(),
            Player::Black,
            5,
            BookParams::default(),
        );
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        book.play_and_add_move(&a, &mut hist, p(6, 6), 0.2).unwrap();
        let mut hist2 = book.initial_hist();
        book.play_and_add_move(&root, &mut hist2, p(4, 4), 0.25)
            .unwrap();
        book.set_this_values(
            a.hash,
            crate::values::BookValues {
                win_loss_value: 0.125,
                score_mean: 1.5,
                sharp_score_mean: 1.25,
                win_loss_error: 0.1,
                score_error: 0.5,
                score_stdev: 2.0,
                max_policy: 0.4,
                weight: 100.0,
                visits: 100.0,
            },
        );
        book.recompute_everything();
        book
    }

    #[test]
    fn save_load_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let book = build_small_book();
        book.save_to_file(&path).unwrap();
        let bytes_first = std::fs::read(&path).unwrap();

        let reloaded = Book::load_from_file(&path).unwrap();
        let path2 = dir.path().join("book2.json");
        reloaded.save_to_file(&path2).unwrap();
        let bytes_second = std::fs::read(&path2).unwrap();

        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn reload_preserves_graph_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let mut book = build_small_book();
        book.recompute_everything();
        book.save_to_file(&path).unwrap();

        let mut reloaded = Book::load_from_file(&path).unwrap();
        assert_eq!(reloaded.size(), book.size());
        assert_eq!(reloaded.root_hash(), book.root_hash());
        for sym in book.all_nodes() {
            let a = book.node(sym.hash).unwrap();
            let b = reloaded.node(sym.hash).unwrap();
            assert_eq!(a.moves_in_book, b.moves_in_book);
            assert_eq!(a.this_values_not_in_book, b.this_values_not_in_book);
            assert_eq!(a.recursive_values, b.recursive_values);
            assert_eq!(a.can_expand, b.can_expand);
            assert_eq!(a.total_expansion_cost, b.total_expansion_cost);
        }

        // Recomputing the reloaded book changes nothing.
        let costs_before: Vec<f64> = reloaded
            .all_nodes()
            .iter()
            .map(|n| reloaded.node(n.hash).unwrap().total_expansion_cost)
            .collect();
        reloaded.recompute_everything();
        let costs_after: Vec<f64> = reloaded
            .all_nodes()
            .iter()
            .map(|n| reloaded.node(n.hash).unwrap().total_expansion_cost)
            .collect();
        assert_eq!(costs_before, costs_after);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let book = build_small_book();
        book.save_to_file(&path).unwrap();

        let mut text = std::fs::read_to_string(&path).unwrap();
        text = text.replace("\"book_version\":2", "\"book_version\":99");
        std::fs::write(&path, text).unwrap();

        let err = Book::load_from_file(&path);
        assert!(matches!(err, Err(BookError::UnsupportedVersion(99))));
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Book::load_from_file(&path).is_err());
    }

    #[test]
    fn history_reconstruction_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let book = build_small_book();
        book.save_to_file(&path).unwrap();
        let reloaded = Book::load_from_file(&path).unwrap();

        for sym in reloaded.all_nodes() {
            let (node, hist, _) = reloaded.history_reaching(sym.hash).unwrap();
            assert_eq!(node.hash, sym.hash);
            let (rehash, _, _) = get_hash_and_symmetry(&hist, reloaded.book_version);
            assert_eq!(rehash, sym.hash);
        }
    }
}
