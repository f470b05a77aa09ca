//! The `checkbook` command: verify every node's stored hash by walking to
//! it and re-hashing.

use std::io::IsTerminal;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use book_core::hash::get_hash_and_symmetry;
use book_core::Book;

use crate::cli::CheckbookArgs;

pub fn run_checkbook(args: &CheckbookArgs) -> Result<()> {
    let book = Book::load_from_file(&args.book_file)?;
    info!(
        nodes = book.size(),
        version = book.book_version,
        "loaded preexisting book from {}",
        args.book_file.display()
    );

    let all_nodes = book.all_nodes();
    info!("checking book...");
    let bar = if std::io::stderr().is_terminal() {
        let pb = ProgressBar::new(all_nodes.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} nodes")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut failures = 0u64;
    for (i, sym) in all_nodes.iter().enumerate() {
        match book.history_reaching(sym.hash) {
            Err(e) => {
                warn!(
                    hash = %sym.hash,
                    error = %e,
                    "failed to reconstruct board history; probably a bug or a hash collision"
                );
                failures += 1;
            }
            Ok((_, hist, moves)) => {
                let (rehash, _, _) = get_hash_and_symmetry(&hist, book.book_version);
                if rehash != sym.hash {
                    let moves_str: Vec<String> = moves.iter().map(|m| m.to_string()).collect();
                    warn!(
                        stored = %sym.hash,
                        recomputed = %rehash,
                        moves = moves_str.join(" "),
                        "book failed integrity check"
                    );
                    failures += 1;
                }
            }
        }
        if let Some(ref bar) = bar {
            bar.inc(1);
        }
        if (i + 1) % 10000 == 0 {
            info!(checked = i + 1, total = all_nodes.len(), "checked nodes");
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if failures > 0 {
        bail!("{failures} nodes failed the integrity check");
    }
    info!(checked = all_nodes.len(), "book is consistent");
    Ok(())
}
