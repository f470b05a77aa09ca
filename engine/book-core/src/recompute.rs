//! Value and cost propagation.
//!
//! Two passes keep the book consistent after a batch of changes:
//! 1. bottom-up, each node's recursive values blend its own
//!    `this_values_not_in_book` with the recursive values of its best
//!    in-book child;
//! 2. top-down, the cheapest in-book path cost from the root is relaxed
//!    through every edge and each node's total expansion cost is cached.
//!
//! `recompute` limited to a dirty set produces the same result as a full
//! recompute: values can only change on ancestors of dirty nodes, and the
//! cost pass is a pure function of node state, so it is always run in full.

use std::collections::{HashMap, HashSet, VecDeque};

use games_go::Player;

use crate::book::Book;
use crate::hash::BookHash;
use crate::values::{cap_sharp_score, utility_for, RecursiveValues};

impl Book {
    /// Topological order from the root (parents before children), seeded
    /// and tie-broken by insertion order for determinism.
    fn topo_order(&self) -> Vec<BookHash> {
        let mut indegree: HashMap<BookHash, usize> = HashMap::with_capacity(self.nodes.len());
        for &h in &self.order {
            indegree.entry(h).or_insert(0);
            for (_, mv) in &self.nodes[&h].moves_in_book {
                *indegree.entry(mv.child_hash).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<BookHash> = self
            .order
            .iter()
            .copied()
            .filter(|h| indegree[h] == 0)
            .collect();
        let mut out = Vec::with_capacity(self.nodes.len());
        while let Some(h) = queue.pop_front() {
            out.push(h);
            for (_, mv) in &self.nodes[&h].moves_in_book {
                let d = indegree.get_mut(&mv.child_hash).expect("child counted");
                *d -= 1;
                if *d == 0 {
                    queue.push_back(mv.child_hash);
                }
            }
        }

        // A repetition-induced cycle would leave nodes unemitted; keep the
        // ordering total so recompute still terminates.
        if out.len() < self.order.len() {
            let emitted: HashSet<BookHash> = out.iter().copied().collect();
            out.extend(self.order.iter().copied().filter(|h| !emitted.contains(h)));
        }
        out
    }

    /// Recompute one node's recursive values from its children.
    fn recompute_recursive_values_at(&mut self, hash: BookHash) {
        let p = self.params.clone();
        let node = &self.nodes[&hash];
        let tv = &node.this_values_not_in_book;

        let mut best = RecursiveValues::from_this_values(tv);
        let mut best_is_child = false;
        let mut best_utility = utility_for(
            node.pla,
            tv.win_loss_value,
            cap_sharp_score(tv.score_mean, tv.sharp_score_mean, p.sharp_score_outlier_cap),
            p.utility_per_score,
        );

        let mut child_visits = 0.0;
        let mut child_weight = 0.0;
        for (_, mv) in &node.moves_in_book {
            let rv = self.nodes[&mv.child_hash].recursive_values;
            child_visits += rv.visits;
            child_weight += rv.weight;
            let utility = utility_for(
                node.pla,
                rv.win_loss_value,
                cap_sharp_score(rv.score_mean, rv.sharp_score_mean, p.sharp_score_outlier_cap),
                p.utility_per_score,
            );
            if utility > best_utility {
                best_utility = utility;
                best = rv;
                best_is_child = true;
            }
        }

        let mut out = best;
        // Visits and weight sum across the chosen subtree rather than
        // following only the best line.
        out.visits = tv.visits + child_visits;
        out.weight = tv.weight + child_weight;
        if best_is_child {
            // Standard combining rule: weight-weighted RMS of the chosen
            // child's error and this node's own error.
            let w_this = tv.weight.max(0.0);
            let w_child = best.weight.max(0.0);
            let total = w_this + w_child;
            if total > 0.0 {
                out.win_loss_error = ((w_this * tv.win_loss_error * tv.win_loss_error
                    + w_child * best.win_loss_error * best.win_loss_error)
                    / total)
                    .sqrt();
                out.score_error = ((w_this * tv.score_error * tv.score_error
                    + w_child * best.score_error * best.score_error)
                    / total)
                    .sqrt();
            }
        }

        self.nodes.get_mut(&hash).expect("node exists").recursive_values = out;
    }

    /// Mark the win/loss principal variation: follow the best in-book
    /// child by win/loss from the root; the node where the PV leaves the
    /// book is its endpoint.
    fn mark_wl_pv(&mut self) {
        for node in self.nodes.values_mut() {
            node.on_wl_pv = false;
            node.wl_pv_endpoint = false;
        }
        let mut cursor = self.root_hash();
        let mut guard = 0;
        loop {
            let node = self.nodes.get_mut(&cursor).expect("pv node exists");
            node.on_wl_pv = true;
            let pla = node.pla;
            let next = self.nodes[&cursor]
                .moves_in_book
                .iter()
                .map(|(_, mv)| {
                    let rv = &self.nodes[&mv.child_hash].recursive_values;
                    let wl = match pla {
                        Player::White => rv.win_loss_value,
                        Player::Black => -rv.win_loss_value,
                    };
                    (mv.child_hash, wl)
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(h, _)| h);
            match next {
                Some(h) => cursor = h,
                None => {
                    self.nodes.get_mut(&cursor).expect("pv node exists").wl_pv_endpoint = true;
                    break;
                }
            }
            guard += 1;
            if guard > self.nodes.len() {
                break;
            }
        }
    }

    /// Top-down cost pass: relax the cheapest path cost from the root
    /// through every in-book edge, then cache every node's total expansion
    /// cost and award the biggest-WL-cost bonus.
    fn recompute_costs(&mut self) {
        let order = self.topo_order();

        for node in self.nodes.values_mut() {
            node.min_cost_from_root = f64::INFINITY;
        }
        let root = self.root_hash();
        self.nodes.get_mut(&root).expect("root exists").min_cost_from_root = 0.0;

        self.mark_wl_pv();

        for &h in &order {
            let parent_cost = self.nodes[&h].min_cost_from_root;
            if !parent_cost.is_finite() {
                continue;
            }
            let node = &self.nodes[&h];
            let candidates = self.candidates_at(node);
            let best = *self.best_candidate(&candidates);
            let pass_favored = Self::pass_is_favored(&candidates);

            let mut relaxations: Vec<(BookHash, f64)> = Vec::new();
            for (cand, (_, mv)) in candidates.iter().zip(&node.moves_in_book) {
                let edge_cost = self.cost_of_candidate(cand, &best, pass_favored);
                relaxations.push((mv.child_hash, parent_cost + edge_cost));
            }
            for (child, cost) in relaxations {
                let c = self.nodes.get_mut(&child).expect("child exists");
                if cost < c.min_cost_from_root {
                    c.min_cost_from_root = cost;
                }
            }
        }

        let mut biggest: Option<(BookHash, f64)> = None;
        let mut totals: Vec<(BookHash, f64)> = Vec::with_capacity(order.len());
        for &h in &self.order {
            let node = &self.nodes[&h];
            let (own_cost, wl_component) = self.expansion_cost_of(node);
            let base = if node.min_cost_from_root.is_finite() {
                node.min_cost_from_root
            } else {
                0.0
            };
            totals.push((h, base + own_cost));
            let better = match biggest {
                None => true,
                Some((bh, bw)) => {
                    wl_component > bw || (wl_component == bw && h < bh)
                }
            };
            if better {
                biggest = Some((h, wl_component));
            }
        }
        for (h, total) in totals {
            self.nodes.get_mut(&h).expect("node exists").total_expansion_cost = total;
        }
        if let Some((h, _)) = biggest {
            if self.params.bonus_for_biggest_wl_cost != 0.0 {
                let node = self.nodes.get_mut(&h).expect("node exists");
                node.total_expansion_cost -= self.params.bonus_for_biggest_wl_cost;
            }
        }
    }

    /// Full bottom-up value propagation followed by the cost pass.
    pub fn recompute_everything(&mut self) {
        let order = self.topo_order();
        for &h in order.iter().rev() {
            self.recompute_recursive_values_at(h);
        }
        self.recompute_costs();
    }

    /// Recompute limited to the dirty set and its ancestors. Equivalent to
    /// a full recompute over the touched region.
    pub fn recompute(&mut self, dirty: &[BookHash]) {
        let mut affected: HashSet<BookHash> = HashSet::new();
        let mut queue: VecDeque<BookHash> = dirty.iter().copied().collect();
        while let Some(h) = queue.pop_front() {
            if !affected.insert(h) {
                continue;
            }
            if let Some(node) = self.nodes.get(&h) {
                for &(parent, _) in &node.parents {
                    queue.push_back(parent);
                }
            }
        }

        let order = self.topo_order();
        for &h in order.iter().rev() {
            if affected.contains(&h) {
                self.recompute_recursive_values_at(h);
            }
        }
        self.recompute_costs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BookParams;
    use crate::values::BookValues;
    use games_go::{Board, Loc, Rules};

    fn p(x: u8, y: u8) -> Loc {
        Loc::Point { x, y }
    }

    fn new_book() -> Book {
        Book::new(
            crate::LATEST_BOOK_VERSION,
            Board::new(9, 9),
            Rules::default(),
            Player::Black,
            5,
            BookParams::default(),
        )
    }

    fn values(wl: f64, score: f64, visits: f64) -> BookValues {
        BookValues {
            win_loss_value: wl,
            score_mean: score,
            sharp_score_mean: score,
            win_loss_error: 0.1,
            score_error: 0.5,
            score_stdev: 1.0,
            max_policy: 0.3,
            weight: visits,
            visits,
        }
    }

    #[test]
    fn recursive_values_take_the_best_child_for_the_player() {
        let mut book = new_book();
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        let mut hist2 = book.initial_hist();
        let (b, _) = book
            .play_and_add_move(&root, &mut hist2, p(4, 4), 0.2)
            .unwrap();

        // Root is black to move: the more negative win/loss is better.
        book.set_this_values(a.hash, values(-0.6, -3.0, 50.0));
        book.set_this_values(b.hash, values(0.4, 2.0, 60.0));
        book.set_this_values(root.hash, values(0.0, 0.0, 10.0));

        book.recompute_everything();

        let rv = book.node(root.hash).unwrap().recursive_values;
        assert!((rv.win_loss_value - (-0.6)).abs() < 1e-9);
        // Visits sum across the subtree: 10 own + 50 + 60 children.
        assert!((rv.visits - 120.0).abs() < 1e-9);
    }

    #[test]
    fn leaf_recursive_values_mirror_this_values() {
        let mut book = new_book();
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        book.set_this_values(a.hash, values(0.25, 1.5, 40.0));
        book.recompute_everything();

        let rv = book.node(a.hash).unwrap().recursive_values;
        assert!((rv.win_loss_value - 0.25).abs() < 1e-9);
        assert!((rv.visits - 40.0).abs() < 1e-9);
    }

    #[test]
    fn dirty_recompute_matches_full_recompute() {
        let mut book = new_book();
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        let (a2, _) = book.play_and_add_move(&a, &mut hist, p(6, 6), 0.2).unwrap();

        book.set_this_values(root.hash, values(0.0, 0.0, 5.0));
        book.set_this_values(a.hash, values(0.1, 0.5, 30.0));
        book.set_this_values(a2.hash, values(-0.2, -1.0, 20.0));

        book.recompute(&[a2.hash]);
        let after_dirty: Vec<(f64, f64)> = book
            .all_nodes()
            .iter()
            .map(|n| {
                let node = book.node(n.hash).unwrap();
                (node.recursive_values.win_loss_value, node.total_expansion_cost)
            })
            .collect();

        book.recompute_everything();
        let after_full: Vec<(f64, f64)> = book
            .all_nodes()
            .iter()
            .map(|n| {
                let node = book.node(n.hash).unwrap();
                (node.recursive_values.win_loss_value, node.total_expansion_cost)
            })
            .collect();

        assert_eq!(after_dirty, after_full);
    }

    #[test]
    fn deeper_nodes_accumulate_path_cost() {
        let mut book = new_book();
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        let (a2, _) = book.play_and_add_move(&a, &mut hist, p(6, 6), 0.2).unwrap();

        for h in [root.hash, a.hash, a2.hash] {
            book.set_this_values(h, values(0.0, 0.0, 10.0));
        }
        book.recompute_everything();

        let cost_root = book.node(root.hash).unwrap().total_expansion_cost;
        let cost_a2 = book.node(a2.hash).unwrap().total_expansion_cost;
        assert!(cost_a2 > cost_root);
    }

    #[test]
    fn pv_endpoint_gets_the_tier_two_bonus() {
        let mut book = new_book();
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        book.set_this_values(root.hash, values(0.0, 0.0, 5.0));
        book.set_this_values(a.hash, values(-0.1, 0.0, 30.0));
        book.recompute_everything();

        assert!(book.node(root.hash).unwrap().on_wl_pv);
        let leaf = book.node(a.hash).unwrap();
        assert!(leaf.on_wl_pv);
        assert!(leaf.wl_pv_endpoint);
        assert!(!book.node(root.hash).unwrap().wl_pv_endpoint);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut book = new_book();
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        book.set_this_values(root.hash, values(0.1, 1.0, 5.0));
        book.set_this_values(a.hash, values(-0.3, -2.0, 25.0));

        book.recompute_everything();
        let first: Vec<f64> = book
            .all_nodes()
            .iter()
            .map(|n| book.node(n.hash).unwrap().total_expansion_cost)
            .collect();
        book.recompute_everything();
        let second: Vec<f64> = book
            .all_nodes()
            .iter()
            .map(|n| book.node(n.hash).unwrap().total_expansion_cost)
            .collect();
        assert_eq!(first, second);
    }
}
