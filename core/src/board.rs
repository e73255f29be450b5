use alloc::collections::VecDeque;
use hashbrown::HashSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// Rectangular minesweeper grid. Dimensions are fixed at creation and every
/// mutation goes through the operations below, each returning a fresh board
/// and leaving the receiver untouched so that local apply and remote replay
/// run over identical inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    cells: Array2<Cell>,
}

impl Board {
    /// All-hidden board with no mines.
    pub fn empty(width: Coord, height: Coord) -> Result<Board> {
        if width == 0 || height == 0 {
            return Err(GameError::InvalidDimensions(width, height));
        }
        Ok(Board {
            cells: Array2::default((width, height).to_nd_index()),
        })
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.cells.dim();
        (dim.0 as Coord, dim.1 as Coord)
    }

    pub fn width(&self) -> Coord {
        self.size().0
    }

    pub fn height(&self) -> Coord {
        self.size().1
    }

    pub fn total_cells(&self) -> CellCount {
        mult(self.size().0, self.size().1)
    }

    pub fn in_bounds(&self, coords: Coord2) -> bool {
        let (w, h) = self.size();
        coords.0 < w && coords.1 < h
    }

    pub fn cell_at(&self, coords: Coord2) -> Option<Cell> {
        self.in_bounds(coords)
            .then(|| self.cells[coords.to_nd_index()])
    }

    pub fn mine_count(&self) -> CellCount {
        self.cells.iter().filter(|cell| cell.is_mine).count() as CellCount
    }

    pub fn count_flags(&self) -> CellCount {
        self.cells
            .iter()
            .filter(|cell| cell.status == CellStatus::Flagged)
            .count() as CellCount
    }

    /// Mines minus flags; negative when players over-flag.
    pub fn mines_left(&self) -> isize {
        self.mine_count() as isize - self.count_flags() as isize
    }

    pub fn has_mines(&self) -> bool {
        self.cells.iter().any(|cell| cell.is_mine)
    }

    /// Places exactly `count` mines uniformly at random, keeping the in-bounds
    /// 3x3 neighborhood of `safe` clear, then recomputes adjacency counts.
    pub fn place_mines(&self, count: CellCount, safe: Coord2, seed: u64) -> Result<Board> {
        use rand::prelude::*;

        let bounds = self.size();
        let in_safe_zone = |coords: Coord2| {
            coords.0.abs_diff(safe.0) <= 1 && coords.1.abs_diff(safe.1) <= 1
        };

        // The safe zone starts out masked so the placement walk skips it.
        let mut mask: Array2<bool> = Array2::default(bounds.to_nd_index());
        let mut zone_cells = 0;
        for ((x, y), slot) in mask.indexed_iter_mut() {
            if in_safe_zone((x as Coord, y as Coord)) {
                *slot = true;
                zone_cells += 1;
            }
        }

        let available = self.total_cells() - zone_cells;
        if count > available {
            return Err(GameError::InfeasibleMineCount {
                requested: count,
                available,
            });
        }

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut free = available;
        for _ in 0..count {
            let mut target = rng.random_range(0..free);
            for slot in mask.iter_mut() {
                if *slot {
                    continue;
                }
                if target == 0 {
                    *slot = true;
                    break;
                }
                target -= 1;
            }
            free -= 1;
        }

        let mut next = self.clone();
        for ((x, y), cell) in next.cells.indexed_iter_mut() {
            let coords = (x as Coord, y as Coord);
            cell.is_mine = mask[coords.to_nd_index()] && !in_safe_zone(coords);
            cell.adjacent_mines = 0;
        }
        let snapshot = next.cells.clone();
        for ((x, y), cell) in next.cells.indexed_iter_mut() {
            if !cell.is_mine {
                cell.adjacent_mines = snapshot
                    .iter_neighbors((x as Coord, y as Coord))
                    .filter(|&pos| snapshot[pos.to_nd_index()].is_mine)
                    .count() as u8;
            }
        }

        // double check mine count
        let placed = next.mine_count();
        if placed != count {
            log::warn!(
                "Placed mine count mismatch, actual: {}, requested: {}",
                placed,
                count
            );
        }
        Ok(next)
    }

    /// Reveals a cell. Out-of-bounds, already-revealed, and flagged targets
    /// leave the board unchanged; zero-adjacency cells flood-fill their
    /// connected region iteratively.
    pub fn reveal(&self, coords: Coord2) -> Board {
        let mut next = self.clone();
        if !next.in_bounds(coords) {
            return next;
        }
        if next.cells[coords.to_nd_index()].status != CellStatus::Hidden {
            return next;
        }

        next.cells[coords.to_nd_index()].status = CellStatus::Revealed;
        let opened = next.cells[coords.to_nd_index()];
        if opened.is_mine || opened.adjacent_mines != 0 {
            return next;
        }

        let mut visited: HashSet<Coord2> = HashSet::new();
        visited.insert(coords);
        let mut to_visit: VecDeque<Coord2> = next.cells.iter_neighbors(coords).collect();
        while let Some(pos) = to_visit.pop_front() {
            if !visited.insert(pos) {
                continue;
            }
            let cell = next.cells[pos.to_nd_index()];
            if cell.status != CellStatus::Hidden {
                continue;
            }
            next.cells[pos.to_nd_index()].status = CellStatus::Revealed;
            if !cell.is_mine && cell.adjacent_mines == 0 {
                let more: alloc::vec::Vec<_> = next
                    .cells
                    .iter_neighbors(pos)
                    .filter(|p| !visited.contains(p))
                    .collect();
                to_visit.extend(more);
            }
        }
        next
    }

    /// Flips a cell between hidden and flagged; revealed cells stay put.
    pub fn toggle_flag(&self, coords: Coord2) -> Board {
        let mut next = self.clone();
        if !next.in_bounds(coords) {
            return next;
        }
        let cell = &mut next.cells[coords.to_nd_index()];
        cell.status = match cell.status {
            CellStatus::Hidden => CellStatus::Flagged,
            CellStatus::Flagged => CellStatus::Hidden,
            CellStatus::Revealed => CellStatus::Revealed,
        };
        next
    }

    /// Uncovers every mine, flagged or hidden. Non-mine cells are untouched.
    pub fn reveal_all_mines(&self) -> Board {
        let mut next = self.clone();
        for cell in next.cells.iter_mut() {
            if cell.is_mine {
                cell.status = CellStatus::Revealed;
            }
        }
        next
    }

    /// Won exactly when every mine is unrevealed and every safe cell is open.
    pub fn check_win(&self) -> bool {
        self.cells.iter().all(|cell| {
            if cell.is_mine {
                cell.status != CellStatus::Revealed
            } else {
                cell.status == CellStatus::Revealed
            }
        })
    }

    pub fn any_mine_revealed(&self) -> bool {
        self.cells.iter().any(|cell| cell.is_revealed_mine())
    }

    pub(crate) fn cells(&self) -> &Array2<Cell> {
        &self.cells
    }

    pub(crate) fn from_cells(cells: Array2<Cell>) -> Board {
        Board { cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_mines(size: Coord2, mines: &[Coord2]) -> Board {
        let mut board = Board::empty(size.0, size.1).unwrap();
        for &coords in mines {
            board.cells[coords.to_nd_index()].is_mine = true;
        }
        let snapshot = board.cells.clone();
        for ((x, y), cell) in board.cells.indexed_iter_mut() {
            if !cell.is_mine {
                cell.adjacent_mines = snapshot
                    .iter_neighbors((x as Coord, y as Coord))
                    .filter(|&pos| snapshot[pos.to_nd_index()].is_mine)
                    .count() as u8;
            }
        }
        board
    }

    #[test]
    fn empty_rejects_zero_dimensions() {
        assert_eq!(
            Board::empty(0, 5).unwrap_err(),
            GameError::InvalidDimensions(0, 5)
        );
        assert_eq!(
            Board::empty(3, 0).unwrap_err(),
            GameError::InvalidDimensions(3, 0)
        );
    }

    #[test]
    fn place_mines_respects_count_and_safe_zone() {
        let board = Board::empty(9, 9).unwrap();
        let placed = board.place_mines(10, (4, 4), 7).unwrap();

        assert_eq!(placed.mine_count(), 10);
        for x in 3..=5 {
            for y in 3..=5 {
                assert!(!placed.cell_at((x, y)).unwrap().is_mine);
            }
        }
        // argument untouched
        assert_eq!(board.mine_count(), 0);
    }

    #[test]
    fn place_mines_rejects_infeasible_count() {
        let board = Board::empty(3, 3).unwrap();
        // the whole 3x3 board is the safe zone around (1, 1)
        let err = board.place_mines(1, (1, 1), 0).unwrap_err();
        assert_eq!(
            err,
            GameError::InfeasibleMineCount {
                requested: 1,
                available: 0,
            }
        );
    }

    #[test]
    fn place_mines_is_deterministic_per_seed() {
        let board = Board::empty(9, 9).unwrap();
        let a = board.place_mines(10, (4, 4), 42).unwrap();
        let b = board.place_mines(10, (4, 4), 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn place_mines_adjacency_counts_neighbors() {
        let placed = board_with_mines((3, 3), &[(0, 0), (2, 2)]);
        assert_eq!(placed.cell_at((1, 1)).unwrap().adjacent_mines, 2);
        assert_eq!(placed.cell_at((2, 0)).unwrap().adjacent_mines, 0);
    }

    #[test]
    fn reveal_floods_zero_region_and_border() {
        let board = board_with_mines((4, 4), &[(3, 3)]);
        let revealed = board.reveal((0, 0));

        for x in 0..4u8 {
            for y in 0..4u8 {
                let cell = revealed.cell_at((x, y)).unwrap();
                if (x, y) == (3, 3) {
                    assert_eq!(cell.status, CellStatus::Hidden);
                } else {
                    assert_eq!(cell.status, CellStatus::Revealed, "at {:?}", (x, y));
                }
            }
        }
    }

    #[test]
    fn flood_never_opens_flagged_cells() {
        let board = board_with_mines((4, 4), &[(3, 3)]).toggle_flag((1, 1));
        let revealed = board.reveal((0, 0));
        assert_eq!(
            revealed.cell_at((1, 1)).unwrap().status,
            CellStatus::Flagged
        );
    }

    #[test]
    fn reveal_of_flagged_cell_is_a_no_op() {
        let board = board_with_mines((3, 3), &[(2, 2)]).toggle_flag((0, 0));
        assert_eq!(board.reveal((0, 0)), board);
    }

    #[test]
    fn reveal_out_of_bounds_is_a_no_op() {
        let board = board_with_mines((3, 3), &[(2, 2)]);
        assert_eq!(board.reveal((7, 7)), board);
    }

    #[test]
    fn reveal_is_idempotent() {
        let board = board_with_mines((4, 4), &[(3, 3)]);
        let once = board.reveal((0, 0));
        let twice = once.reveal((0, 0));
        assert_eq!(once, twice);
    }

    #[test]
    fn toggle_flag_skips_revealed_cells() {
        let board = board_with_mines((3, 3), &[(2, 2)]).reveal((0, 0));
        let flagged = board.toggle_flag((0, 0));
        assert_eq!(
            flagged.cell_at((0, 0)).unwrap().status,
            CellStatus::Revealed
        );
    }

    #[test]
    fn win_and_mine_reveal_are_disjoint() {
        let board = board_with_mines((2, 1), &[(0, 0)]);
        let won = board.reveal((1, 0));
        assert!(won.check_win());
        assert!(!won.any_mine_revealed());

        let lost = board.reveal((0, 0));
        assert!(lost.any_mine_revealed());
        assert!(!lost.check_win());
    }

    #[test]
    fn revealing_last_safe_cell_wins_and_survives_mine_reveal() {
        let board = board_with_mines((2, 2), &[(0, 0)]);
        let won = board.reveal((1, 0)).reveal((0, 1)).reveal((1, 1));
        assert!(won.check_win());

        let ended = won.reveal_all_mines();
        assert_eq!(ended.cell_at((0, 0)).unwrap().status, CellStatus::Revealed);
        // the safe cells were already open and stay that way
        assert_eq!(ended.cell_at((1, 1)).unwrap().status, CellStatus::Revealed);
    }

    #[test]
    fn flag_counters_track_toggles() {
        let board = board_with_mines((3, 3), &[(0, 0), (1, 0)]);
        let flagged = board.toggle_flag((0, 0)).toggle_flag((2, 2));
        assert_eq!(flagged.count_flags(), 2);
        assert_eq!(flagged.mines_left(), 0);
        assert_eq!(flagged.toggle_flag((2, 2)).mines_left(), 1);
    }
}
