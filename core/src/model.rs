use ndarray::Array2;
use rand::prelude::*;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::*;

/// Payload of [`BoardModel::cell_opened`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellOpened {
    pub column: Coord,
    pub row: Coord,
    pub cell: Cell,
}

/// Payload of [`BoardModel::flag_switched`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagSwitched {
    pub column: Coord,
    pub row: Coord,
    pub has_flag: bool,
}

/// The mutable grid: mines, neighbor counts, open and flag state.
///
/// Positions are `(column, row)`. Positions outside the board are never an error: mutations
/// ignore them and reads return a neutral value.
#[derive(Debug)]
pub struct BoardModel {
    size: Coord2,
    cells: Array2<Cell>,
    opened_count: CellCount,
    requested_mines: CellCount,
    rng: SmallRng,
    cell_opened: EventChannel<BoardModel, CellOpened>,
    flag_switched: EventChannel<BoardModel, FlagSwitched>,
}

impl BoardModel {
    /// Creates an empty board whose mine placement is seeded from the operating system.
    pub fn new(columns: Coord, rows: Coord) -> Result<Self> {
        Self::with_rng(columns, rows, SmallRng::from_os_rng())
    }

    /// Creates an empty board with reproducible mine placement.
    pub fn with_seed(columns: Coord, rows: Coord, seed: u64) -> Result<Self> {
        Self::with_rng(columns, rows, SmallRng::seed_from_u64(seed))
    }

    /// Creates a board with mines at exactly the given positions and neighbor counts computed.
    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut model = Self::with_seed(size.0, size.1, 0)?;
        for &coords in mine_coords {
            let cell = model.cell_mut(coords).ok_or(GameError::InvalidCoords)?;
            cell.has_mine = true;
        }
        model.requested_mines = model.mine_count();
        model.find_neighbors();
        Ok(model)
    }

    fn with_rng(columns: Coord, rows: Coord, rng: SmallRng) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(GameError::InvalidDimensions);
        }
        let size = (columns, rows);
        Ok(Self {
            size,
            cells: Array2::default(size.to_nd_index()),
            opened_count: 0,
            requested_mines: 0,
            rng,
            cell_opened: EventChannel::new(),
            flag_switched: EventChannel::new(),
        })
    }

    pub fn columns(&self) -> Coord {
        self.size.0
    }

    pub fn rows(&self) -> Coord {
        self.size.1
    }

    pub fn size(&self) -> Coord2 {
        self.size
    }

    pub fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }

    pub fn opened_count(&self) -> CellCount {
        self.opened_count
    }

    /// Mine count asked for by the last [`Self::set_mines`], which may exceed what was placed.
    pub fn requested_mines(&self) -> CellCount {
        self.requested_mines
    }

    /// Mines actually on the board.
    pub fn mine_count(&self) -> CellCount {
        self.count_cells(|cell| cell.has_mine)
    }

    pub fn flag_count(&self) -> CellCount {
        self.count_cells(|cell| cell.has_flag)
    }

    pub fn is_valid_position(&self, column: Coord, row: Coord) -> bool {
        column < self.size.0 && row < self.size.1
    }

    pub fn cell(&self, column: Coord, row: Coord) -> Option<Cell> {
        self.cells.get((column, row).to_nd_index()).copied()
    }

    pub fn cell_opened(&self) -> &EventChannel<BoardModel, CellOpened> {
        &self.cell_opened
    }

    pub fn flag_switched(&self) -> &EventChannel<BoardModel, FlagSwitched> {
        &self.flag_switched
    }

    /// Resets every cell and the opened counter. Emits nothing.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(Cell::reset);
        self.opened_count = 0;
        self.requested_mines = 0;
    }

    /// Places up to `count` mines using the board's own generator, returning how many were placed.
    pub fn set_mines(&mut self, count: CellCount) -> Result<CellCount> {
        self.check_mine_count(count)?;
        let placed = place_mines(&mut self.cells, self.size, count, &mut self.rng);
        self.requested_mines = count;
        Ok(placed)
    }

    /// Places up to `count` mines by sampling positions from `rng`, skipping those already mined.
    ///
    /// Sampling gives up after `count * 10` attempts; falling short is logged and otherwise
    /// tolerated. Mines are added on top of whatever is already placed.
    pub fn set_mines_with<R: Rng + ?Sized>(
        &mut self,
        count: CellCount,
        rng: &mut R,
    ) -> Result<CellCount> {
        self.check_mine_count(count)?;
        let placed = place_mines(&mut self.cells, self.size, count, rng);
        self.requested_mines = count;
        Ok(placed)
    }

    /// Fails with [`GameError::TooManyMines`] when `count` exceeds the number of cells.
    pub fn check_mine_count(&self, count: CellCount) -> Result<()> {
        let capacity = self.total_cells();
        if count > capacity {
            return Err(GameError::TooManyMines {
                requested: count,
                capacity,
            });
        }
        Ok(())
    }

    /// Recomputes every cell's neighbor mine count from the current placement.
    pub fn find_neighbors(&mut self) {
        let (columns, rows) = self.size;
        for column in 0..columns {
            for row in 0..rows {
                let count = self.bombs_around(column, row);
                self.cells[(column, row).to_nd_index()].neighbor_mine_count = count;
            }
        }
    }

    /// Number of mines among the clipped 8-neighborhood, 0 outside the board.
    pub fn bombs_around(&self, column: Coord, row: Coord) -> u8 {
        if !self.is_valid_position(column, row) {
            return 0;
        }
        self.iter_neighbors((column, row))
            .filter(|&pos| self.cells[pos.to_nd_index()].has_mine)
            .fold(0, |count, _| count + 1)
    }

    /// Opens a cell, cascading through neighbors when it has no adjacent mines.
    ///
    /// Ignored outside the board and on cells that are open or flagged. Cells open depth-first in
    /// neighbor order and each opened cell is announced once, after every cell its cascade opened.
    pub fn open(&mut self, column: Coord, row: Coord) {
        enum Step {
            Visit(Coord2),
            Announce(Coord2),
        }

        let mut stack = vec![Step::Visit((column, row))];
        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(coords) => {
                    let Some(cell) = self.cell_mut(coords) else {
                        continue;
                    };
                    if cell.is_open || cell.has_flag {
                        continue;
                    }

                    cell.is_open = true;
                    let cascades = !cell.has_mine && cell.neighbor_mine_count == 0;
                    self.opened_count += 1;

                    stack.push(Step::Announce(coords));
                    if cascades {
                        let neighbors: Vec<Coord2> = self.iter_neighbors(coords).collect();
                        stack.extend(neighbors.into_iter().rev().map(Step::Visit));
                    }
                }
                Step::Announce(coords) => self.announce_opened(coords),
            }
        }
    }

    /// Toggles the flag on a closed cell. Ignored outside the board and on open cells.
    pub fn switch_flag(&mut self, column: Coord, row: Coord) {
        let Some(cell) = self.cell_mut((column, row)) else {
            return;
        };
        if cell.is_open {
            return;
        }

        cell.has_flag = !cell.has_flag;
        let event = FlagSwitched {
            column,
            row,
            has_flag: cell.has_flag,
        };
        self.flag_switched.notify(self, &event);
    }

    /// Discloses every closed mine, dropping its flag. Leaves the opened counter alone.
    pub fn open_all_mines(&mut self) {
        let (columns, rows) = self.size;
        for column in 0..columns {
            for row in 0..rows {
                let cell = &mut self.cells[(column, row).to_nd_index()];
                if cell.has_mine && !cell.is_open {
                    cell.has_flag = false;
                    cell.is_open = true;
                    self.announce_opened((column, row));
                }
            }
        }
    }

    fn announce_opened(&self, (column, row): Coord2) {
        if let Some(cell) = self.cell(column, row) {
            self.cell_opened.notify(self, &CellOpened { column, row, cell });
        }
    }

    fn cell_mut(&mut self, coords: Coord2) -> Option<&mut Cell> {
        self.cells.get_mut(coords.to_nd_index())
    }

    fn count_cells(&self, predicate: impl Fn(&Cell) -> bool) -> CellCount {
        self.cells
            .iter()
            .filter(|cell| predicate(cell))
            .fold(0, |count, _| count + 1)
    }

    fn iter_neighbors(&self, coords: Coord2) -> NeighborIter {
        NeighborIter::new(coords, self.size)
    }
}

fn place_mines<R: Rng + ?Sized>(
    cells: &mut Array2<Cell>,
    (columns, rows): Coord2,
    count: CellCount,
    rng: &mut R,
) -> CellCount {
    let max_attempts = u32::from(count) * 10;
    let mut attempts = 0;
    let mut placed: CellCount = 0;

    while placed < count && attempts < max_attempts {
        let coords = (rng.random_range(0..columns), rng.random_range(0..rows));
        let cell = &mut cells[coords.to_nd_index()];
        if !cell.has_mine {
            cell.has_mine = true;
            placed += 1;
        }
        attempts += 1;
    }

    if placed < count {
        log::warn!("Could only place {placed} out of {count} mines");
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record_opened(model: &BoardModel) -> Rc<RefCell<Vec<Coord2>>> {
        let opened = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&opened);
        model.cell_opened().subscribe(move |_, event: &CellOpened| {
            sink.borrow_mut().push((event.column, event.row));
        });
        opened
    }

    /// Always produces the same bits, so every sample lands on the same position.
    struct StuckRng;

    impl RngCore for StuckRng {
        fn next_u32(&mut self) -> u32 {
            0x9e37_79b9
        }

        fn next_u64(&mut self) -> u64 {
            0x9e37_79b9_7f4a_7c15
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0x9e);
        }
    }

    #[test]
    fn fresh_board_is_blank() {
        for (columns, rows) in [(1, 1), (3, 7), (8, 8), (25, 25)] {
            let model = BoardModel::new(columns, rows).unwrap();

            assert_eq!(model.opened_count(), 0);
            assert_eq!(model.total_cells(), mult(columns, rows));
            for column in 0..columns {
                for row in 0..rows {
                    assert_eq!(model.cell(column, row), Some(Cell::default()));
                }
            }
        }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(BoardModel::new(0, 5).unwrap_err(), GameError::InvalidDimensions);
        assert_eq!(BoardModel::new(5, 0).unwrap_err(), GameError::InvalidDimensions);
    }

    #[test]
    fn set_mines_places_distinct_mines() {
        let mut model = BoardModel::with_seed(8, 8, 42).unwrap();

        let placed = model.set_mines(10).unwrap();

        assert!(placed <= 10);
        assert!(placed > 0);
        assert_eq!(model.mine_count(), placed);
        assert_eq!(model.requested_mines(), 10);
    }

    #[test]
    fn set_mines_rejects_more_than_the_board_holds() {
        let mut model = BoardModel::new(3, 3).unwrap();

        assert_eq!(
            model.set_mines(10),
            Err(GameError::TooManyMines {
                requested: 10,
                capacity: 9
            })
        );
        assert_eq!(model.set_mines(9).map(|placed| placed <= 9), Ok(true));
    }

    #[test]
    fn set_mines_gives_up_after_the_attempt_budget() {
        let mut model = BoardModel::new(4, 4).unwrap();

        let placed = model.set_mines_with(5, &mut StuckRng).unwrap();

        assert_eq!(placed, 1);
        assert_eq!(model.mine_count(), 1);
        assert_eq!(model.requested_mines(), 5);
    }

    #[test]
    fn seeded_boards_are_reproducible() {
        let mut a = BoardModel::with_seed(16, 16, 7).unwrap();
        let mut b = BoardModel::with_seed(16, 16, 7).unwrap();
        a.set_mines(40).unwrap();
        b.set_mines(40).unwrap();

        for column in 0..16 {
            for row in 0..16 {
                assert_eq!(a.cell(column, row), b.cell(column, row));
            }
        }
    }

    #[test]
    fn set_mines_advances_the_board_generator() {
        let mut replayed = BoardModel::with_seed(16, 16, 7).unwrap();
        let mut fresh = BoardModel::with_seed(16, 16, 7).unwrap();
        replayed.set_mines(40).unwrap();
        replayed.clear();
        replayed.set_mines(40).unwrap();
        fresh.set_mines(40).unwrap();

        let layout = |model: &BoardModel| -> Vec<bool> {
            (0..16)
                .flat_map(|column| (0..16).map(move |row| (column, row)))
                .map(|(column, row)| model.cell(column, row).unwrap().has_mine)
                .collect()
        };
        assert_ne!(layout(&replayed), layout(&fresh));
    }

    #[test]
    fn find_neighbors_counts_clipped_neighborhood() {
        // * . .
        // . . *
        // . . .
        let model = BoardModel::from_mine_coords((3, 3), &[(0, 0), (2, 1)]).unwrap();

        let expected = [[0, 1, 0], [2, 2, 1], [1, 0, 1]];
        for column in 0..3 {
            for row in 0..3 {
                let cell = model.cell(column, row).unwrap();
                assert_eq!(
                    cell.neighbor_mine_count, expected[column as usize][row as usize],
                    "at ({column}, {row})"
                );
            }
        }
    }

    #[test]
    fn out_of_range_reads_are_neutral() {
        let model = BoardModel::from_mine_coords((2, 2), &[(0, 0)]).unwrap();

        assert_eq!(model.cell(2, 0), None);
        assert_eq!(model.bombs_around(0, 2), 0);
        assert!(!model.is_valid_position(2, 2));
    }

    #[test]
    fn from_mine_coords_rejects_positions_off_the_board() {
        assert_eq!(
            BoardModel::from_mine_coords((2, 2), &[(2, 0)]).unwrap_err(),
            GameError::InvalidCoords
        );
    }

    #[test]
    fn opening_zero_cell_floods_region_and_border() {
        // . . . .
        // . . . .
        // . . 1 1
        // . . 1 *
        let mut model = BoardModel::from_mine_coords((4, 4), &[(3, 3)]).unwrap();
        let opened = record_opened(&model);

        model.open(0, 0);

        assert_eq!(model.opened_count(), 15);
        assert_eq!(opened.borrow().len(), 15);
        assert!(!model.cell(3, 3).unwrap().is_open);
        // the cell that started the cascade is announced last
        assert_eq!(opened.borrow().last(), Some(&(0, 0)));
    }

    #[test]
    fn cascade_stops_at_numbered_border() {
        // . . * .
        // . . . .
        // . . . .
        let mut model = BoardModel::from_mine_coords((4, 3), &[(2, 0)]).unwrap();

        model.open(0, 2);

        assert!(model.cell(1, 0).unwrap().is_open);
        assert!(model.cell(3, 1).unwrap().is_open);
        assert!(!model.cell(3, 0).unwrap().is_open);
        assert!(!model.cell(2, 0).unwrap().is_open);
        assert_eq!(model.opened_count(), 10);
    }

    #[test]
    fn opening_twice_is_a_no_op() {
        let mut model = BoardModel::from_mine_coords((3, 3), &[(2, 2)]).unwrap();
        model.open(1, 1);
        let opened = record_opened(&model);

        model.open(1, 1);

        assert_eq!(model.opened_count(), 1);
        assert!(opened.borrow().is_empty());
    }

    #[test]
    fn opening_a_mine_does_not_cascade() {
        let mut model = BoardModel::from_mine_coords((3, 3), &[(0, 0)]).unwrap();
        let opened = record_opened(&model);

        model.open(0, 0);

        assert_eq!(*opened.borrow(), vec![(0, 0)]);
        assert_eq!(model.opened_count(), 1);
        assert!(model.cell(0, 0).unwrap().is_open);
    }

    #[test]
    fn out_of_range_open_is_ignored() {
        let mut model = BoardModel::from_mine_coords((2, 2), &[]).unwrap();
        let opened = record_opened(&model);

        model.open(2, 0);
        model.switch_flag(0, 5);

        assert_eq!(model.opened_count(), 0);
        assert!(opened.borrow().is_empty());
    }

    #[test]
    fn flags_block_opening_and_open_cells_reject_flags() {
        let mut model = BoardModel::from_mine_coords((3, 1), &[(2, 0)]).unwrap();
        let switched = Rc::new(RefCell::new(Vec::new()));
        {
            let sink = Rc::clone(&switched);
            model.flag_switched().subscribe(move |_, event: &FlagSwitched| {
                sink.borrow_mut().push(event.has_flag);
            });
        }

        model.switch_flag(0, 0);
        model.open(0, 0);
        assert!(!model.cell(0, 0).unwrap().is_open);

        model.switch_flag(0, 0);
        model.open(0, 0);
        assert!(model.cell(0, 0).unwrap().is_open);

        model.switch_flag(0, 0);
        assert!(!model.cell(0, 0).unwrap().has_flag);
        assert_eq!(*switched.borrow(), vec![true, false]);
    }

    #[test]
    fn cascade_skips_flagged_cells() {
        let mut model = BoardModel::from_mine_coords((3, 3), &[]).unwrap();
        model.switch_flag(2, 2);

        model.open(0, 0);

        assert_eq!(model.opened_count(), 8);
        assert!(!model.cell(2, 2).unwrap().is_open);
    }

    #[test]
    fn open_all_mines_reveals_each_mine_once() {
        let mut model = BoardModel::from_mine_coords((3, 3), &[(0, 0), (2, 2), (2, 0)]).unwrap();
        model.open(0, 0);
        model.switch_flag(2, 2);
        let opened = record_opened(&model);

        model.open_all_mines();
        model.open_all_mines();

        assert_eq!(*opened.borrow(), vec![(2, 0), (2, 2)]);
        let flagged = model.cell(2, 2).unwrap();
        assert!(flagged.is_open);
        assert!(!flagged.has_flag);
        assert_eq!(model.opened_count(), 1);
    }

    #[test]
    fn clear_resets_cells_and_counters() {
        let mut model = BoardModel::from_mine_coords((3, 3), &[(1, 1)]).unwrap();
        model.open(0, 0);
        model.switch_flag(2, 2);

        model.clear();

        assert_eq!(model.opened_count(), 0);
        assert_eq!(model.requested_mines(), 0);
        assert_eq!(model.flag_count(), 0);
        assert_eq!(model.mine_count(), 0);
        assert_eq!(model.cell(1, 1), Some(Cell::default()));
    }

    #[test]
    fn flood_fill_handles_the_largest_board() {
        let mut model = BoardModel::from_mine_coords((255, 255), &[]).unwrap();

        model.open(127, 127);

        assert_eq!(model.opened_count(), model.total_cells());
    }

    #[test]
    fn events_serialize_with_camel_case_keys() {
        let event = CellOpened {
            column: 1,
            row: 2,
            cell: Cell {
                has_mine: false,
                is_open: true,
                has_flag: false,
                neighbor_mine_count: 3,
            },
        };

        let json = serde_json::to_value(event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "column": 1,
                "row": 2,
                "cell": {
                    "hasMine": false,
                    "isOpen": true,
                    "hasFlag": false,
                    "neighborMineCount": 3
                }
            })
        );

        let flag = serde_json::to_value(FlagSwitched {
            column: 0,
            row: 4,
            has_flag: true,
        })
        .unwrap();
        assert_eq!(flag, serde_json::json!({"column": 0, "row": 4, "hasFlag": true}));
    }
}
