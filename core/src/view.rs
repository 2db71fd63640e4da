use core::fmt;
use ndarray::Array2;

use crate::*;

const CLOSED: char = '#';
const FLAG: char = 'F';
const MINE: char = '*';
const EMPTY: char = '.';

/// Character-grid presentation for terminals, logs and headless play.
///
/// Rows print top to bottom, `#` closed, `F` flagged, `*` mine, `.` open with no adjacent mines,
/// otherwise the adjacent mine count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextView {
    grid: Array2<char>,
    destroyed: bool,
}

impl TextView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glyph(&self, column: Coord, row: Coord) -> Option<char> {
        self.grid.get((column, row).to_nd_index()).copied()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn put(&mut self, column: Coord, row: Coord, glyph: char) {
        if let Some(slot) = self.grid.get_mut((column, row).to_nd_index()) {
            *slot = glyph;
        }
    }
}

fn glyph_for(cell: Cell) -> char {
    if cell.is_closed() {
        if cell.has_flag { FLAG } else { CLOSED }
    } else if cell.has_mine {
        MINE
    } else if cell.is_open_zero() {
        EMPTY
    } else {
        char::from(b'0' + cell.neighbor_mine_count)
    }
}

impl BoardView for TextView {
    fn render(&mut self, model: &BoardModel) {
        self.grid = Array2::from_elem(model.size().to_nd_index(), CLOSED);
        for column in 0..model.columns() {
            for row in 0..model.rows() {
                if let Some(cell) = model.cell(column, row) {
                    self.put(column, row, glyph_for(cell));
                }
            }
        }
    }

    fn cell_opened(&mut self, event: &CellOpened) {
        self.put(event.column, event.row, glyph_for(event.cell));
    }

    fn flag_switched(&mut self, event: &FlagSwitched) {
        let glyph = if event.has_flag { FLAG } else { CLOSED };
        self.put(event.column, event.row, glyph);
    }

    fn destroy(&mut self) {
        self.grid = Array2::from_elem([0, 0], CLOSED);
        self.destroyed = true;
    }
}

impl fmt::Display for TextView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (columns, rows) = self.grid.dim();
        for row in 0..rows {
            for column in 0..columns {
                write!(f, "{}", self.grid[[column, row]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
