use serde::{Deserialize, Serialize};

/// State of a single grid position, as owned by the board model.
///
/// Handed out by value only; the model is the single writer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub has_mine: bool,
    pub is_open: bool,
    pub has_flag: bool,
    pub neighbor_mine_count: u8,
}

impl Cell {
    pub const fn is_closed(self) -> bool {
        !self.is_open
    }

    /// Opened without a mine and with no mined neighbors, the cells that cascade.
    pub const fn is_open_zero(self) -> bool {
        self.is_open && !self.has_mine && self.neighbor_mine_count == 0
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
