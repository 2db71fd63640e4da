use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Stopped,
    Playing,
    Won,
    Lost,
}

impl GameState {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Lifecycle state shared between a [`Game`] and the board it owns.
///
/// The board reports wins and losses through [`GameContext::change_state`]; the game picks the
/// transition up with [`GameContext::take_transition`] once the triggering intent has finished.
#[derive(Debug, Default)]
pub struct GameContext {
    state: Cell<GameState>,
    mines: Cell<CellCount>,
    transition: Cell<Option<GameState>>,
}

impl GameContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GameState {
        self.state.get()
    }

    /// Configured mine count of the current board.
    pub fn mines(&self) -> CellCount {
        self.mines.get()
    }

    pub fn set_mines(&self, mines: CellCount) {
        self.mines.set(mines);
    }

    /// Moves to `next`, returning `false` when already there.
    pub fn change_state(&self, next: GameState) -> bool {
        let previous = self.state.replace(next);
        if previous == next {
            return false;
        }
        log::debug!("Game state {previous:?} -> {next:?}");
        self.transition.set(Some(next));
        true
    }

    /// The latest state change not yet acted upon.
    pub fn take_transition(&self) -> Option<GameState> {
        self.transition.take()
    }
}

/// Counters an embedding front-end displays next to the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub mines: CellCount,
    pub opened: CellCount,
    pub elapsed_secs: u64,
}

/// Owns the game lifecycle and the one active board.
pub struct Game<V: BoardView> {
    context: Rc<GameContext>,
    board: Option<Board<V>>,
    seed: Option<u64>,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
}

impl<V: BoardView + 'static> Game<V> {
    pub fn new() -> Self {
        Self {
            context: Rc::new(GameContext::new()),
            board: None,
            seed: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// A game whose boards all place their mines from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::new()
        }
    }

    pub fn state(&self) -> GameState {
        self.context.state()
    }

    pub fn mines(&self) -> CellCount {
        self.context.mines()
    }

    pub fn context(&self) -> &Rc<GameContext> {
        &self.context
    }

    pub fn board(&self) -> Option<&Board<V>> {
        self.board.as_ref()
    }

    /// Builds a board for `config` and starts playing. Does nothing unless the game is stopped.
    pub fn start(&mut self, config: GameConfig, view: V) -> Result<bool> {
        if self.state() != GameState::Stopped {
            log::debug!("Start ignored, game is {:?}", self.state());
            return Ok(false);
        }
        config.validate()?;

        let (columns, rows) = config.size;
        let model = match self.seed {
            Some(seed) => BoardModel::with_seed(columns, rows, seed)?,
            None => BoardModel::new(columns, rows)?,
        };
        let mut board = Board::new(model, view, Some(Rc::clone(&self.context)));
        self.context.set_mines(config.mines);
        board.refresh(config.mines)?;
        self.board = Some(board);

        self.enter_playing();
        log::info!(
            "Game started: {columns}x{rows} with {} mines",
            config.mines
        );
        Ok(true)
    }

    pub fn start_level(&mut self, level: Level, view: V) -> Result<bool> {
        log::debug!("Preparing {level} board");
        self.start(level.config(), view)
    }

    /// Reseeds the current board with the configured mine count and plays again.
    pub fn restart(&mut self) -> Result<()> {
        let board = self.board.as_mut().ok_or(GameError::NotStarted)?;
        self.context.change_state(GameState::Playing);
        board.refresh(self.context.mines())?;
        self.enter_playing();
        log::info!("Game restarted");
        Ok(())
    }

    pub fn click(&mut self, column: Coord, row: Coord) -> GameState {
        self.dispatch(Intent::Open { column, row })
    }

    pub fn right_click(&mut self, column: Coord, row: Coord) -> GameState {
        self.dispatch(Intent::ToggleFlag { column, row })
    }

    /// Forwards an intent to the board and reacts to a win or loss it caused.
    pub fn dispatch(&mut self, intent: Intent) -> GameState {
        if let Some(board) = self.board.as_mut() {
            board.dispatch(intent);
        }
        self.settle();
        self.state()
    }

    /// Detaches and drops the board and stops the game.
    pub fn destroy(&mut self) {
        if let Some(mut board) = self.board.take() {
            board.destroy();
        }
        self.context.change_state(GameState::Stopped);
        self.context.take_transition();
        self.started_at = None;
        self.ended_at = None;
        log::info!("Game destroyed");
    }

    /// Time since the game started, frozen once it is won or lost.
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.ended_at) {
            (Some(started_at), Some(ended_at)) => ended_at.duration_since(started_at),
            (Some(started_at), None) => started_at.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn stats(&self) -> GameStats {
        GameStats {
            mines: self.mines(),
            opened: self
                .board
                .as_ref()
                .map_or(0, |board| board.model().opened_count()),
            elapsed_secs: self.elapsed().as_secs(),
        }
    }

    fn enter_playing(&mut self) {
        self.context.change_state(GameState::Playing);
        self.context.take_transition();
        self.started_at = Some(Instant::now());
        self.ended_at = None;
    }

    fn settle(&mut self) {
        let Some(next) = self.context.take_transition() else {
            return;
        };
        match next {
            GameState::Won => {
                self.ended_at = Some(Instant::now());
                log::info!("Won! Time: {}s", self.elapsed().as_secs());
            }
            GameState::Lost => {
                self.ended_at = Some(Instant::now());
                if let Some(board) = self.board.as_mut() {
                    board.open_all_mines();
                }
                log::info!("Lost after {}s", self.elapsed().as_secs());
            }
            GameState::Stopped | GameState::Playing => {}
        }
    }
}

impl<V: BoardView + 'static> Default for Game<V> {
    fn default() -> Self {
        Self::new()
    }
}
