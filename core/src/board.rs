use std::cell::{Ref, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::*;

/// Presentation seam: whatever draws the board and turns pointer input into [`Intent`]s.
pub trait BoardView {
    /// Redraws the whole grid, called after every refresh.
    fn render(&mut self, model: &BoardModel);

    fn cell_opened(&mut self, event: &CellOpened);

    fn flag_switched(&mut self, event: &FlagSwitched);

    fn destroy(&mut self) {}
}

/// Player input, as produced by an input adapter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Intent {
    Open { column: Coord, row: Coord },
    ToggleFlag { column: Coord, row: Coord },
}

/// Decides win and loss from cell-opened events.
struct Referee {
    context: Option<Rc<GameContext>>,
    has_mine: EventChannel<BoardModel, CellOpened>,
    demined: EventChannel<BoardModel, CellOpened>,
    decided: std::cell::Cell<bool>,
}

impl Referee {
    fn check_mine(&self, model: &BoardModel, event: &CellOpened) {
        if self.decided.get() {
            return;
        }

        if event.cell.has_mine {
            self.decided.set(true);
            self.report(GameState::Lost);
            self.has_mine.notify(model, event);
        } else {
            let config = GameConfig::new_unchecked(model.size(), self.configured_mines(model));
            if model.opened_count() == config.safe_cells() {
                self.decided.set(true);
                self.report(GameState::Won);
                self.demined.notify(model, event);
            }
        }
    }

    /// The configured count, not what placement managed to fit.
    ///
    /// Headless boards have no configured count and use the one last requested from the model,
    /// so a board built from explicit mine positions can still be won.
    fn configured_mines(&self, model: &BoardModel) -> CellCount {
        self.context
            .as_ref()
            .map_or(model.requested_mines(), |context| context.mines())
    }

    fn report(&self, state: GameState) {
        if let Some(context) = &self.context {
            context.change_state(state);
        }
    }

    fn is_finished(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|context| context.state().is_finished())
    }
}

/// Mediates between a [`BoardModel`] and a [`BoardView`].
///
/// Forwards intents into model mutations, keeps the view subscribed to model events and emits
/// [`Board::has_mine`] / [`Board::demined`] when an opened cell decides the game. Holds no cell
/// state of its own.
pub struct Board<V: BoardView> {
    model: BoardModel,
    view: Rc<RefCell<V>>,
    referee: Rc<Referee>,
    view_listeners: Vec<(Channel, ListenerId)>,
}

#[derive(Copy, Clone, Debug)]
enum Channel {
    CellOpened,
    FlagSwitched,
}

impl<V: BoardView + 'static> Board<V> {
    /// Wires `view` and the win/loss check to `model`. A missing `context` means headless play:
    /// intents are never blocked and the model's requested mine count decides the win.
    pub fn new(model: BoardModel, view: V, context: Option<Rc<GameContext>>) -> Self {
        let view = Rc::new(RefCell::new(view));
        let referee = Rc::new(Referee {
            context,
            has_mine: EventChannel::new(),
            demined: EventChannel::new(),
            decided: std::cell::Cell::new(false),
        });

        let opened_view = Rc::clone(&view);
        let on_opened = model.cell_opened().subscribe(move |_, event| {
            opened_view.borrow_mut().cell_opened(event);
        });
        let flag_view = Rc::clone(&view);
        let on_flag = model.flag_switched().subscribe(move |_, event| {
            flag_view.borrow_mut().flag_switched(event);
        });
        let check = Rc::clone(&referee);
        model
            .cell_opened()
            .subscribe(move |model, event| check.check_mine(model, event));
        log::debug!(
            "Board {}x{} wired to its view",
            model.columns(),
            model.rows()
        );

        Self {
            model,
            view,
            referee,
            view_listeners: vec![
                (Channel::CellOpened, on_opened),
                (Channel::FlagSwitched, on_flag),
            ],
        }
    }

    /// Clears the board, seeds `mines` new mines and redraws, returning how many were placed.
    ///
    /// A count the board cannot hold is rejected before anything is cleared.
    pub fn refresh(&mut self, mines: CellCount) -> Result<CellCount> {
        self.model.check_mine_count(mines)?;
        self.model.clear();
        let placed = self.model.set_mines(mines)?;
        self.model.find_neighbors();
        self.referee.decided.set(false);
        self.view.borrow_mut().render(&self.model);
        log::debug!(
            "Board refreshed: {placed}/{mines} mines on {} cells",
            self.model.total_cells()
        );
        Ok(placed)
    }

    pub fn click(&mut self, column: Coord, row: Coord) {
        if self.referee.is_finished() {
            return;
        }
        self.model.open(column, row);
    }

    pub fn right_click(&mut self, column: Coord, row: Coord) {
        if self.referee.is_finished() {
            return;
        }
        self.model.switch_flag(column, row);
    }

    pub fn dispatch(&mut self, intent: Intent) {
        log::trace!("{intent:?}");
        match intent {
            Intent::Open { column, row } => self.click(column, row),
            Intent::ToggleFlag { column, row } => self.right_click(column, row),
        }
    }

    pub fn open_all_mines(&mut self) {
        self.model.open_all_mines();
    }

    /// Emitted once when an opened cell holds a mine.
    pub fn has_mine(&self) -> &EventChannel<BoardModel, CellOpened> {
        &self.referee.has_mine
    }

    /// Emitted once when every safe cell is open.
    pub fn demined(&self) -> &EventChannel<BoardModel, CellOpened> {
        &self.referee.demined
    }

    pub fn model(&self) -> &BoardModel {
        &self.model
    }

    pub fn view(&self) -> Ref<'_, V> {
        self.view.borrow()
    }

    /// Detaches the view from the model and lets it tear itself down.
    pub fn destroy(&mut self) {
        for (channel, id) in self.view_listeners.drain(..) {
            match channel {
                Channel::CellOpened => self.model.cell_opened().unsubscribe(id),
                Channel::FlagSwitched => self.model.flag_switched().unsubscribe(id),
            };
        }
        self.view.borrow_mut().destroy();
    }
}
