pub use board::*;
pub use cell::*;
pub use error::*;
pub use event::*;
pub use game::*;
pub use level::*;
pub use model::*;
pub use types::*;
pub use view::*;

mod board;
mod cell;
mod error;
mod event;
mod game;
mod level;
mod model;
mod types;
mod view;
