pub mod grid;
pub mod screen;
pub mod theme;

pub use grid::{GridError, GridView, run_interactive};
pub use screen::{Cell, CellStyle, Screen, ScreenBuffer};
pub use theme::Theme;
