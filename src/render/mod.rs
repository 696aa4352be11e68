pub mod canvas;
pub mod compose;
pub mod display;

pub use compose::CombinedView;
pub use display::{DisplaySink, TerminalDisplay};
