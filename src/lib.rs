mod chart_io;
mod history;
mod model;
mod store;
mod util;

pub use chart_io::*;
pub use history::*;
pub use model::chart::*;
pub use model::config::*;
pub use store::*;
pub use util::*;
