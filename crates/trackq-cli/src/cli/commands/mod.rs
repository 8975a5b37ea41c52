//! CLI command handlers, one file per command.

mod add;
mod run;
mod status;
mod stop;

pub use add::run_add;
pub use run::{run_queue, RunOptions};
pub use status::run_status;
pub use stop::run_stop;
