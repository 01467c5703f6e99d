//! UCI engine driver: process supervision, line buffering, search and
//! result parsing.

mod channel;
mod command;
mod error;
mod launcher;
mod parser;
mod pool;
mod process;
mod search;

pub use channel::LineChannel;
pub use command::*;
pub use error::*;
pub use launcher::*;
pub use parser::*;
pub use pool::*;
pub use process::*;
pub use search::*;
