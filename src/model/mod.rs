pub mod board;
pub mod config;
pub mod note;

pub use board::*;
pub use config::*;
pub use note::*;
