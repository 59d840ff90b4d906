//! Terminal output
//!
//! - `Console` - colored output primitives
//! - `transcript` - run steps and conversation rendering

mod console;
pub mod transcript;

pub use console::{CheckMark, Console};
