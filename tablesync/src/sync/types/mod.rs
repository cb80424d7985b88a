//! Core types for table sync

mod value;
mod record;
mod table;
mod outcome;
mod options;

pub use value::*;
pub use record::*;
pub use table::*;
pub use outcome::*;
pub use options::*;
