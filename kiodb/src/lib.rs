pub mod schema;
pub mod condition;
pub mod snapshot;
pub mod table;
pub mod autosave;
pub mod export;
pub mod error;

pub use error::{KiodbError, Result};
pub use schema::{Column, ColumnPatch, ColumnType};
pub use condition::{Condition, Operator};
pub use snapshot::{Record, Snapshot};
pub use table::{PersistMode, Table};
