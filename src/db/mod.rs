pub mod connection;
pub mod store;

pub use connection::Database;
pub use store::{CheckInRow, HistoryRow, QEntry, UserRecord};
