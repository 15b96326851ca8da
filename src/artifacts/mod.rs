pub mod graph_store;
pub mod io;
pub mod stats_store;
pub mod transactions;

pub use graph_store::{GraphDocument, GraphStore};
pub use stats_store::StatsStore;
pub use transactions::{CsvTransactionSource, InMemorySource, TransactionSource};
