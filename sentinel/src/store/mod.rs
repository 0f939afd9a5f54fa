pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod store;

pub use model::{EventQuery, SignalRecord, Subscriber};
pub use repository::SignalRepository;
pub use repository_sqlx::SqlxSignalRepository;
pub use store::SignalStore;
