pub mod config;
pub mod database;
pub mod notifier;
pub mod queries;
pub mod store;

pub use config::StoreConfig;
pub use database::StoreDatabase;
pub use notifier::{ChangeNotifier, DocumentChange, Subscription};
pub use store::DocumentStore;
