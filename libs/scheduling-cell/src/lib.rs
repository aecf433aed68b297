pub mod handlers;
pub mod router;
pub mod models;
pub mod store;
pub mod services;

// Re-export the booking surface for external use
pub use models::*;
pub use services::*;
pub use store::{SchedulingStore, ProviderDirectory, StoreError};
