// Database layer module

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod store;

pub use memory::InMemoryReminderStore;
pub use pool::DbPool;
pub use store::{ReminderStore, UserStore};
