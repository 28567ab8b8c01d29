// Repository layer for database operations

pub mod reminder;
pub mod user;

pub use reminder::ReminderRepository;
pub use user::UserRepository;
