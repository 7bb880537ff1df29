pub mod characters;
pub mod chat;
pub mod providers;
pub mod sessions;

pub use characters::*;
pub use chat::*;
pub use providers::*;
pub use sessions::*;
