pub mod character;
pub mod message;
pub mod provider;
pub mod session;

pub use character::*;
pub use message::*;
pub use provider::*;
pub use session::*;
