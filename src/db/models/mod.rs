//! Database models split into domain-specific modules.

pub mod password_reset;
pub mod settings;
pub mod sleep_in_progress;
pub mod sleep_session;
pub mod user;

pub use password_reset::*;
pub use settings::*;
pub use sleep_in_progress::*;
pub use sleep_session::*;
pub use user::*;
