//! Request handlers.

pub mod credits;
pub mod health;
pub mod jobs;

pub use credits::*;
pub use health::*;
pub use jobs::*;
