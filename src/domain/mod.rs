//! Domain models

pub mod common;
pub mod user;

pub use common::StringUuid;
pub use user::*;
