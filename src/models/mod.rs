//! Domain models for tasklist.
//!
//! - [`Task`]: a unit of work owned by exactly one user.
//! - [`User`]: a registered account. The task core only ever sees its id.
//! - [`Session`]: a signed-in session that resolves a bearer token to a user.

mod task;
mod user;

pub use task::*;
pub use user::*;
