pub mod auth;

pub use auth::{load_account, require_admin, require_super_admin, AuthenticatedUser};
