pub mod claims;
pub mod context;
pub mod middleware;
pub mod password;
pub mod tokens;

pub use claims::Claims;
pub use context::AuthContext;
pub use middleware::{MaybeAuth, RequireAuth, RequireStaff};
pub use password::{hash_password, verify_password};
pub use tokens::TokenService;
