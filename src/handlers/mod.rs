// Handlers mounted behind the pipeline. Domain CRUD lives elsewhere; these
// cover liveness and the session endpoints that only need the identity the
// auth stage attaches.
pub mod health;
pub mod session;

pub use health::health;
pub use session::{logout, whoami};
