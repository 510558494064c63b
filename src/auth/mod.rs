pub mod cookie;
pub mod csrf;
pub mod token;

pub use cookie::{read_cookie, SessionCookies, AUTH_COOKIE, CSRF_COOKIE};
pub use csrf::CSRF_HEADER;
pub use token::{Claims, TokenAuthority, TokenError, ISSUER};
