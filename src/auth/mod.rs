mod extract;
mod jwt;
mod password;

pub use extract::CurrentUser;
pub use jwt::{JwtService, Token};
pub use password::PasswordService;
