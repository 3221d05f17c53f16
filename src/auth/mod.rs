//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;

pub use jwt::{Claims, JwtService, TokenRejection};
pub use middleware::{authentication_middleware, extract_token, get_auth_context, AuthContext};
pub use password::{PasswordHasher, VerifyError};
pub use policy::{
    authorization_middleware, Access, AuthorizationPolicy, AuthorizationRule, Decision, DenyReason,
    PathPattern,
};
