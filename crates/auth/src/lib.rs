//! `society-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: the API turns a bearer token into a
//! [`Principal`] and asks [`authorize`] before touching the domain.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::{Principal, SocietyMembership};
pub use roles::Role;
