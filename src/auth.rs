//! Authentication and role-based authorization.
//!
//! Bearer tokens are HS256 JWTs issued at login; every request re-loads the
//! user so deactivated accounts lose access immediately.

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
