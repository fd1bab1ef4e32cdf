//! 中间件模块

mod auth;

pub use auth::{AuthUser, JWT_COOKIE, auth_middleware};
