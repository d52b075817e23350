//! Business logic shared by handlers and middleware.

pub mod identity;
