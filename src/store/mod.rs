//! Row-level access to the three stores. Every function takes a bare
//! connection so callers decide whether it runs inside a transaction.

pub mod notifications;
pub mod posts;
pub mod users;
