//! REST surface of the permissions module under `/permissions/v1`.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod principal;
pub mod problem;
pub mod routes;
