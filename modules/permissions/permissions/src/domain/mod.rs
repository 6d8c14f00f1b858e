//! Domain layer of the permission engine.
//!
//! Leaves first: [`store`] (port) → [`resolver`] + [`cache`] →
//! {[`gate`], [`field_guard`]}; [`service`] validates the granter through the
//! resolver before writing through the store.

pub mod cache;
pub mod clock;
pub mod error;
pub mod events;
pub mod field_guard;
pub mod gate;
pub mod groups;
pub mod local_client;
pub mod ports;
pub mod requests;
pub mod resolver;
pub mod service;
pub mod store;

pub use cache::{PermissionCache, RequestScope};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use resolver::PermissionResolver;
pub use service::PermissionMutationService;

#[cfg(test)]
pub(crate) mod test_support;
