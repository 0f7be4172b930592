//! Domain layer: entities, value objects, authorization rules, and the ports
//! the application layer drives.

pub mod authorization;
pub mod identity;
pub mod payment;
pub mod ports;
pub mod request;
pub mod user;
