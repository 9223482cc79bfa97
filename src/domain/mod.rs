//! Domain types and the ports the application layer talks through.

pub mod cart;
pub mod catalog;
pub mod money;
pub mod order;
pub mod payment;
pub mod phone;
pub mod ports;
