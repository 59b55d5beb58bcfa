//! Switchyard - channel-bridging event multiplexer.
//!
//! A bridge presents one public channel to the application and relays socket
//! events to and from any number of bound endpoints, each on its own private
//! channel, keeping origin identities intact in both directions.
//!
//! ## Module Structure
//!
//! - `common`: Identities and error types
//! - `event`: Cooperative event dispatcher
//! - `transport`: TCP and in-memory endpoints
//! - `bridge`: Resolver, binding registry, relay rules and the `Bridge`
//! - `service`: Echo and traffic tap on the public channel
//! - `config`: HOCON configuration with environment overrides

pub mod bridge;
pub mod common;
pub mod config;
pub mod event;
pub mod service;
pub mod transport;
