//! Bridging one public channel to many endpoint channels.
//!
//! A [`Bridge`] owns a public channel. Each bound endpoint gets its own
//! private channel, a slot in the bridge's [`BindingRegistry`], and a pair of
//! relay rules that move socket events between the two channels while keeping
//! the origin identity honest in both directions.
//!
//! ## Module Structure
//!
//! - `resolver`: Turning descriptors into endpoints (`Resolve`, `RoleResolver`)
//! - `registry`: Per-bridge membership set (`BindingRegistry`)
//! - `relay`: Upward and downward forwarding rules
//! - `orchestrator`: The bridge itself (`Bridge`)

pub mod orchestrator;
pub mod registry;
pub mod relay;
pub mod resolver;

pub use orchestrator::Bridge;
pub use registry::BindingRegistry;
pub use relay::{DownwardRule, RulePair, UpwardRule};
pub use resolver::{
    identity_parse, parse_interface, AbstractResolver, Descriptor, Resolve, Resolved, RoleResolver,
};
