//! Event dispatch runtime.
//!
//! ## Module Structure
//!
//! - `kind`: The socket event vocabulary (`EventKind`)
//! - `types`: Event values, payload arguments and handler matchers
//! - `handler`: The `Handler` trait
//! - `dispatcher`: The cooperative dispatcher (`Dispatcher`)
//! - `inspect`: Component tree and handler table reports

pub mod dispatcher;
pub mod handler;
pub mod inspect;
pub mod kind;
pub mod types;

pub use dispatcher::{ComponentInfo, Dispatcher, DispatcherSettings};
pub use handler::Handler;
pub use kind::EventKind;
pub use types::{Arg, Event, EventBody, Fire, Matcher};
