//! Core domain types: the switch entity, its status state machine, and the
//! duration grammar shared by requests and configuration.

pub mod duration;
pub mod switch;

pub use switch::{PushSubscription, Status, Switch};
