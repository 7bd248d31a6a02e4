//! The Rust DHCP client implementation.
//!
//! The protocol engine (`state`) is synchronous and driven entirely by
//! injected context, so it can be exercised without sockets or clocks;
//! the `dispatch` module wires it to the real timer queue, UDP socket,
//! hook script and lease database.

pub mod backoff;
pub mod builder;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod lease;
pub mod state;
pub mod timer;

pub use self::{
    builder::MessageBuilder,
    config::{ClientConfig, InterfaceConfig},
    dispatch::Service,
    error::{Error, Result},
    hooks::{ClientScript, Hooks, ParamPrefix, Reason, ScriptCall},
    lease::Lease,
    state::{Context, DhcpState, InterfaceClient, Output, BROADCAST_ADDRESS},
    timer::{Handler, TimerKey, TimerQueue, Timers},
};
