//! A controller that dispatches text commands to independently addressed workers.
//!
//! Each worker owns a small append-only record store and serves it over a plain
//! TCP connection; the controller resolves a worker id to an endpoint, sends one
//! command per exchange and prints the reply.
//!
//! - [`store`] keeps the durable, append-only list of named records.
//! - [`protocol`] translates operations and replies to and from their line-oriented
//!   text form.
//! - [`dispatch`] executes a decoded operation against the store.
//! - [`server`] accepts worker connections one at a time and feeds them to the
//!   dispatcher.
//! - [`controller`] opens sessions to a worker and implements the user-facing
//!   `write`, `read`, `readloop` and `help` commands.
//! - [`config`] loads the worker endpoint registry.
//! - [`cli`] parses the command-line interface of both binaries.
//!
//! Integration tests drive the worker and controller through this crate directly,
//! and run the two binaries end to end.

pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod protocol;
pub mod server;
pub mod store;
