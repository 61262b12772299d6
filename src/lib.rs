//! HASCILL Crypto Race: a multiplayer, turn-based coordinator for racing
//! teams through the stages of the HASCILL reference cipher.
//!
//! The cipher itself ([`cipher`], [`game`]) is pure and has no knowledge of
//! the network; the coordinator ([`coordinator`], [`lobby`], [`turn`],
//! [`session`], [`admin`], [`server`]) is the stateful half that wires it
//! up to connected clients.

pub mod admin;
pub mod cipher;
pub mod config;
pub mod coordinator;
pub mod game;
pub mod lobby;
pub mod logging;
pub mod net;
pub mod server;
pub mod session;
pub mod test_support;
pub mod turn;
