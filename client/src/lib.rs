//! Headless pool client: networked play with local physics prediction,
//! offline hot-seat play, an autoplay bot and an optional physics worker.

pub mod bot;
pub mod config;
pub mod connection;
pub mod game;
pub mod offline;
pub mod worker;
