//! Rhythm-timing and scoring engine for practicing songs on a virtual keyboard.
//!
//! [`engine::Engine`] is the single owner of a session: it is driven through
//! `start`/`pause`/`resume`/`reset`/`on_input_down` plus a cooperative `tick`, and
//! observed through [`engine::Engine::snapshot`]. [`host::SessionHost`] wraps it in
//! a mutex with a background tick loop for multi-threaded hosts.

pub mod config;
pub mod core;
pub mod engine;
pub mod game;
pub mod host;
