//! Arena Game Server - authoritative session core for a browser-based
//! multiplayer arena shooter.
//!
//! The library exposes the room simulation (tick scheduler, input queues,
//! simulator, combat, bots, delta broadcasting) plus the HTTP/WebSocket
//! surface that the browser client and the admin CLI talk to.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod session;
pub mod util;
pub mod ws;
