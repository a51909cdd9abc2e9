pub mod config;
pub mod responder;
pub mod scoreboard;
pub mod top;
pub mod traffic;
