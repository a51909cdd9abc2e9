pub mod base;
pub mod fabric;
pub mod protocol;
pub mod route;
pub mod sim;
