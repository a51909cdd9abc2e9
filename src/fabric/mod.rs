pub mod config;
pub mod demux;
pub mod err_slave;
pub mod id_remap;
pub mod mux;
pub mod xbar;
mod unit_tests;

pub use config::{DefaultRoute, DemuxConfig, IdRemapConfig, MuxConfig, XbarConfig};
pub use demux::{Demux, DemuxStats};
pub use err_slave::{ErrorSlave, ErrorSlaveConfig, ErrorSlaveStats};
pub use id_remap::{IdRemap, IdRemapStats};
pub use mux::{Mux, MuxStats};
pub use xbar::{Xbar, XbarStats};
