pub mod arbiter;
pub mod decoder;
pub mod encoder;
pub mod id_table;
pub mod lock;

pub use arbiter::RrArbiter;
pub use decoder::{AddrDecoder, AddrRule, Decoded};
pub use encoder::{clog2, onehot_to_bin, PortMask, MAX_PORTS};
pub use id_table::{Bind, BindReject, IdTable, MAX_LOOK_BITS};
pub use lock::Lock;
