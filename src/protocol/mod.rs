pub mod beats;
pub mod bundle;

pub use beats::{AxReq, BResp, Burst, RBeat, Resp, WBeat};
pub use bundle::{connect, MasterPort, SlavePort};
