use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub type BeatData = SmallVec<[u8; 8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Burst {
    Fixed,
    #[default]
    Incr,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resp {
    #[default]
    Okay,
    ExOkay,
    SlvErr,
    DecErr,
}

impl Resp {
    pub fn is_err(self) -> bool {
        matches!(self, Resp::SlvErr | Resp::DecErr)
    }
}

/// Address-phase request, shared by the write-address and read-address channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxReq {
    pub id: u32,
    pub addr: u64,
    /// Beats in the burst minus one.
    pub len: u8,
    /// log2 of bytes per beat.
    pub size: u8,
    pub burst: Burst,
    pub lock: bool,
    pub cache: u8,
    pub prot: u8,
    pub qos: u8,
    pub region: u8,
    pub user: u64,
}

impl AxReq {
    pub fn new(id: u32, addr: u64, len: u8) -> Self {
        Self {
            id,
            addr,
            len,
            size: 3,
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: u64) -> Self {
        self.user = user;
        self
    }

    pub fn beats(&self) -> u32 {
        self.len as u32 + 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WBeat {
    pub data: BeatData,
    pub strb: u64,
    pub last: bool,
    pub user: u64,
}

impl WBeat {
    pub fn new(data: u64, last: bool) -> Self {
        Self {
            data: SmallVec::from_slice(&data.to_le_bytes()),
            strb: 0xff,
            last,
            user: 0,
        }
    }

    pub fn with_user(mut self, user: u64) -> Self {
        self.user = user;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BResp {
    pub id: u32,
    pub resp: Resp,
    pub user: u64,
}

impl BResp {
    pub fn new(id: u32, resp: Resp) -> Self {
        Self { id, resp, user: 0 }
    }

    pub fn with_user(mut self, user: u64) -> Self {
        self.user = user;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RBeat {
    pub id: u32,
    pub data: BeatData,
    pub resp: Resp,
    pub last: bool,
    pub user: u64,
}

impl RBeat {
    pub fn new(id: u32, data: u64, resp: Resp, last: bool) -> Self {
        Self {
            id,
            data: SmallVec::from_slice(&data.to_le_bytes()),
            resp,
            last,
            user: 0,
        }
    }

    pub fn with_user(mut self, user: u64) -> Self {
        self.user = user;
        self
    }

    /// Low eight data bytes as a little-endian word.
    pub fn word(&self) -> u64 {
        let mut bytes = [0u8; 8];
        let n = self.data.len().min(8);
        bytes[..n].copy_from_slice(&self.data[..n]);
        u64::from_le_bytes(bytes)
    }
}

impl Display for AxReq {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ax [id: {:#x}, addr: {:#010x}, len: {}, size: {}, burst: {:?}, user: {:#x}]",
            self.id, self.addr, self.len, self.size, self.burst, self.user
        )
    }
}

impl Display for BResp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "b [id: {:#x}, resp: {:?}, user: {:#x}]", self.id, self.resp, self.user)
    }
}

impl Display for RBeat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "r [id: {:#x}, resp: {:?}, last: {}, user: {:#x}]",
            self.id, self.resp, self.last, self.user
        )
    }
}
