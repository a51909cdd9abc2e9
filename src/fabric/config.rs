use anyhow::{bail, ensure};
use serde::Deserialize;

use crate::protocol::Resp;
use crate::route::encoder::{clog2, MAX_PORTS};
use crate::route::{AddrDecoder, AddrRule, MAX_LOOK_BITS};

#[derive(Debug, Clone)]
pub struct DemuxConfig {
    /// Real destinations; the error responder sits at index `num_ports`.
    pub num_ports: usize,
    pub id_width: u32,
    /// Low identifier bits used to index the ordering tables.
    pub look_bits: u32,
    /// Pending transactions allowed per table entry.
    pub max_trans: u32,
    pub default_port: Option<usize>,
    /// Destinations this requester may reach. Empty means all of them.
    pub connectivity: Vec<bool>,
    pub lock_r_bursts: bool,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            num_ports: 2,
            id_width: 4,
            look_bits: 4,
            max_trans: 8,
            default_port: None,
            connectivity: Vec::new(),
            lock_r_bursts: false,
        }
    }
}

impl DemuxConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.num_ports > 0, "demux needs at least one port");
        ensure!(
            self.num_ports < MAX_PORTS,
            "demux with {} ports leaves no room for the error responder",
            self.num_ports
        );
        ensure!(self.max_trans > 0, "max_trans must be > 0");
        ensure!(
            self.look_bits <= self.id_width,
            "look_bits {} wider than id_width {}",
            self.look_bits,
            self.id_width
        );
        ensure!(
            self.look_bits <= MAX_LOOK_BITS,
            "look_bits {} exceeds {}",
            self.look_bits,
            MAX_LOOK_BITS
        );
        if let Some(port) = self.default_port {
            ensure!(port < self.num_ports, "default port {} out of range", port);
            ensure!(
                self.connected(port),
                "default port {} is not connected to this requester",
                port
            );
        }
        if !self.connectivity.is_empty() {
            ensure!(
                self.connectivity.len() == self.num_ports,
                "connectivity row has {} entries for {} ports",
                self.connectivity.len(),
                self.num_ports
            );
        }
        Ok(())
    }

    pub fn connected(&self, port: usize) -> bool {
        self.connectivity.get(port).copied().unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub num_ports: usize,
    pub slv_id_width: u32,
    pub mst_id_width: u32,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            num_ports: 2,
            slv_id_width: 4,
            mst_id_width: 5,
        }
    }
}

impl MuxConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.num_ports > 0 && self.num_ports <= MAX_PORTS,
            "mux port count {} out of range",
            self.num_ports
        );
        let needed = self.slv_id_width + clog2(self.num_ports);
        ensure!(
            self.mst_id_width >= needed,
            "mux needs a {}-bit downstream id for {} ports of {}-bit ids, got {}",
            needed,
            self.num_ports,
            self.slv_id_width,
            self.mst_id_width
        );
        ensure!(self.mst_id_width <= 32, "id width {} exceeds 32", self.mst_id_width);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IdRemapConfig {
    pub slv_id_width: u32,
    pub mst_id_width: u32,
    pub max_trans: u32,
}

impl Default for IdRemapConfig {
    fn default() -> Self {
        Self {
            slv_id_width: 8,
            mst_id_width: 4,
            max_trans: 8,
        }
    }
}

impl IdRemapConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.mst_id_width <= self.slv_id_width,
            "remapper cannot widen ids ({} -> {})",
            self.slv_id_width,
            self.mst_id_width
        );
        ensure!(
            self.mst_id_width <= MAX_LOOK_BITS,
            "downstream id width {} exceeds {}",
            self.mst_id_width,
            MAX_LOOK_BITS
        );
        ensure!(self.slv_id_width <= 32, "id width {} exceeds 32", self.slv_id_width);
        ensure!(self.max_trans > 0, "max_trans must be > 0");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DefaultRoute {
    pub requester: usize,
    pub port: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XbarConfig {
    /// Requester-facing ports.
    pub num_slave_ports: usize,
    /// Responder-facing ports; one address rule each.
    pub num_master_ports: usize,
    pub slv_id_width: u32,
    pub look_bits: Option<u32>,
    pub max_trans: u32,
    pub rules: Vec<AddrRule>,
    /// Destinations for addresses no rule claims, per requester.
    pub default_routes: Vec<DefaultRoute>,
    /// `connectivity[requester][responder]`; empty means fully connected.
    pub connectivity: Vec<Vec<bool>>,
    /// Depth of the channels joining demultiplexers to multiplexers.
    pub link_depth: usize,
    pub lock_r_bursts: bool,
    /// Response the error responder answers with.
    pub err_resp: Resp,
}

impl Default for XbarConfig {
    fn default() -> Self {
        Self {
            num_slave_ports: 2,
            num_master_ports: 4,
            slv_id_width: 4,
            look_bits: None,
            max_trans: 8,
            rules: (0..4).map(|i| AddrRule::sized(i << 12, 0x1000)).collect(),
            default_routes: Vec::new(),
            connectivity: Vec::new(),
            link_depth: 1,
            lock_r_bursts: false,
            err_resp: Resp::DecErr,
        }
    }
}

impl XbarConfig {
    /// Identifier width seen by responders.
    pub fn mst_id_width(&self) -> u32 {
        self.slv_id_width + clog2(self.num_slave_ports)
    }

    pub fn decoder(&self) -> anyhow::Result<AddrDecoder> {
        AddrDecoder::new(self.rules.clone())
    }

    pub fn demux_config(&self, requester: usize) -> DemuxConfig {
        DemuxConfig {
            num_ports: self.num_master_ports,
            id_width: self.slv_id_width,
            look_bits: self.look_bits.unwrap_or(self.slv_id_width.min(MAX_LOOK_BITS)),
            max_trans: self.max_trans,
            default_port: self
                .default_routes
                .iter()
                .find(|route| route.requester == requester)
                .map(|route| route.port),
            connectivity: self.connectivity.get(requester).cloned().unwrap_or_default(),
            lock_r_bursts: self.lock_r_bursts,
        }
    }

    pub fn mux_config(&self) -> MuxConfig {
        MuxConfig {
            num_ports: self.num_slave_ports,
            slv_id_width: self.slv_id_width,
            mst_id_width: self.mst_id_width(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.num_slave_ports > 0, "crossbar needs at least one slave port");
        ensure!(self.num_master_ports > 0, "crossbar needs at least one master port");
        ensure!(self.link_depth > 0, "link_depth must be > 0");
        if self.rules.len() != self.num_master_ports {
            bail!(
                "{} address rules for {} master ports",
                self.rules.len(),
                self.num_master_ports
            );
        }
        let mut routed = vec![false; self.num_slave_ports];
        for route in &self.default_routes {
            ensure!(
                route.requester < self.num_slave_ports,
                "default route for unknown slave port {}",
                route.requester
            );
            ensure!(
                !std::mem::replace(&mut routed[route.requester], true),
                "slave port {} has more than one default route",
                route.requester
            );
        }
        if !self.connectivity.is_empty() {
            ensure!(
                self.connectivity.len() == self.num_slave_ports,
                "connectivity has {} rows for {} slave ports",
                self.connectivity.len(),
                self.num_slave_ports
            );
        }
        self.decoder()?;
        for requester in 0..self.num_slave_ports {
            self.demux_config(requester).validate()?;
        }
        self.mux_config().validate()?;
        Ok(())
    }
}
