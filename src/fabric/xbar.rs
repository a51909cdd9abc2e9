use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::fabric::config::XbarConfig;
use crate::fabric::demux::{Demux, DemuxStats};
use crate::fabric::mux::{Mux, MuxStats};
use crate::protocol::{connect, MasterPort, SlavePort};

#[derive(Debug, Default, Clone, Serialize)]
pub struct XbarStats {
    pub demux: Vec<DemuxStats>,
    pub mux: Vec<MuxStats>,
}

/// Full many-to-many interconnect: one `Demux` per slave port, one `Mux` per master port, with
/// demux `i` output `j` wired straight to mux `j` input `i`.
pub struct Xbar {
    base: ModuleBase<(), XbarConfig>,
    demuxes: Vec<Demux>,
    muxes: Vec<Mux>,
}

module!(Xbar, (), XbarConfig,);

impl Xbar {
    pub fn new(config: XbarConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let decoder = config.decoder()?;

        let mut demuxes = (0..config.num_slave_ports)
            .map(|i| {
                Demux::new(
                    format!("xbar.demux{}", i),
                    config.demux_config(i),
                    decoder.clone(),
                    config.err_resp,
                )
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut muxes = (0..config.num_master_ports)
            .map(|j| Mux::new(format!("xbar.mux{}", j), config.mux_config()))
            .collect::<anyhow::Result<Vec<_>>>()?;

        for (i, demux) in demuxes.iter_mut().enumerate() {
            for (j, mux) in muxes.iter_mut().enumerate() {
                connect(&mut demux.masters[j], &mut mux.slaves[i], config.link_depth);
            }
        }
        info!(
            "xbar: {} slave ports x {} master ports, {}-bit ids in, {}-bit ids out",
            config.num_slave_ports,
            config.num_master_ports,
            config.slv_id_width,
            config.mst_id_width()
        );

        let mut me = Self {
            base: ModuleBase::default(),
            demuxes,
            muxes,
        };
        me.init_conf(Arc::new(config));
        Ok(me)
    }

    /// Port a requester connects to.
    pub fn slave_port(&mut self, idx: usize) -> &mut SlavePort {
        &mut self.demuxes[idx].slave
    }

    /// Port a responder connects to.
    pub fn master_port(&mut self, idx: usize) -> &mut MasterPort {
        &mut self.muxes[idx].master
    }

    pub fn demux(&self, idx: usize) -> &Demux {
        &self.demuxes[idx]
    }

    /// No accepted transaction is waiting for its response.
    pub fn quiescent(&self) -> bool {
        self.demuxes.iter().all(|d| d.outstanding() == (0, 0))
    }

    pub fn stats(&self) -> XbarStats {
        XbarStats {
            demux: self.demuxes.iter().map(|d| d.stats().clone()).collect(),
            mux: self.muxes.iter().map(|m| m.stats().clone()).collect(),
        }
    }
}

impl ModuleBehaviors for Xbar {
    fn tick_one(&mut self) {
        self.demuxes.iter_mut().for_each(Demux::tick_one);
        self.muxes.iter_mut().for_each(Mux::tick_one);
        self.advance();
    }

    fn reset(&mut self) {
        self.demuxes.iter_mut().for_each(Demux::reset);
        self.muxes.iter_mut().for_each(Mux::reset);
    }
}
