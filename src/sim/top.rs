use std::sync::Arc;

use anyhow::{bail, Context};
use log::info;
use serde::Serialize;

use crate::base::behavior::*;
use crate::fabric::{IdRemap, IdRemapConfig, IdRemapStats, Xbar, XbarStats};
use crate::protocol::connect;
use crate::sim::config::RunConfig;
use crate::sim::responder::{MemResponder, ResponderStats};
use crate::sim::traffic::{TargetMap, TrafficGen, TrafficStats};

#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub cycles: u64,
    pub requesters: Vec<TrafficStats>,
    pub responders: Vec<ResponderStats>,
    pub remaps: Vec<IdRemapStats>,
    pub xbar: XbarStats,
}

/// Closed-loop testbench: random requesters on every slave port of a crossbar, banked memory
/// responders on every master port, and an identifier remapper in between wherever the
/// responder takes narrower identifiers than the crossbar produces.
pub struct Sim {
    timeout: u64,
    cycle: u64,
    requesters: Vec<TrafficGen>,
    xbar: Xbar,
    remaps: Vec<IdRemap>,
    responders: Vec<MemResponder>,
}

impl Sim {
    pub fn new(config: RunConfig) -> anyhow::Result<Self> {
        let RunConfig {
            sim,
            xbar: xbar_config,
            traffic,
            responder,
        } = config;
        responder.validate()?;
        let mst_id_width = xbar_config.mst_id_width();
        let slv_id_width = xbar_config.slv_id_width;
        let num_requesters = xbar_config.num_slave_ports;
        let num_responders = xbar_config.num_master_ports;

        let targets = (0..num_requesters)
            .map(|i| TargetMap::new(&xbar_config, i))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut xbar = Xbar::new(xbar_config).context("invalid crossbar config")?;

        let traffic = Arc::new(traffic);
        let mut requesters = Vec::with_capacity(num_requesters);
        for (i, map) in targets.into_iter().enumerate() {
            let mut gen = TrafficGen::new(
                format!("req{}", i),
                Arc::clone(&traffic),
                map,
                slv_id_width,
                sim.seed.wrapping_add(i as u64),
            );
            connect(&mut gen.port, xbar.slave_port(i), 1);
            requesters.push(gen);
        }

        let responder = Arc::new(responder);
        let mut remaps = Vec::new();
        let mut responders = Vec::with_capacity(num_responders);
        for j in 0..num_responders {
            let mut mem = MemResponder::new(
                format!("mem{}", j),
                Arc::clone(&responder),
                sim.seed.wrapping_add(0x1000 + j as u64),
            );
            match responder.id_width {
                Some(width) if width < mst_id_width => {
                    let mut remap = IdRemap::new(
                        format!("remap{}", j),
                        IdRemapConfig {
                            slv_id_width: mst_id_width,
                            mst_id_width: width,
                            max_trans: responder.remap_max_trans,
                        },
                    )?;
                    connect(xbar.master_port(j), &mut remap.slave, 1);
                    connect(&mut remap.master, &mut mem.slave, 1);
                    remaps.push(remap);
                }
                _ => connect(xbar.master_port(j), &mut mem.slave, 1),
            }
            responders.push(mem);
        }
        info!(
            "sim: {} requesters, {} responders, {} id remappers",
            num_requesters,
            num_responders,
            remaps.len()
        );

        Ok(Self {
            timeout: sim.timeout,
            cycle: 0,
            requesters,
            xbar,
            remaps,
            responders,
        })
    }

    pub fn finished(&self) -> bool {
        self.requesters.iter().all(TrafficGen::done)
    }

    pub fn report(&self) -> SimReport {
        SimReport {
            cycles: self.cycle,
            requesters: self.requesters.iter().map(|r| r.stats().clone()).collect(),
            responders: self.responders.iter().map(|r| r.stats().clone()).collect(),
            remaps: self.remaps.iter().map(|r| r.stats().clone()).collect(),
            xbar: self.xbar.stats(),
        }
    }

    /// Run until every requester has all its responses back.
    pub fn run(&mut self) -> anyhow::Result<SimReport> {
        while !self.finished() {
            if self.cycle >= self.timeout {
                let outstanding: usize = self.requesters.iter().map(TrafficGen::outstanding).sum();
                bail!(
                    "timeout after {} cycles with {} transactions outstanding",
                    self.cycle,
                    outstanding
                );
            }
            self.tick_one();
            for gen in self.requesters.iter_mut() {
                if let Some(err) = gen.take_error() {
                    return Err(err.context(format!("ordering violation at cycle {}", self.cycle)));
                }
            }
        }
        info!("sim: finished in {} cycles", self.cycle);
        Ok(self.report())
    }
}

impl ModuleBehaviors for Sim {
    fn tick_one(&mut self) {
        self.requesters.iter_mut().for_each(TrafficGen::tick_one);
        self.xbar.tick_one();
        self.remaps.iter_mut().for_each(IdRemap::tick_one);
        self.responders.iter_mut().for_each(MemResponder::tick_one);
        self.cycle += 1;
    }

    fn reset(&mut self) {
        self.cycle = 0;
        self.requesters.iter_mut().for_each(TrafficGen::reset);
        self.xbar.reset();
        self.remaps.iter_mut().for_each(IdRemap::reset);
        self.responders.iter_mut().for_each(MemResponder::reset);
    }
}
