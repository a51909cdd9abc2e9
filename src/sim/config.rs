use std::path::PathBuf;

use anyhow::Context;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

use crate::fabric::XbarConfig;

/// A section of the top-level TOML file. Missing sections fall back to defaults.
pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> anyhow::Result<Self> {
        match section {
            Some(value) => value
                .clone()
                .try_into()
                .with_context(|| format!("cannot deserialize {}", std::any::type_name::<Self>())),
            None => {
                warn!("config section for {} not found, using defaults", std::any::type_name::<Self>());
                Ok(Self::default())
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    /// Cycles before the run is declared hung.
    pub timeout: u64,
    pub seed: u64,
    pub results_json: Option<PathBuf>,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timeout: 100_000,
            seed: 0,
            results_json: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub txns_per_requester: u32,
    /// Fraction of transactions that are writes.
    pub write_ratio: f64,
    /// Largest `len` field drawn; bursts carry `len + 1` beats.
    pub max_len: u8,
    pub max_inflight: usize,
    /// Fraction of transactions aimed at addresses no rule claims.
    pub unmapped_ratio: f64,
    /// Chance of issuing a request in a cycle where one could go out.
    pub issue_prob: f64,
    /// Identifiers are drawn from `0..num_ids`; small values force same-id conflicts.
    pub num_ids: u32,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            txns_per_requester: 200,
            write_ratio: 0.5,
            max_len: 3,
            max_inflight: 8,
            unmapped_ratio: 0.05,
            issue_prob: 0.5,
            num_ids: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResponderConfig {
    /// Identifier width the responder supports. Narrower than the crossbar's downstream width
    /// puts an identifier remapper in front of it.
    pub id_width: Option<u32>,
    pub banks: usize,
    pub min_latency: u64,
    pub max_latency: u64,
    pub max_outstanding: usize,
    /// Pending transactions per truncated identifier in the remapper.
    pub remap_max_trans: u32,
}

impl Config for ResponderConfig {}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            id_width: None,
            banks: 4,
            min_latency: 2,
            max_latency: 12,
            max_outstanding: 16,
            remap_max_trans: 4,
        }
    }
}

impl ResponderConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.banks > 0, "responder needs at least one bank");
        anyhow::ensure!(
            self.min_latency <= self.max_latency,
            "min_latency {} above max_latency {}",
            self.min_latency,
            self.max_latency
        );
        anyhow::ensure!(self.max_outstanding > 0, "max_outstanding must be > 0");
        Ok(())
    }
}

impl Config for XbarConfig {}

/// Every section of a run's TOML file.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub sim: SimConfig,
    pub xbar: XbarConfig,
    pub traffic: TrafficConfig,
    pub responder: ResponderConfig,
}

impl RunConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let table: toml::Table = toml::from_str(text).context("cannot parse config toml")?;
        Ok(Self {
            sim: SimConfig::from_section(table.get("sim"))?,
            xbar: XbarConfig::from_section(table.get("xbar"))?,
            traffic: TrafficConfig::from_section(table.get("traffic"))?,
            responder: ResponderConfig::from_section(table.get("responder"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_parses_and_validates() {
        let config = RunConfig::from_toml(include_str!("../../configs/default.toml")).unwrap();
        config.xbar.validate().unwrap();
        config.responder.validate().unwrap();
        assert_eq!(Some(3), config.responder.id_width);
        assert_eq!(5, config.xbar.mst_id_width());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = RunConfig::from_toml("[sim]\nseed = 9\n").unwrap();
        assert_eq!(9, config.sim.seed);
        assert_eq!(100_000, config.sim.timeout);
        assert_eq!(4, config.xbar.num_master_ports);
    }

    #[test]
    fn bad_section_is_an_error() {
        assert!(RunConfig::from_toml("[traffic]\nmax_len = \"long\"\n").is_err());
    }
}
