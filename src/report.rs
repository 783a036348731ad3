//! Read-only access to the results of a solved network, plus the derived
//! quantities computed from them. Every accessor fails with
//! [Error::NotSolved] until the network has been optimized.

use crate::error::{Error, Result};
use crate::network::Network;
use crate::optimizer::Results;

fn lookup(id: Option<usize>, kind: &str, name: &str) -> Result<usize> {
    id.ok_or_else(|| Error::UnknownComponent(format!("{} '{}'", kind, name)))
}

impl Network {
    pub fn results(&self) -> Result<&Results> {
        self.results.as_ref().ok_or(Error::NotSolved)
    }

    pub fn objective(&self) -> Result<f64> {
        Ok(self.results()?.objective)
    }

    pub fn generator_dispatch(&self, name: &str) -> Result<&[f64]> {
        let results = self.results()?;
        let id = lookup(self.generator_id(name), "generator", name)?;
        Ok(&results.generator_p[id])
    }

    /// Optimal nominal power, or the given one for fixed generators
    pub fn generator_capacity(&self, name: &str) -> Result<f64> {
        let results = self.results()?;
        let id = lookup(self.generator_id(name), "generator", name)?;
        Ok(results.generator_p_nom[id])
    }

    pub fn link_input(&self, name: &str) -> Result<&[f64]> {
        let results = self.results()?;
        let id = lookup(self.link_id(name), "link", name)?;
        Ok(&results.link_p0[id])
    }

    pub fn link_output(&self, name: &str) -> Result<&[f64]> {
        let results = self.results()?;
        let id = lookup(self.link_id(name), "link", name)?;
        Ok(&results.link_p1[id])
    }

    pub fn link_capacity(&self, name: &str) -> Result<f64> {
        let results = self.results()?;
        let id = lookup(self.link_id(name), "link", name)?;
        Ok(results.link_p_nom[id])
    }

    pub fn store_charge(&self, name: &str) -> Result<&[f64]> {
        let results = self.results()?;
        let id = lookup(self.store_id(name), "store", name)?;
        Ok(&results.store_charge[id])
    }

    pub fn store_discharge(&self, name: &str) -> Result<&[f64]> {
        let results = self.results()?;
        let id = lookup(self.store_id(name), "store", name)?;
        Ok(&results.store_discharge[id])
    }

    pub fn store_state_of_charge(&self, name: &str) -> Result<&[f64]> {
        let results = self.results()?;
        let id = lookup(self.store_id(name), "store", name)?;
        Ok(&results.store_e[id])
    }

    pub fn store_capacity(&self, name: &str) -> Result<f64> {
        let results = self.results()?;
        let id = lookup(self.store_id(name), "store", name)?;
        Ok(results.store_e_nom[id])
    }

    pub fn bus_marginal_price(&self, name: &str) -> Result<&[f64]> {
        let results = self.results()?;
        let id = lookup(self.bus_id(name), "bus", name)?;
        Ok(&results.bus_marginal_price[id])
    }

    /// Demand of a load at every snapshot
    pub fn load_demand(&self, name: &str) -> Result<Vec<f64>> {
        self.results()?;
        let id = lookup(self.load_id(name), "load", name)?;
        let load = &self.loads()[id];
        Ok((0..self.horizon()).map(|t| load.p_set.at(t)).collect())
    }

    fn weighted_sum(&self, series: &[f64]) -> f64 {
        series
            .iter()
            .zip(self.snapshots().weightings())
            .map(|(value, w)| value * w)
            .sum()
    }

    /// Energy produced by every generator over the horizon
    pub fn total_generation(&self) -> Result<f64> {
        let results = self.results()?;
        Ok(results
            .generator_p
            .iter()
            .map(|p| self.weighted_sum(p))
            .sum())
    }

    /// Energy consumed by every load over the horizon
    pub fn total_load(&self) -> Result<f64> {
        self.results()?;
        let total = self
            .loads()
            .iter()
            .map(|load| {
                (0..self.horizon())
                    .map(|t| load.p_set.at(t) * self.snapshots().weighting(t))
                    .sum::<f64>()
            })
            .sum();
        Ok(total)
    }

    /// Energy lost in conversion and left over in stores: generation
    /// minus load
    pub fn net_loss(&self) -> Result<f64> {
        Ok(self.total_generation()? - self.total_load()?)
    }

    /// Inflows minus outflows at a bus for every snapshot, zero up to the
    /// solver tolerance on a solved network
    pub fn energy_balance_residual(&self, name: &str) -> Result<Vec<f64>> {
        let results = self.results()?;
        let bus = &self.buses()[lookup(self.bus_id(name), "bus", name)?];
        let residual = (0..self.horizon())
            .map(|t| {
                let mut net = 0.0;
                for id in bus.generator_ids.iter() {
                    net += results.generator_p[*id][t];
                }
                for id in bus.target_link_ids.iter() {
                    net += results.link_p1[*id][t];
                }
                for id in bus.source_link_ids.iter() {
                    net -= results.link_p0[*id][t];
                }
                for id in bus.store_ids.iter() {
                    net += results.store_discharge[*id][t];
                    net -= results.store_charge[*id][t];
                }
                for id in bus.load_ids.iter() {
                    net -= self.loads()[*id].p_set.at(t);
                }
                net
            })
            .collect();
        Ok(residual)
    }
}
