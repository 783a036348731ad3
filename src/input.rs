use crate::error::{Error, Result};
use crate::network::{
    BusConfig, GeneratorConfig, LinkConfig, LoadConfig, Network, StoreConfig,
};
use crate::optimizer::SolverOptions;
use crate::series::{Profile, SeriesStore};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub solver: SolverOptions,
}

pub fn read_config_input(filepath: &Path) -> Result<Config> {
    let contents = fs::read_to_string(filepath)?;
    let parsed: Config = serde_json::from_str(&contents)?;
    Ok(parsed)
}

/// A per-snapshot attribute as written in the case: a single number, one
/// number per snapshot, or the name of a column of the series table
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ProfileInput {
    Value(f64),
    Values(Vec<f64>),
    Series(String),
}

impl ProfileInput {
    fn build(&self, series: &SeriesStore) -> Result<Profile> {
        match self {
            ProfileInput::Value(value) => Ok(Profile::Static(*value)),
            ProfileInput::Values(values) => Ok(Profile::Series(values.clone())),
            ProfileInput::Series(name) => series
                .get(name)
                .map(|values| Profile::Series(values.to_vec()))
                .ok_or_else(|| {
                    Error::validation(format!("series '{}' not found", name))
                }),
        }
    }
}

fn build_profile(
    input: &Option<ProfileInput>,
    default: f64,
    series: &SeriesStore,
) -> Result<Profile> {
    match input {
        Some(profile) => profile.build(series),
        None => Ok(Profile::Static(default)),
    }
}

#[derive(Deserialize)]
pub struct BusInput {
    pub name: String,
    pub carrier: Option<String>,
}

#[derive(Deserialize)]
pub struct GeneratorInput {
    pub name: String,
    pub bus: String,
    #[serde(default)]
    pub p_nom: f64,
    #[serde(default)]
    pub p_nom_extendable: bool,
    #[serde(default)]
    pub p_nom_min: f64,
    pub p_nom_max: Option<f64>,
    pub p_max_pu: Option<ProfileInput>,
    #[serde(default)]
    pub capital_cost: f64,
    #[serde(default)]
    pub marginal_cost: f64,
}

#[derive(Deserialize)]
pub struct LoadInput {
    pub name: String,
    pub bus: String,
    pub p_set: Option<ProfileInput>,
}

#[derive(Deserialize)]
pub struct LinkInput {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    #[serde(default)]
    pub p_nom: f64,
    #[serde(default)]
    pub p_nom_extendable: bool,
    #[serde(default)]
    pub p_nom_min: f64,
    pub p_nom_max: Option<f64>,
    pub p_max_pu: Option<ProfileInput>,
    pub efficiency: Option<f64>,
    #[serde(default)]
    pub capital_cost: f64,
    #[serde(default)]
    pub marginal_cost: f64,
}

#[derive(Deserialize)]
pub struct StoreInput {
    pub name: String,
    pub bus: String,
    #[serde(default)]
    pub e_nom: f64,
    #[serde(default)]
    pub e_nom_extendable: bool,
    #[serde(default)]
    pub e_nom_min: f64,
    pub e_nom_max: Option<f64>,
    #[serde(default)]
    pub e_cyclic: bool,
    #[serde(default)]
    pub e_initial: f64,
    #[serde(default)]
    pub capital_cost: f64,
    #[serde(default)]
    pub marginal_cost: f64,
}

#[derive(Deserialize)]
pub struct NetworkInput {
    pub buses: Vec<BusInput>,
    #[serde(default)]
    pub generators: Vec<GeneratorInput>,
    #[serde(default)]
    pub loads: Vec<LoadInput>,
    #[serde(default)]
    pub links: Vec<LinkInput>,
    #[serde(default)]
    pub stores: Vec<StoreInput>,
}

pub fn read_network_input(filepath: &Path) -> Result<NetworkInput> {
    let contents = fs::read_to_string(filepath)?;
    let parsed: NetworkInput = serde_json::from_str(&contents)?;
    Ok(parsed)
}

impl NetworkInput {
    /// Builds the network over the horizon of the series table, resolving
    /// profiles given by series name
    pub fn build_network(&self, series: &SeriesStore) -> Result<Network> {
        let mut n = Network::new(series.snapshots().clone());

        for bus in self.buses.iter() {
            let config = match &bus.carrier {
                Some(carrier) => BusConfig {
                    carrier: carrier.clone(),
                },
                None => BusConfig::default(),
            };
            n.add_bus(&bus.name, config)?;
        }

        for g in self.generators.iter() {
            n.add_generator(
                &g.name,
                GeneratorConfig {
                    bus: g.bus.clone(),
                    p_nom: g.p_nom,
                    p_nom_extendable: g.p_nom_extendable,
                    p_nom_min: g.p_nom_min,
                    p_nom_max: g.p_nom_max,
                    p_max_pu: build_profile(&g.p_max_pu, 1.0, series)?,
                    capital_cost: g.capital_cost,
                    marginal_cost: g.marginal_cost,
                },
            )?;
        }

        for l in self.loads.iter() {
            n.add_load(
                &l.name,
                LoadConfig {
                    bus: l.bus.clone(),
                    p_set: build_profile(&l.p_set, 0.0, series)?,
                },
            )?;
        }

        for l in self.links.iter() {
            n.add_link(
                &l.name,
                LinkConfig {
                    bus0: l.bus0.clone(),
                    bus1: l.bus1.clone(),
                    p_nom: l.p_nom,
                    p_nom_extendable: l.p_nom_extendable,
                    p_nom_min: l.p_nom_min,
                    p_nom_max: l.p_nom_max,
                    p_max_pu: build_profile(&l.p_max_pu, 1.0, series)?,
                    efficiency: l.efficiency.unwrap_or(1.0),
                    capital_cost: l.capital_cost,
                    marginal_cost: l.marginal_cost,
                },
            )?;
        }

        for s in self.stores.iter() {
            n.add_store(
                &s.name,
                StoreConfig {
                    bus: s.bus.clone(),
                    e_nom: s.e_nom,
                    e_nom_extendable: s.e_nom_extendable,
                    e_nom_min: s.e_nom_min,
                    e_nom_max: s.e_nom_max,
                    e_cyclic: s.e_cyclic,
                    e_initial: s.e_initial,
                    capital_cost: s.capital_cost,
                    marginal_cost: s.marginal_cost,
                },
            )?;
        }

        Ok(n)
    }
}

pub struct Input {
    pub config: Config,
    pub network: NetworkInput,
    pub series: SeriesStore,
}

impl Input {
    /// Reads `config.json`, `network.json` and `series.csv` from a case
    /// directory. A missing `config.json` means default solver options.
    pub fn build(path: &Path) -> Result<Self> {
        let config_path = path.join("config.json");
        let config = if config_path.exists() {
            read_config_input(&config_path)?
        } else {
            Config::default()
        };
        let network = read_network_input(&path.join("network.json"))?;
        let series = SeriesStore::read_csv(&path.join("series.csv"))?;
        info!(
            path = %path.display(),
            snapshots = series.horizon(),
            buses = network.buses.len(),
            "case read"
        );
        Ok(Self {
            config,
            network,
            series,
        })
    }

    pub fn build_network(&self) -> Result<Network> {
        self.network.build_network(&self.series)
    }
}
