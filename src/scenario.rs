//! The battery electric vehicle charging case: a PV panel at the place of
//! work charges the vehicle battery through a charger that is only
//! connected during working hours, while the battery feeds the driving
//! load in the morning and evening commutes.

use crate::error::Result;
use crate::network::{
    BusConfig, GeneratorConfig, LinkConfig, LoadConfig, Network, StoreConfig,
};
use crate::series::{Profile, SeriesStore, Snapshots};
use chrono::{NaiveDate, NaiveDateTime};

pub const HORIZON: usize = 24;

/// Every number of the case, with the defaults of the reference day
#[derive(Debug, Clone, PartialEq)]
pub struct BevChargingParams {
    pub start: NaiveDateTime,
    /// Power drawn by driving at each hour
    pub driving: Vec<f64>,
    /// Availability factor of the PV panel at each hour
    pub pv_p_max_pu: Vec<f64>,
    /// 1 while the vehicle is plugged in at work, 0 otherwise
    pub charger_p_max_pu: Vec<f64>,
    pub pv_capital_cost: f64,
    pub charger_p_nom: f64,
    pub charger_efficiency: f64,
    pub battery_e_nom: f64,
}

impl Default for BevChargingParams {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2016, 1, 1)
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .unwrap_or_default();

        let mut driving = vec![0.0; HORIZON];
        for hour in [7, 8, 16, 17] {
            driving[hour] = 9.0;
        }

        let mut pv_p_max_pu = vec![0.0; HORIZON];
        let daylight = [
            0.1, 0.2, 0.4, 0.6, 0.75, 0.85, 0.9, 0.85, 0.75, 0.6, 0.4, 0.2,
        ];
        pv_p_max_pu[7..19].copy_from_slice(&daylight);

        let mut charger_p_max_pu = vec![0.0; HORIZON];
        for pu in charger_p_max_pu[9..=16].iter_mut() {
            *pu = 1.0;
        }

        Self {
            start,
            driving,
            pv_p_max_pu,
            charger_p_max_pu,
            pv_capital_cost: 1000.0,
            charger_p_nom: 120.0,
            charger_efficiency: 0.9,
            battery_e_nom: 100.0,
        }
    }
}

impl BevChargingParams {
    /// The hourly input series of the case
    pub fn series(&self) -> Result<SeriesStore> {
        let snapshots = Snapshots::hourly(self.start, self.driving.len())?;
        let mut store = SeriesStore::new(snapshots);
        store.insert("driving", self.driving.clone())?;
        store.insert("pv", self.pv_p_max_pu.clone())?;
        store.insert("charger", self.charger_p_max_pu.clone())?;
        Ok(store)
    }
}

/// Builds the charging network, leaving the PV panel size to the
/// optimization
pub fn bev_charging(params: &BevChargingParams) -> Result<Network> {
    let series = params.series()?;
    let mut n = Network::new(series.snapshots().clone());

    n.add_bus("place of work", BusConfig::default())?;
    n.add_bus(
        "battery",
        BusConfig {
            carrier: String::from("Li-ion"),
        },
    )?;

    let mut pv = GeneratorConfig::at_bus("place of work");
    pv.p_nom_extendable = true;
    pv.capital_cost = params.pv_capital_cost;
    pv.p_max_pu = Profile::Series(params.pv_p_max_pu.clone());
    n.add_generator("PV panel", pv)?;

    let driving = LoadConfig {
        bus: String::from("battery"),
        p_set: Profile::Series(params.driving.clone()),
    };
    n.add_load("driving", driving)?;

    let mut charger = LinkConfig::between("place of work", "battery");
    charger.p_nom = params.charger_p_nom;
    charger.p_max_pu = Profile::Series(params.charger_p_max_pu.clone());
    charger.efficiency = params.charger_efficiency;
    n.add_link("charger", charger)?;

    let mut storage = StoreConfig::at_bus("battery");
    storage.e_nom = params.battery_e_nom;
    storage.e_cyclic = true;
    n.add_store("battery storage", storage)?;

    Ok(n)
}
