use crate::error::{Error, Result};
use crate::optimizer::Results;
use crate::series::{Profile, Snapshots};

#[derive(Debug, Clone, PartialEq)]
pub struct BusConfig {
    pub carrier: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            carrier: String::from("AC"),
        }
    }
}

#[derive(Debug)]
pub struct Bus {
    pub id: usize,
    pub name: String,
    pub carrier: String,
    pub generator_ids: Vec<usize>,
    pub load_ids: Vec<usize>,
    pub store_ids: Vec<usize>,
    pub source_link_ids: Vec<usize>,
    pub target_link_ids: Vec<usize>,
}

impl Bus {
    pub fn new(id: usize, name: &str, config: BusConfig) -> Self {
        Self {
            id,
            name: name.to_string(),
            carrier: config.carrier,
            generator_ids: vec![],
            load_ids: vec![],
            store_ids: vec![],
            source_link_ids: vec![],
            target_link_ids: vec![],
        }
    }
}

/// Nominal capacity of a component, either given or decided by the
/// optimization within `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capacity {
    Fixed(f64),
    Extendable { min: f64, max: f64 },
}

impl Capacity {
    fn build(
        nominal: f64,
        extendable: bool,
        min: f64,
        max: Option<f64>,
        what: &str,
    ) -> Result<Self> {
        if !extendable {
            require_non_negative(nominal, what)?;
            return Ok(Capacity::Fixed(nominal));
        }
        require_non_negative(min, what)?;
        let max = max.unwrap_or(f64::INFINITY);
        if max.is_nan() || max < min {
            return Err(Error::validation(format!(
                "{} has maximum {} below its minimum {}",
                what, max, min
            )));
        }
        Ok(Capacity::Extendable { min, max })
    }

    pub fn is_extendable(&self) -> bool {
        matches!(self, Capacity::Extendable { .. })
    }
}

fn require_non_negative(value: f64, what: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(format!(
            "{} must be finite and non-negative, got {}",
            what, value
        )));
    }
    Ok(())
}

fn require_finite(value: f64, what: &str) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::validation(format!(
            "{} must be finite, got {}",
            what, value
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub bus: String,
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    /// Unbounded when `None`
    pub p_nom_max: Option<f64>,
    /// Fraction of the nominal power available at each snapshot
    pub p_max_pu: Profile,
    pub capital_cost: f64,
    pub marginal_cost: f64,
}

impl GeneratorConfig {
    pub fn at_bus(bus: &str) -> Self {
        Self {
            bus: bus.to_string(),
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_min: 0.0,
            p_nom_max: None,
            p_max_pu: Profile::Static(1.0),
            capital_cost: 0.0,
            marginal_cost: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct Generator {
    pub id: usize,
    pub name: String,
    pub bus_id: usize,
    pub capacity: Capacity,
    pub p_max_pu: Profile,
    pub capital_cost: f64,
    pub marginal_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadConfig {
    pub bus: String,
    pub p_set: Profile,
}

impl LoadConfig {
    pub fn at_bus(bus: &str) -> Self {
        Self {
            bus: bus.to_string(),
            p_set: Profile::Static(0.0),
        }
    }
}

#[derive(Debug)]
pub struct Load {
    pub id: usize,
    pub name: String,
    pub bus_id: usize,
    pub p_set: Profile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub bus0: String,
    pub bus1: String,
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    pub p_nom_max: Option<f64>,
    pub p_max_pu: Profile,
    /// Energy delivered to `bus1` per unit withdrawn from `bus0`
    pub efficiency: f64,
    pub capital_cost: f64,
    pub marginal_cost: f64,
}

impl LinkConfig {
    pub fn between(bus0: &str, bus1: &str) -> Self {
        Self {
            bus0: bus0.to_string(),
            bus1: bus1.to_string(),
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_min: 0.0,
            p_nom_max: None,
            p_max_pu: Profile::Static(1.0),
            efficiency: 1.0,
            capital_cost: 0.0,
            marginal_cost: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct Link {
    pub id: usize,
    pub name: String,
    pub source_bus_id: usize,
    pub target_bus_id: usize,
    pub capacity: Capacity,
    pub p_max_pu: Profile,
    pub efficiency: f64,
    pub capital_cost: f64,
    pub marginal_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub bus: String,
    pub e_nom: f64,
    pub e_nom_extendable: bool,
    pub e_nom_min: f64,
    pub e_nom_max: Option<f64>,
    /// Ties the state of charge before the first snapshot to the one at
    /// the last snapshot
    pub e_cyclic: bool,
    /// Stored energy before the first snapshot, ignored when cyclic
    pub e_initial: f64,
    pub capital_cost: f64,
    pub marginal_cost: f64,
}

impl StoreConfig {
    pub fn at_bus(bus: &str) -> Self {
        Self {
            bus: bus.to_string(),
            e_nom: 0.0,
            e_nom_extendable: false,
            e_nom_min: 0.0,
            e_nom_max: None,
            e_cyclic: false,
            e_initial: 0.0,
            capital_cost: 0.0,
            marginal_cost: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct Store {
    pub id: usize,
    pub name: String,
    pub bus_id: usize,
    pub capacity: Capacity,
    pub e_cyclic: bool,
    pub e_initial: f64,
    pub capital_cost: f64,
    pub marginal_cost: f64,
}

/// An energy system over a snapshot horizon. Owns every component and,
/// once optimized, the results of the last successful solve.
///
/// Components are only added through the validating `add_*` builders and
/// read back as slices, so the horizon and the components cannot change
/// behind the results:
///
/// ```compile_fail
/// use evflow_rs::network::Network;
/// use evflow_rs::series::Snapshots;
///
/// fn widen(n: &mut Network, longer: Snapshots) {
///     n.snapshots = longer;
/// }
/// ```
#[derive(Debug)]
pub struct Network {
    snapshots: Snapshots,
    buses: Vec<Bus>,
    generators: Vec<Generator>,
    loads: Vec<Load>,
    links: Vec<Link>,
    stores: Vec<Store>,
    pub(crate) results: Option<Results>,
}

macro_rules! find_by_name {
    ($fn_name:ident, $field:ident) => {
        pub fn $fn_name(&self, name: &str) -> Option<usize> {
            self.$field.iter().position(|c| c.name == name)
        }
    };
}

impl Network {
    pub fn new(snapshots: Snapshots) -> Self {
        Self {
            snapshots,
            buses: vec![],
            generators: vec![],
            loads: vec![],
            links: vec![],
            stores: vec![],
            results: None,
        }
    }

    find_by_name!(bus_id, buses);
    find_by_name!(generator_id, generators);
    find_by_name!(load_id, loads);
    find_by_name!(link_id, links);
    find_by_name!(store_id, stores);

    pub fn horizon(&self) -> usize {
        self.snapshots.len()
    }

    pub fn snapshots(&self) -> &Snapshots {
        &self.snapshots
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    pub fn is_solved(&self) -> bool {
        self.results.is_some()
    }

    fn require_bus(&self, bus: &str, component: &str) -> Result<usize> {
        self.bus_id(bus).ok_or_else(|| {
            Error::validation(format!(
                "{} references missing bus '{}'",
                component, bus
            ))
        })
    }

    fn require_unique(
        taken: Option<usize>,
        kind: &str,
        name: &str,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::validation(format!("{} name is empty", kind)));
        }
        match taken {
            Some(_) => Err(Error::validation(format!(
                "{} '{}' is already defined",
                kind, name
            ))),
            None => Ok(()),
        }
    }

    pub fn add_bus(&mut self, name: &str, config: BusConfig) -> Result<usize> {
        Self::require_unique(self.bus_id(name), "bus", name)?;
        let id = self.buses.len();
        self.buses.push(Bus::new(id, name, config));
        self.results = None;
        Ok(id)
    }

    pub fn add_generator(
        &mut self,
        name: &str,
        config: GeneratorConfig,
    ) -> Result<usize> {
        Self::require_unique(self.generator_id(name), "generator", name)?;
        let what = format!("generator '{}'", name);
        let bus_id = self.require_bus(&config.bus, &what)?;
        let capacity = Capacity::build(
            config.p_nom,
            config.p_nom_extendable,
            config.p_nom_min,
            config.p_nom_max,
            &format!("{} nominal power", what),
        )?;
        config
            .p_max_pu
            .validate(self.horizon(), &format!("{} p_max_pu", what))?;
        require_finite(config.capital_cost, &format!("{} capital cost", what))?;
        require_finite(
            config.marginal_cost,
            &format!("{} marginal cost", what),
        )?;

        let id = self.generators.len();
        self.generators.push(Generator {
            id,
            name: name.to_string(),
            bus_id,
            capacity,
            p_max_pu: config.p_max_pu,
            capital_cost: config.capital_cost,
            marginal_cost: config.marginal_cost,
        });
        self.buses[bus_id].generator_ids.push(id);
        self.results = None;
        Ok(id)
    }

    pub fn add_load(&mut self, name: &str, config: LoadConfig) -> Result<usize> {
        Self::require_unique(self.load_id(name), "load", name)?;
        let what = format!("load '{}'", name);
        let bus_id = self.require_bus(&config.bus, &what)?;
        config
            .p_set
            .validate(self.horizon(), &format!("{} p_set", what))?;

        let id = self.loads.len();
        self.loads.push(Load {
            id,
            name: name.to_string(),
            bus_id,
            p_set: config.p_set,
        });
        self.buses[bus_id].load_ids.push(id);
        self.results = None;
        Ok(id)
    }

    pub fn add_link(&mut self, name: &str, config: LinkConfig) -> Result<usize> {
        Self::require_unique(self.link_id(name), "link", name)?;
        let what = format!("link '{}'", name);
        let source_bus_id = self.require_bus(&config.bus0, &what)?;
        let target_bus_id = self.require_bus(&config.bus1, &what)?;
        let capacity = Capacity::build(
            config.p_nom,
            config.p_nom_extendable,
            config.p_nom_min,
            config.p_nom_max,
            &format!("{} nominal power", what),
        )?;
        config
            .p_max_pu
            .validate(self.horizon(), &format!("{} p_max_pu", what))?;
        require_non_negative(
            config.efficiency,
            &format!("{} efficiency", what),
        )?;
        require_finite(config.capital_cost, &format!("{} capital cost", what))?;
        require_finite(
            config.marginal_cost,
            &format!("{} marginal cost", what),
        )?;

        let id = self.links.len();
        self.links.push(Link {
            id,
            name: name.to_string(),
            source_bus_id,
            target_bus_id,
            capacity,
            p_max_pu: config.p_max_pu,
            efficiency: config.efficiency,
            capital_cost: config.capital_cost,
            marginal_cost: config.marginal_cost,
        });
        self.buses[source_bus_id].source_link_ids.push(id);
        self.buses[target_bus_id].target_link_ids.push(id);
        self.results = None;
        Ok(id)
    }

    pub fn add_store(&mut self, name: &str, config: StoreConfig) -> Result<usize> {
        Self::require_unique(self.store_id(name), "store", name)?;
        let what = format!("store '{}'", name);
        let bus_id = self.require_bus(&config.bus, &what)?;
        let capacity = Capacity::build(
            config.e_nom,
            config.e_nom_extendable,
            config.e_nom_min,
            config.e_nom_max,
            &format!("{} energy capacity", what),
        )?;
        require_non_negative(
            config.e_initial,
            &format!("{} initial energy", what),
        )?;
        if let Capacity::Fixed(e_nom) = capacity {
            if !config.e_cyclic && config.e_initial > e_nom {
                return Err(Error::validation(format!(
                    "{} initial energy {} exceeds its capacity {}",
                    what, config.e_initial, e_nom
                )));
            }
        }
        require_finite(config.capital_cost, &format!("{} capital cost", what))?;
        require_finite(
            config.marginal_cost,
            &format!("{} marginal cost", what),
        )?;

        let id = self.stores.len();
        self.stores.push(Store {
            id,
            name: name.to_string(),
            bus_id,
            capacity,
            e_cyclic: config.e_cyclic,
            e_initial: config.e_initial,
            capital_cost: config.capital_cost,
            marginal_cost: config.marginal_cost,
        });
        self.buses[bus_id].store_ids.push(id);
        self.results = None;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use chrono::NaiveDate;

    fn network(horizon: usize) -> Network {
        let start = NaiveDate::from_ymd_opt(2016, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Network::new(Snapshots::hourly(start, horizon).unwrap())
    }

    #[test]
    fn test_add_components_to_network() {
        let mut n = network(4);
        n.add_bus("work", BusConfig::default()).unwrap();
        n.add_bus(
            "battery",
            BusConfig {
                carrier: String::from("Li-ion"),
            },
        )
        .unwrap();
        n.add_generator("pv", GeneratorConfig::at_bus("work")).unwrap();
        n.add_load("driving", LoadConfig::at_bus("battery")).unwrap();
        n.add_link("charger", LinkConfig::between("work", "battery"))
            .unwrap();
        n.add_store("storage", StoreConfig::at_bus("battery")).unwrap();

        assert_eq!(n.buses.len(), 2);
        assert_eq!(n.buses[0].generator_ids, vec![0]);
        assert_eq!(n.buses[0].source_link_ids, vec![0]);
        assert_eq!(n.buses[1].target_link_ids, vec![0]);
        assert_eq!(n.buses[1].load_ids, vec![0]);
        assert_eq!(n.buses[1].store_ids, vec![0]);
        assert_eq!(n.buses[1].carrier, "Li-ion");
        assert_eq!(n.link_id("charger"), Some(0));
        assert_eq!(n.store_id("missing"), None);
    }

    #[test]
    fn test_component_views() {
        let mut n = network(3);
        n.add_bus("work", BusConfig::default()).unwrap();
        let mut gen = GeneratorConfig::at_bus("work");
        gen.p_nom = 5.0;
        gen.p_max_pu = Profile::Series(vec![0.0, 0.5, 1.0]);
        n.add_generator("pv", gen).unwrap();
        n.add_load("office", LoadConfig::at_bus("work")).unwrap();

        assert_eq!(n.snapshots().len(), n.horizon());
        assert_eq!(n.buses().len(), 1);
        assert_eq!(n.buses()[0].generator_ids, vec![0]);
        assert_eq!(n.generators()[0].capacity, Capacity::Fixed(5.0));
        assert_eq!(n.generators()[0].p_max_pu.at(2), 1.0);
        assert_eq!(n.loads()[0].bus_id, 0);
        assert!(n.links().is_empty());
        assert!(n.stores().is_empty());
    }

    #[test]
    fn test_missing_bus_is_rejected() {
        let mut n = network(4);
        n.add_bus("work", BusConfig::default()).unwrap();
        let r = n.add_generator("pv", GeneratorConfig::at_bus("home"));
        assert!(matches!(r, Err(Error::Validation(_))));
        let r = n.add_link("charger", LinkConfig::between("work", "battery"));
        assert!(matches!(r, Err(Error::Validation(_))));
        assert!(n.generators.is_empty());
        assert!(n.links.is_empty());
        assert!(n.buses[0].source_link_ids.is_empty());
    }

    #[test]
    fn test_series_length_mismatch_is_rejected() {
        let mut n = network(24);
        n.add_bus("battery", BusConfig::default()).unwrap();
        let config = LoadConfig {
            bus: String::from("battery"),
            p_set: Profile::Series(vec![9.0; 12]),
        };
        let r = n.add_load("driving", config);
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn test_duplicated_names_are_rejected() {
        let mut n = network(2);
        n.add_bus("work", BusConfig::default()).unwrap();
        let r = n.add_bus("work", BusConfig::default());
        assert!(matches!(r, Err(Error::Validation(_))));
        n.add_generator("pv", GeneratorConfig::at_bus("work")).unwrap();
        let r = n.add_generator("pv", GeneratorConfig::at_bus("work"));
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn test_negative_values_are_rejected() {
        let mut n = network(2);
        n.add_bus("work", BusConfig::default()).unwrap();
        n.add_bus("battery", BusConfig::default()).unwrap();

        let mut link = LinkConfig::between("work", "battery");
        link.efficiency = -0.9;
        assert!(n.add_link("charger", link).is_err());

        let mut gen = GeneratorConfig::at_bus("work");
        gen.p_nom = -1.0;
        assert!(n.add_generator("pv", gen).is_err());

        let mut store = StoreConfig::at_bus("battery");
        store.e_nom_extendable = true;
        store.e_nom_min = 10.0;
        store.e_nom_max = Some(5.0);
        assert!(n.add_store("storage", store).is_err());

        let mut store = StoreConfig::at_bus("battery");
        store.e_nom = 10.0;
        store.e_initial = 20.0;
        assert!(n.add_store("storage", store).is_err());
    }

    #[test]
    fn test_negative_costs_are_allowed() {
        let mut n = network(2);
        n.add_bus("work", BusConfig::default()).unwrap();
        let mut gen = GeneratorConfig::at_bus("work");
        gen.marginal_cost = -5.0;
        assert!(n.add_generator("pv", gen).is_ok());
    }
}
