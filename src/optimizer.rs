use crate::error::{Error, Result};
use crate::network::{Capacity, Network};
use crate::solver;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Options applied to every HiGHS instance created for a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub presolve: bool,
    pub solver: String,
    pub parallel: bool,
    pub threads: i32,
    pub primal_feasibility_tolerance: f64,
    pub dual_feasibility_tolerance: f64,
    /// Seconds
    pub time_limit: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            presolve: false,
            solver: String::from("simplex"),
            parallel: false,
            threads: 1,
            primal_feasibility_tolerance: 1e-7,
            dual_feasibility_tolerance: 1e-7,
            time_limit: 300.0,
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

impl SolverOptions {
    fn apply(&self, model: &mut solver::Model) -> Result<()> {
        model.set_option("presolve", on_off(self.presolve))?;
        model.set_option("solver", self.solver.as_str())?;
        model.set_option("parallel", on_off(self.parallel))?;
        model.set_option("threads", self.threads)?;
        model.set_option(
            "primal_feasibility_tolerance",
            self.primal_feasibility_tolerance,
        )?;
        model.set_option(
            "dual_feasibility_tolerance",
            self.dual_feasibility_tolerance,
        )?;
        model.set_option("time_limit", self.time_limit)?;
        Ok(())
    }
}

/// Optimal sizing and dispatch of a network. Series are indexed by
/// component id, then by snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    pub objective: f64,
    pub generator_p_nom: Vec<f64>,
    pub generator_p: Vec<Vec<f64>>,
    pub link_p_nom: Vec<f64>,
    /// Power withdrawn from `bus0`
    pub link_p0: Vec<Vec<f64>>,
    /// Power delivered to `bus1`
    pub link_p1: Vec<Vec<f64>>,
    pub store_e_nom: Vec<f64>,
    pub store_charge: Vec<Vec<f64>>,
    pub store_discharge: Vec<Vec<f64>>,
    pub store_e: Vec<Vec<f64>>,
    /// Cost of one extra unit of load at each bus and snapshot
    pub bus_marginal_price: Vec<Vec<f64>>,
}

/// Helper accessor for indexing the variables and constraints of the
/// formulated problem
#[derive(Debug)]
pub struct Accessors {
    pub generator_p: Vec<Vec<usize>>,
    pub generator_p_nom: Vec<Option<usize>>,
    pub link_p: Vec<Vec<usize>>,
    pub link_p_nom: Vec<Option<usize>>,
    pub store_charge: Vec<Vec<usize>>,
    pub store_discharge: Vec<Vec<usize>>,
    pub store_e: Vec<Vec<usize>>,
    pub store_e_nom: Vec<Option<usize>>,
    pub bus_balance: Vec<Vec<usize>>,
    pub store_balance: Vec<Vec<usize>>,
}

/// The linear problem of a network, together with the accessors for
/// reading its solution back
#[derive(Debug)]
pub struct Formulation {
    pub problem: solver::Problem,
    pub accessors: Accessors,
}

fn add_nominal_column(
    pb: &mut solver::Problem,
    capacity: Capacity,
    capital_cost: f64,
) -> Option<usize> {
    match capacity {
        Capacity::Fixed(_) => None,
        Capacity::Extendable { min, max } => {
            Some(pb.add_column(capital_cost, min..=max))
        }
    }
}

/// Upper bound of a dispatch column, unbounded when the capacity is
/// decided by the optimization and enforced by a row instead
fn dispatch_upper(capacity: Capacity, p_max_pu: f64) -> f64 {
    match capacity {
        Capacity::Fixed(p_nom) => p_nom * p_max_pu,
        Capacity::Extendable { .. } => f64::INFINITY,
    }
}

fn nominal_value(
    capacity: Capacity,
    column: Option<usize>,
    solution: &solver::Solution,
) -> f64 {
    match (capacity, column) {
        (Capacity::Fixed(nominal), _) => nominal,
        (Capacity::Extendable { .. }, Some(col)) => solution.colvalue[col],
        (Capacity::Extendable { min, .. }, None) => min,
    }
}

fn column_values(columns: &[usize], solution: &solver::Solution) -> Vec<f64> {
    columns.iter().map(|col| solution.colvalue[*col]).collect()
}

impl Formulation {
    pub fn new(network: &Network) -> Self {
        let mut pb = solver::Problem::new();
        let horizon = network.horizon();
        let w = network.snapshots().weightings();

        // VARIABLES
        let generator_p_nom: Vec<Option<usize>> = network
            .generators()
            .iter()
            .map(|g| add_nominal_column(&mut pb, g.capacity, g.capital_cost))
            .collect();
        let mut generator_p = Vec::with_capacity(network.generators().len());
        for g in network.generators().iter() {
            let columns: Vec<usize> = (0..horizon)
                .map(|t| {
                    let upper = dispatch_upper(g.capacity, g.p_max_pu.at(t));
                    pb.add_column(g.marginal_cost * w[t], 0.0..=upper)
                })
                .collect();
            generator_p.push(columns);
        }

        let link_p_nom: Vec<Option<usize>> = network
            .links()
            .iter()
            .map(|l| add_nominal_column(&mut pb, l.capacity, l.capital_cost))
            .collect();
        let mut link_p = Vec::with_capacity(network.links().len());
        for l in network.links().iter() {
            let columns: Vec<usize> = (0..horizon)
                .map(|t| {
                    let upper = dispatch_upper(l.capacity, l.p_max_pu.at(t));
                    pb.add_column(l.marginal_cost * w[t], 0.0..=upper)
                })
                .collect();
            link_p.push(columns);
        }

        let store_e_nom: Vec<Option<usize>> = network
            .stores()
            .iter()
            .map(|s| add_nominal_column(&mut pb, s.capacity, s.capital_cost))
            .collect();
        let mut store_charge = Vec::with_capacity(network.stores().len());
        let mut store_discharge = Vec::with_capacity(network.stores().len());
        let mut store_e = Vec::with_capacity(network.stores().len());
        for s in network.stores().iter() {
            store_charge.push(
                (0..horizon)
                    .map(|_| pb.add_column(0.0, 0.0..))
                    .collect::<Vec<usize>>(),
            );
            store_discharge.push(
                (0..horizon)
                    .map(|t| pb.add_column(s.marginal_cost * w[t], 0.0..))
                    .collect::<Vec<usize>>(),
            );
            let upper = dispatch_upper(s.capacity, 1.0);
            store_e.push(
                (0..horizon)
                    .map(|_| pb.add_column(0.0, 0.0..=upper))
                    .collect::<Vec<usize>>(),
            );
        }

        // Nominal capacity rows for extendable components
        for (g, p_nom) in network.generators().iter().zip(&generator_p_nom) {
            if let Some(p_nom) = p_nom {
                for (t, p) in generator_p[g.id].iter().enumerate() {
                    let pu = g.p_max_pu.at(t);
                    pb.add_row(..=0.0, &[(*p, 1.0), (*p_nom, -pu)]);
                }
            }
        }
        for (l, p_nom) in network.links().iter().zip(&link_p_nom) {
            if let Some(p_nom) = p_nom {
                for (t, p) in link_p[l.id].iter().enumerate() {
                    let pu = l.p_max_pu.at(t);
                    pb.add_row(..=0.0, &[(*p, 1.0), (*p_nom, -pu)]);
                }
            }
        }
        for (s, e_nom) in network.stores().iter().zip(&store_e_nom) {
            if let Some(e_nom) = e_nom {
                for e in store_e[s.id].iter() {
                    pb.add_row(..=0.0, &[(*e, 1.0), (*e_nom, -1.0)]);
                }
            }
        }

        // Adds the state of charge recursion, closing the horizon on
        // itself for cyclic stores
        let mut store_balance = Vec::with_capacity(network.stores().len());
        for s in network.stores().iter() {
            let e = &store_e[s.id];
            let rows: Vec<usize> = (0..horizon)
                .map(|t| {
                    let mut factors = vec![
                        (e[t], 1.0),
                        (store_charge[s.id][t], -w[t]),
                        (store_discharge[s.id][t], w[t]),
                    ];
                    let rhs = if t > 0 {
                        factors.push((e[t - 1], -1.0));
                        0.0
                    } else if s.e_cyclic {
                        factors.push((e[horizon - 1], -1.0));
                        0.0
                    } else {
                        s.e_initial
                    };
                    pb.add_row(rhs..=rhs, &factors)
                })
                .collect();
            store_balance.push(rows);
        }

        // Adds load balance with the bus load as RHS
        let mut bus_balance = Vec::with_capacity(network.buses().len());
        for bus in network.buses().iter() {
            let rows: Vec<usize> = (0..horizon)
                .map(|t| {
                    let mut factors: Vec<(usize, f64)> = vec![];
                    for generator_id in bus.generator_ids.iter() {
                        factors.push((generator_p[*generator_id][t], 1.0));
                    }
                    for link_id in bus.target_link_ids.iter() {
                        let efficiency = network.links()[*link_id].efficiency;
                        factors.push((link_p[*link_id][t], efficiency));
                    }
                    for link_id in bus.source_link_ids.iter() {
                        factors.push((link_p[*link_id][t], -1.0));
                    }
                    for store_id in bus.store_ids.iter() {
                        factors.push((store_discharge[*store_id][t], 1.0));
                        factors.push((store_charge[*store_id][t], -1.0));
                    }
                    let load: f64 = bus
                        .load_ids
                        .iter()
                        .map(|load_id| network.loads()[*load_id].p_set.at(t))
                        .sum();
                    pb.add_row(load..=load, &factors)
                })
                .collect();
            bus_balance.push(rows);
        }

        let accessors = Accessors {
            generator_p,
            generator_p_nom,
            link_p,
            link_p_nom,
            store_charge,
            store_discharge,
            store_e,
            store_e_nom,
            bus_balance,
            store_balance,
        };

        Formulation {
            problem: pb,
            accessors,
        }
    }
}

impl Accessors {
    fn extract(
        &self,
        network: &Network,
        solution: &solver::Solution,
        objective: f64,
    ) -> Results {
        let w = network.snapshots().weightings();

        let generator_p_nom = network
            .generators()
            .iter()
            .map(|g| {
                nominal_value(g.capacity, self.generator_p_nom[g.id], solution)
            })
            .collect();
        let generator_p = self
            .generator_p
            .iter()
            .map(|cols| column_values(cols, solution))
            .collect();

        let link_p_nom = network
            .links()
            .iter()
            .map(|l| nominal_value(l.capacity, self.link_p_nom[l.id], solution))
            .collect();
        let link_p0: Vec<Vec<f64>> = self
            .link_p
            .iter()
            .map(|cols| column_values(cols, solution))
            .collect();
        let link_p1 = network
            .links()
            .iter()
            .map(|l| link_p0[l.id].iter().map(|p| p * l.efficiency).collect())
            .collect();

        let store_e_nom = network
            .stores()
            .iter()
            .map(|s| nominal_value(s.capacity, self.store_e_nom[s.id], solution))
            .collect();

        let bus_marginal_price = self
            .bus_balance
            .iter()
            .map(|rows| {
                rows.iter()
                    .enumerate()
                    .map(|(t, row)| solution.rowdual[*row] / w[t])
                    .collect()
            })
            .collect();

        Results {
            objective,
            generator_p_nom,
            generator_p,
            link_p_nom,
            link_p0,
            link_p1,
            store_e_nom,
            store_charge: self
                .store_charge
                .iter()
                .map(|cols| column_values(cols, solution))
                .collect(),
            store_discharge: self
                .store_discharge
                .iter()
                .map(|cols| column_values(cols, solution))
                .collect(),
            store_e: self
                .store_e
                .iter()
                .map(|cols| column_values(cols, solution))
                .collect(),
            bus_marginal_price,
        }
    }
}

/// Solves the model, resolving ambiguous statuses: first without presolve,
/// then by checking feasibility alone with a zero objective.
fn retry_solve(
    model: &mut solver::Model,
    options: &SolverOptions,
) -> Result<()> {
    let mut presolve = options.presolve;
    let mut feasibility_check = false;
    loop {
        model.solve()?;
        let status = model.status()?;
        debug!(?status, presolve, feasibility_check, "solve finished");
        match status {
            solver::HighsModelStatus::Optimal if feasibility_check => {
                return Err(Error::Unbounded)
            }
            solver::HighsModelStatus::Optimal => return Ok(()),
            solver::HighsModelStatus::Infeasible => {
                return Err(Error::Infeasible)
            }
            solver::HighsModelStatus::Unbounded if !feasibility_check => {
                return Err(Error::Unbounded)
            }
            solver::HighsModelStatus::UnboundedOrInfeasible if presolve => {
                warn!("ambiguous solver status, retrying without presolve");
                presolve = false;
                model.set_option("presolve", "off")?;
                model.clear_solver();
            }
            solver::HighsModelStatus::UnboundedOrInfeasible
                if !feasibility_check =>
            {
                warn!("ambiguous solver status, checking feasibility");
                feasibility_check = true;
                model.clear_objective()?;
                model.clear_solver();
            }
            status => {
                return Err(Error::Solver(format!(
                    "optimization finished with status {:?}",
                    status
                )))
            }
        }
    }
}

/// Formulates and solves the linear problem of the network, storing the
/// results in it and returning the optimal objective value. Any previous
/// results are discarded, also when the solve fails.
pub fn optimize(network: &mut Network, options: &SolverOptions) -> Result<f64> {
    network.results = None;
    let begin = Instant::now();

    let Formulation { problem, accessors } = Formulation::new(network);
    info!(
        snapshots = network.horizon(),
        columns = problem.num_col,
        rows = problem.num_row,
        nonzeros = problem.num_nz,
        "formulated linear problem"
    );

    // HiGHS reports an empty model instead of solving it
    if problem.num_col == 0 {
        let feasible = problem
            .row_lower
            .iter()
            .zip(problem.row_upper.iter())
            .all(|(low, high)| *low <= 0.0 && 0.0 <= *high);
        if !feasible {
            return Err(Error::Infeasible);
        }
        let solution = solver::Solution {
            colvalue: vec![],
            rowdual: vec![0.0; problem.num_row],
        };
        network.results = Some(accessors.extract(network, &solution, 0.0));
        return Ok(0.0);
    }

    let mut model = problem.optimise()?;
    options.apply(&mut model)?;
    retry_solve(&mut model, options)?;

    let solution = model.get_solution();
    let objective = model.get_objective_value();
    network.results = Some(accessors.extract(network, &solution, objective));
    info!(
        objective,
        elapsed_ms = begin.elapsed().as_millis() as u64,
        "optimization finished"
    );
    Ok(objective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        BusConfig, GeneratorConfig, LinkConfig, LoadConfig, StoreConfig,
    };
    use crate::scenario::{bev_charging, BevChargingParams};
    use crate::series::{Profile, Snapshots};
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    const TOL: f64 = 1e-6;

    fn network(horizon: usize) -> Network {
        let start = NaiveDate::from_ymd_opt(2016, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut n = Network::new(Snapshots::hourly(start, horizon).unwrap());
        n.add_bus("bus", BusConfig::default()).unwrap();
        n
    }

    fn load(n: &mut Network, values: Vec<f64>) {
        let config = LoadConfig {
            bus: String::from("bus"),
            p_set: Profile::Series(values),
        };
        n.add_load("load", config).unwrap();
    }

    fn presolved() -> SolverOptions {
        SolverOptions {
            presolve: true,
            ..SolverOptions::default()
        }
    }

    fn fixed_generator(n: &mut Network, name: &str, p_nom: f64, cost: f64) {
        let mut config = GeneratorConfig::at_bus("bus");
        config.p_nom = p_nom;
        config.marginal_cost = cost;
        n.add_generator(name, config).unwrap();
    }

    #[test]
    fn test_formulation_sizes_for_bev_scenario() {
        let n = bev_charging(&BevChargingParams::default()).unwrap();
        let f = Formulation::new(&n);
        // p_nom + 24 x (generator, link, charge, discharge, e)
        assert_eq!(f.problem.num_col, 1 + 24 * 5);
        // 24 x (capacity, state of charge, 2 bus balances)
        assert_eq!(f.problem.num_row, 24 * 4);
        assert_eq!(f.accessors.generator_p_nom, vec![Some(0)]);
        assert_eq!(f.accessors.link_p_nom, vec![None]);
        assert_eq!(f.accessors.bus_balance.len(), 2);
        assert_eq!(f.accessors.store_e[0].len(), 24);
    }

    #[test]
    fn test_merit_order_dispatch() {
        let mut n = network(3);
        load(&mut n, vec![5.0, 15.0, 25.0]);
        fixed_generator(&mut n, "cheap", 10.0, 1.0);
        fixed_generator(&mut n, "expensive", 20.0, 3.0);
        let objective = optimize(&mut n, &SolverOptions::default()).unwrap();

        let results = n.results.as_ref().unwrap();
        assert_abs_diff_eq!(
            objective,
            (5.0 + 10.0 + 10.0) + 3.0 * (5.0 + 15.0),
            epsilon = TOL
        );
        let cheap = &results.generator_p[0];
        let expensive = &results.generator_p[1];
        let expected = [(5.0, 0.0), (10.0, 5.0), (10.0, 15.0)];
        for (t, (c, e)) in expected.iter().enumerate() {
            assert_abs_diff_eq!(cheap[t], *c, epsilon = TOL);
            assert_abs_diff_eq!(expensive[t], *e, epsilon = TOL);
        }
        assert_eq!(results.generator_p_nom, vec![10.0, 20.0]);
    }

    #[test]
    fn test_infeasible_network() {
        let mut n = network(2);
        load(&mut n, vec![10.0, 10.0]);
        fixed_generator(&mut n, "small", 5.0, 0.0);
        let r = optimize(&mut n, &SolverOptions::default());
        assert!(matches!(r, Err(Error::Infeasible)));
        assert!(n.results.is_none());
    }

    #[test]
    fn test_infeasible_network_with_presolve() {
        let mut n = network(2);
        load(&mut n, vec![10.0, 10.0]);
        fixed_generator(&mut n, "small", 5.0, 0.0);
        let options = SolverOptions {
            presolve: true,
            ..SolverOptions::default()
        };
        let r = optimize(&mut n, &options);
        assert!(matches!(r, Err(Error::Infeasible)));
    }

    #[test]
    fn test_unbounded_network() {
        let mut n = network(2);
        load(&mut n, vec![1.0, 1.0]);
        let mut config = GeneratorConfig::at_bus("bus");
        config.p_nom_extendable = true;
        config.capital_cost = -1.0;
        n.add_generator("subsidised", config).unwrap();
        let r = optimize(&mut n, &SolverOptions::default());
        assert!(matches!(r, Err(Error::Unbounded)));
        assert!(n.results.is_none());
    }

    #[test]
    fn test_unbounded_network_with_presolve() {
        let mut n = network(2);
        load(&mut n, vec![1.0, 1.0]);
        let mut config = GeneratorConfig::at_bus("bus");
        config.p_nom_extendable = true;
        config.capital_cost = -1.0;
        n.add_generator("subsidised", config).unwrap();
        let r = optimize(&mut n, &presolved());
        assert!(matches!(r, Err(Error::Unbounded)));
        assert!(n.results.is_none());
    }

    #[test]
    fn test_unbounded_store_with_presolve() {
        let mut n = network(3);
        let mut config = StoreConfig::at_bus("bus");
        config.e_nom_extendable = true;
        config.e_cyclic = true;
        config.capital_cost = -1.0;
        n.add_store("subsidised", config).unwrap();
        let r = optimize(&mut n, &presolved());
        assert!(matches!(r, Err(Error::Unbounded)));
        assert!(n.results.is_none());
    }

    #[test]
    fn test_infeasible_network_with_unbounded_direction() {
        // The subsidised capacity is unbounded, but the load at the other
        // bus can never be met
        let mut n = network(2);
        load(&mut n, vec![10.0, 10.0]);
        fixed_generator(&mut n, "small", 5.0, 0.0);
        n.add_bus("remote", BusConfig::default()).unwrap();
        let mut config = GeneratorConfig::at_bus("remote");
        config.p_nom_extendable = true;
        config.capital_cost = -1.0;
        n.add_generator("subsidised", config).unwrap();
        for options in [SolverOptions::default(), presolved()] {
            let r = optimize(&mut n, &options);
            assert!(matches!(r, Err(Error::Infeasible)));
            assert!(n.results.is_none());
        }
    }

    #[test]
    fn test_empty_network() {
        let mut n = network(2);
        assert_eq!(optimize(&mut n, &SolverOptions::default()).unwrap(), 0.0);
        assert!(n.results.is_some());

        load(&mut n, vec![1.0, 0.0]);
        let r = optimize(&mut n, &SolverOptions::default());
        assert!(matches!(r, Err(Error::Infeasible)));
    }

    #[test]
    fn test_non_cyclic_store_discharges_initial_energy() {
        let mut n = network(3);
        load(&mut n, vec![2.0, 2.0, 2.0]);
        fixed_generator(&mut n, "backup", 10.0, 5.0);
        let mut config = StoreConfig::at_bus("bus");
        config.e_nom = 10.0;
        config.e_initial = 5.0;
        n.add_store("tank", config).unwrap();
        let objective = optimize(&mut n, &SolverOptions::default()).unwrap();

        // 5 units stored, 6 needed: 1 unit from the backup generator
        assert_abs_diff_eq!(objective, 5.0, epsilon = TOL);
        let results = n.results.as_ref().unwrap();
        let e = &results.store_e[0];
        assert_abs_diff_eq!(e[2], 0.0, epsilon = TOL);
        let discharged: f64 = results.store_discharge[0].iter().sum();
        let charged: f64 = results.store_charge[0].iter().sum();
        assert_abs_diff_eq!(discharged - charged, 5.0, epsilon = TOL);
    }

    #[test]
    fn test_extendable_store_and_link() {
        let mut n = network(2);
        n.add_bus("storage", BusConfig::default()).unwrap();
        load(&mut n, vec![0.0, 4.0]);

        let mut generator = GeneratorConfig::at_bus("bus");
        generator.p_nom = 10.0;
        generator.p_max_pu = Profile::Series(vec![1.0, 0.0]);
        n.add_generator("sun", generator).unwrap();

        let mut charger = LinkConfig::between("bus", "storage");
        charger.p_nom_extendable = true;
        charger.capital_cost = 1.0;
        charger.efficiency = 0.5;
        n.add_link("charger", charger).unwrap();

        let mut discharger = LinkConfig::between("storage", "bus");
        discharger.p_nom = 100.0;
        n.add_link("discharger", discharger).unwrap();

        let mut store = StoreConfig::at_bus("storage");
        store.e_nom_extendable = true;
        store.capital_cost = 2.0;
        store.e_cyclic = true;
        n.add_store("tank", store).unwrap();

        let objective = optimize(&mut n, &SolverOptions::default()).unwrap();
        let results = n.results.as_ref().unwrap();
        // 8 units charged in the first hour deliver 4 units stored
        assert_abs_diff_eq!(results.link_p_nom[0], 8.0, epsilon = TOL);
        assert_abs_diff_eq!(results.store_e_nom[0], 4.0, epsilon = TOL);
        assert_abs_diff_eq!(objective, 8.0 + 2.0 * 4.0, epsilon = TOL);
        assert_abs_diff_eq!(results.link_p1[0][0], 4.0, epsilon = TOL);
        assert_abs_diff_eq!(results.link_p_nom[1], 100.0, epsilon = TOL);
    }

    #[test]
    fn test_results_are_discarded_when_network_changes() {
        let mut n = network(1);
        load(&mut n, vec![1.0]);
        fixed_generator(&mut n, "g", 1.0, 0.0);
        optimize(&mut n, &SolverOptions::default()).unwrap();
        assert!(n.is_solved());
        fixed_generator(&mut n, "h", 1.0, 0.0);
        assert!(!n.is_solved());
    }

    #[test]
    fn test_deserialize_partial_solver_options() {
        let options: SolverOptions =
            serde_json::from_str(r#"{"presolve": true, "time_limit": 10}"#)
                .unwrap();
        assert!(options.presolve);
        assert_eq!(options.time_limit, 10.0);
        assert_eq!(options.solver, "simplex");
        assert_eq!(options.threads, 1);
    }
}
