use crate::error::Result;
use crate::network::Network;

use csv::Writer;
use std::io;
use std::path::Path;

#[derive(serde::Serialize)]
enum ComponentKind {
    Generator,
    Link,
    Store,
}

#[derive(serde::Serialize)]
struct CapacityOutput<'a> {
    kind: ComponentKind,
    name: &'a str,
    extendable: bool,
    nominal: f64,
}

fn write_capacities<W: io::Write>(
    network: &Network,
    wtr: &mut Writer<W>,
) -> Result<()> {
    let results = network.results()?;
    for g in network.generators().iter() {
        wtr.serialize(CapacityOutput {
            kind: ComponentKind::Generator,
            name: &g.name,
            extendable: g.capacity.is_extendable(),
            nominal: results.generator_p_nom[g.id],
        })?;
    }
    for l in network.links().iter() {
        wtr.serialize(CapacityOutput {
            kind: ComponentKind::Link,
            name: &l.name,
            extendable: l.capacity.is_extendable(),
            nominal: results.link_p_nom[l.id],
        })?;
    }
    for s in network.stores().iter() {
        wtr.serialize(CapacityOutput {
            kind: ComponentKind::Store,
            name: &s.name,
            extendable: s.capacity.is_extendable(),
            nominal: results.store_e_nom[s.id],
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct GeneratorOutput<'a> {
    snapshot: String,
    name: &'a str,
    p: f64,
}

fn write_generators<W: io::Write>(
    network: &Network,
    wtr: &mut Writer<W>,
) -> Result<()> {
    let results = network.results()?;
    for t in 0..network.horizon() {
        for g in network.generators().iter() {
            wtr.serialize(GeneratorOutput {
                snapshot: network.snapshots().label(t),
                name: &g.name,
                p: results.generator_p[g.id][t],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct LinkOutput<'a> {
    snapshot: String,
    name: &'a str,
    p0: f64,
    p1: f64,
}

fn write_links<W: io::Write>(
    network: &Network,
    wtr: &mut Writer<W>,
) -> Result<()> {
    let results = network.results()?;
    for t in 0..network.horizon() {
        for l in network.links().iter() {
            wtr.serialize(LinkOutput {
                snapshot: network.snapshots().label(t),
                name: &l.name,
                p0: results.link_p0[l.id][t],
                p1: results.link_p1[l.id][t],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct StoreOutput<'a> {
    snapshot: String,
    name: &'a str,
    charge: f64,
    discharge: f64,
    e: f64,
}

fn write_stores<W: io::Write>(
    network: &Network,
    wtr: &mut Writer<W>,
) -> Result<()> {
    let results = network.results()?;
    for t in 0..network.horizon() {
        for s in network.stores().iter() {
            wtr.serialize(StoreOutput {
                snapshot: network.snapshots().label(t),
                name: &s.name,
                charge: results.store_charge[s.id][t],
                discharge: results.store_discharge[s.id][t],
                e: results.store_e[s.id][t],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct BusOutput<'a> {
    snapshot: String,
    name: &'a str,
    load: f64,
    marginal_price: f64,
}

fn write_buses<W: io::Write>(
    network: &Network,
    wtr: &mut Writer<W>,
) -> Result<()> {
    let results = network.results()?;
    for t in 0..network.horizon() {
        for bus in network.buses().iter() {
            let load = bus
                .load_ids
                .iter()
                .map(|id| network.loads()[*id].p_set.at(t))
                .sum();
            wtr.serialize(BusOutput {
                snapshot: network.snapshots().label(t),
                name: &bus.name,
                load,
                marginal_price: results.bus_marginal_price[bus.id][t],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct SummaryOutput {
    metric: &'static str,
    value: f64,
}

fn write_summary<W: io::Write>(
    network: &Network,
    wtr: &mut Writer<W>,
) -> Result<()> {
    let rows = [
        ("objective", network.objective()?),
        ("total_generation", network.total_generation()?),
        ("total_load", network.total_load()?),
        ("net_loss", network.net_loss()?),
    ];
    for (metric, value) in rows {
        wtr.serialize(SummaryOutput { metric, value })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the results of a solved network as CSV files into `path`
pub fn generate_outputs(network: &Network, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path.join("capacities.csv"))?;
    write_capacities(network, &mut wtr)?;
    let mut wtr = Writer::from_path(path.join("generators.csv"))?;
    write_generators(network, &mut wtr)?;
    let mut wtr = Writer::from_path(path.join("links.csv"))?;
    write_links(network, &mut wtr)?;
    let mut wtr = Writer::from_path(path.join("stores.csv"))?;
    write_stores(network, &mut wtr)?;
    let mut wtr = Writer::from_path(path.join("buses.csv"))?;
    write_buses(network, &mut wtr)?;
    let mut wtr = Writer::from_path(path.join("summary.csv"))?;
    write_summary(network, &mut wtr)?;
    Ok(())
}
