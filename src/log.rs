use crate::error::Result;
use crate::network::Network;
use std::path::Path;
use std::time::Duration;

pub fn show_greeting() {
    println!("\nevflow - v{}", env!("CARGO_PKG_VERSION"));
}

pub fn input_reading_line(path: &Path) {
    println!("\nReading case from {}", path.display());
}

pub fn output_generation_line(path: &Path) {
    println!("\nWriting results to {}", path.display());
}

/// Helper function for displaying the size of the network to be optimized
pub fn network_greeting(network: &Network) {
    println!("\n# Network");
    println!("- Snapshots: {}", network.horizon());
    println!("- Buses: {}", network.buses().len());
    println!("- Generators: {}", network.generators().len());
    println!("- Loads: {}", network.loads().len());
    println!("- Links: {}", network.links().len());
    println!("- Stores: {}", network.stores().len());
}

pub fn optimization_duration(time: Duration) {
    println!(
        "\nOptimization time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    )
}

fn capacity_row(kind: &str, name: &str, extendable: bool, nominal: f64) {
    println!(
        "{0: <10} | {1: <20} | {2: ^10} | {3: >12.4}",
        kind,
        name,
        if extendable { "yes" } else { "no" },
        nominal
    )
}

/// Helper function for displaying the optimal nominal capacity of every
/// component
pub fn capacities_table(network: &Network) -> Result<()> {
    let results = network.results()?;
    println!("\n# Capacities");
    println!(
        "{0: ^10} | {1: ^20} | {2: ^10} | {3: ^12}",
        "kind", "name", "extendable", "nominal"
    );
    println!("{}", "-".repeat(61));
    for g in network.generators().iter() {
        let nominal = results.generator_p_nom[g.id];
        capacity_row("generator", &g.name, g.capacity.is_extendable(), nominal);
    }
    for l in network.links().iter() {
        let nominal = results.link_p_nom[l.id];
        capacity_row("link", &l.name, l.capacity.is_extendable(), nominal);
    }
    for s in network.stores().iter() {
        let nominal = results.store_e_nom[s.id];
        capacity_row("store", &s.name, s.capacity.is_extendable(), nominal);
    }
    Ok(())
}

/// Helper function for displaying one row per snapshot with the dispatch
/// of every generator and link and the state of charge of every store
pub fn dispatch_table(network: &Network) -> Result<()> {
    let results = network.results()?;
    println!("\n# Dispatch");

    let mut header = format!("{0: ^19}", "snapshot");
    for g in network.generators().iter() {
        header.push_str(&format!(" | {0: >12.12}", g.name));
    }
    for l in network.links().iter() {
        header.push_str(&format!(" | {0: >12.12}", l.name));
    }
    for s in network.stores().iter() {
        header.push_str(&format!(" | {0: >12.12}", s.name));
    }
    println!("{}", header);
    println!("{}", "-".repeat(header.len()));

    for t in 0..network.horizon() {
        let mut row = network.snapshots().label(t);
        for g in network.generators().iter() {
            row.push_str(&format!(" | {0: >12.4}", results.generator_p[g.id][t]));
        }
        for l in network.links().iter() {
            row.push_str(&format!(" | {0: >12.4}", results.link_p0[l.id][t]));
        }
        for s in network.stores().iter() {
            row.push_str(&format!(" | {0: >12.4}", results.store_e[s.id][t]));
        }
        println!("{}", row);
    }
    Ok(())
}

pub fn summary(network: &Network) -> Result<()> {
    println!("\n# Summary");
    println!("Objective ($): {:.2}", network.objective()?);
    println!("Generation: {:.4}", network.total_generation()?);
    println!("Load: {:.4}", network.total_load()?);
    println!("Loss: {:.4}", network.net_loss()?);
    Ok(())
}

pub fn show_farewell(time: Duration) {
    println!(
        "\nTotal running time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    )
}
