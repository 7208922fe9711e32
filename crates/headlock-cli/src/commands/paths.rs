//! `headlock paths`: list the configured payment paths of a topology.

use clap::Args;
use std::path::PathBuf;

use headlock_topology::Topology;

use crate::demo::demo_config;

#[derive(Args, Debug)]
pub struct PathsArgs {
    /// Path to the topology file (TOML).
    #[arg(short, long, default_value = "headlock.toml")]
    pub config: PathBuf,

    /// Use the built-in demo topology instead of a file.
    #[arg(long)]
    pub demo: bool,
}

pub fn run(args: &PathsArgs) -> anyhow::Result<()> {
    let topology = if args.demo {
        Topology::from_config(demo_config())?
    } else {
        Topology::load(&args.config)?
    };

    println!("Topology '{}'", topology.id());
    for head in topology.heads() {
        println!(
            "  {} ({}): {} participants",
            head.id,
            head.name,
            head.participants.len()
        );
    }

    println!();
    println!("Payment paths:");
    for (from, to, steps) in topology.routes() {
        println!("  {} -> {} ({} hops)", from, to, steps.len());
        for (index, step) in steps.iter().enumerate() {
            let marker = if topology.is_automated_step(step) {
                " [automated]"
            } else {
                ""
            };
            println!("    {}. {}{}", index + 1, step, marker);
        }
    }
    Ok(())
}
