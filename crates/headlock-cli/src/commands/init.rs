//! `headlock init`: write the demo topology configuration file.

use clap::Args;
use std::path::PathBuf;

use crate::demo::demo_config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the topology file.
    #[arg(default_value = "headlock.toml")]
    pub path: PathBuf,
}

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    if args.path.exists() {
        anyhow::bail!("topology file already exists at {}", args.path.display());
    }

    demo_config().save(&args.path)?;

    println!("Wrote demo topology to {}", args.path.display());
    println!("Inspect the payment paths with 'headlock paths'.");
    println!("Send a payment with 'headlock send'.");
    Ok(())
}
