//! PAJ command - Petroleum Association of Japan weekly inventory tables.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use super::{load_config, write_table, OutputArgs};
use crate::net::HttpClient;
use crate::paj::{self, CRUDE, PRODUCTS};

/// Arguments for the paj command.
#[derive(Args, Debug)]
pub struct PajArgs {
    /// Read a saved statistics page instead of fetching it
    #[arg(long)]
    html: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

pub async fn run(args: PajArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let html = match &args.html {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let http = HttpClient::new(&config.fetch)?;
            paj::fetch_tables_page(&http, &config.sources).await?
        }
    };

    let tables = paj::parse_tables(&html);
    println!("{} Found {} tables", style("ℹ").blue(), tables.len());

    for shape in [CRUDE, PRODUCTS] {
        let table = shape.apply(&tables)?;
        write_table(&table, shape.stem, &args.output, &config)?;
    }
    Ok(())
}
