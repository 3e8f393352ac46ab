use std::net::Ipv4Addr;

use cinema_engine::{Catalog, Engine};
use cinema_server::{Opts, Server};
use eyre::{Result, WrapErr};
use tracing::info;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::from_args(std::env::args().skip(1))?;
    let catalog = Catalog::load(&opts.catalog)
        .wrap_err_with(|| format!("invalid catalog file {}", opts.catalog.display()))?;
    let engine = Engine::new(catalog, opts.timeout);

    let mut server = Server::bind((Ipv4Addr::UNSPECIFIED, opts.port), engine)?;
    info!(port = opts.port, timeout = opts.timeout, "listening");

    match server.run()? {}
}
