use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use certstatus::config::Config;
use certstatus::metrics::prom::push_status;
use certstatus::{
    Certificate, Checker, CrlFreshness, HttpFetcher, OutputFormat, Protocol,
};

#[derive(Parser)]
#[command(name = "certstatus", version, author, about = env!("CARGO_PKG_DESCRIPTION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to ./certstatus.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// What to do with a CRL past its next update
    #[arg(long, global = true, value_enum)]
    crl_freshness: Option<CrlFreshness>,

    /// Push the result to a Prometheus Push Gateway
    #[arg(long, global = true)]
    prometheus: bool,

    /// Push Gateway address
    #[arg(long, global = true, value_name = "URL")]
    prometheus_address: Option<String>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the certificate's OCSP responder
    Ocsp {
        /// Certificate file, DER or PEM
        cert: PathBuf,
        /// Issuer certificate; downloaded from the caIssuers URLs when omitted
        #[arg(long, value_name = "PATH")]
        issuer: Option<PathBuf>,
    },
    /// Search the certificate's CRL
    Crl {
        /// Certificate file, DER or PEM
        cert: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("[error] {}", e);
        exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if cli.generate_config {
        println!("{}", Config::example_toml());
        return Ok(());
    }
    let Some(command) = cli.command else {
        return Err("no command given, expected `ocsp` or `crl` (see --help)".into());
    };

    let mut config = Config::default();
    if let Some(file) = Config::discover(cli.config.as_deref())? {
        config = config.merge_with(file);
    }
    let config = config.merge_with(Config::from_cli_args(
        cli.output,
        cli.timeout,
        cli.crl_freshness,
        cli.prometheus.then_some(true),
        cli.prometheus_address,
    ));
    config.validate()?;
    debug!(?config, "effective configuration");

    let fetcher = HttpFetcher::new(config.timeout(), &config.user_agent())?;
    let mut checker =
        Checker::new(fetcher, io::stdout().lock()).with_crl_freshness(config.crl_freshness());

    let status = match command {
        Command::Ocsp { cert, issuer } => {
            let cert = Certificate::from_file(cert)?;
            let issuer = issuer.map(Certificate::from_file).transpose()?;
            checker.check(&cert, Protocol::Ocsp, issuer.as_ref())?
        }
        Command::Crl { cert } => {
            let cert = Certificate::from_file(cert)?;
            checker.check(&cert, Protocol::Crl, None)?
        }
    };

    checker.report(&status, config.output_format()?)?;

    if let Some(address) = config.prometheus_address() {
        push_status(&status, address);
    }
    Ok(())
}
