use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use banksandbox::catalog::Catalog;
use banksandbox::cert::{CertPair, CertPairScanner};
use banksandbox::config::Config;
use banksandbox::error::SandboxError;
use banksandbox::output::{self, OutputFormat};
use banksandbox::{CertSelection, GenerateOptions};

#[derive(Parser)]
#[command(
    name = "banksandbox",
    about = "Generate Windows Sandbox profiles for Korean internet banking",
    version,
    author
)]
struct Cli {
    /// Config file path
    #[arg(long, short = 'c', global = true, default_value = ".banksandbox.toml")]
    config: PathBuf,

    /// Log discovery and staging details
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find NPKI certificate pairs on this machine
    ScanCerts {
        /// Output format (console, json)
        #[arg(long, short = 'f', default_value = "console")]
        format: String,

        /// Search only these folders instead of the usual locations
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,
    },

    /// List the banking services in a catalog
    ListServices {
        /// Service catalog (TOML)
        #[arg(long, env = "BANKSANDBOX_CATALOG")]
        catalog: Option<PathBuf>,

        /// Output format (console, json)
        #[arg(long, short = 'f', default_value = "console")]
        format: String,
    },

    /// Write a sandbox profile and print the path of its .wsb file
    Generate {
        /// Service catalog (TOML)
        #[arg(long, env = "BANKSANDBOX_CATALOG")]
        catalog: Option<PathBuf>,

        /// Service id from the catalog
        #[arg(long, short = 's')]
        service: Option<String>,

        /// Certificate pair number, as listed by scan-certs
        #[arg(long, conflicts_with_all = ["der", "no_cert"])]
        cert: Option<usize>,

        /// Certificate file (DER), used with --key
        #[arg(long, requires = "key", conflicts_with = "no_cert")]
        der: Option<PathBuf>,

        /// Private key file, used with --der
        #[arg(long, requires = "der")]
        key: Option<PathBuf>,

        /// Do not map any certificate
        #[arg(long)]
        no_cert: bool,

        /// Search only these folders for certificates; match the
        /// --dir given to scan-certs so --cert numbers agree
        #[arg(long = "dir", conflicts_with_all = ["der", "no_cert"])]
        dirs: Vec<PathBuf>,

        /// Output directory
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Generate a starter .banksandbox.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::ScanCerts { format, dirs } => cmd_scan_certs(&cli.config, format, dirs),
        Commands::ListServices { catalog, format } => {
            cmd_list_services(&cli.config, catalog, format)
        }
        Commands::Generate {
            catalog,
            service,
            cert,
            der,
            key,
            no_cert,
            dirs,
            output,
        } => {
            let selection = match (cert, der, key, no_cert) {
                (_, _, _, true) => CertSelection::None,
                (Some(index), _, _, _) => CertSelection::Index(index),
                (_, Some(der), Some(key), _) => CertSelection::Files { der, key },
                _ => CertSelection::Auto,
            };
            cmd_generate(&cli.config, catalog, service, selection, dirs, output)
        }
        Commands::Init { force } => cmd_init(&cli.config, force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "banksandbox=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_format(format_str: &str) -> OutputFormat {
    OutputFormat::from_str_lenient(format_str).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", format_str);
        OutputFormat::Console
    })
}

fn load_catalog(config: &Config, catalog: Option<PathBuf>) -> Result<Catalog, SandboxError> {
    let path = catalog
        .or_else(|| config.output.catalog.clone())
        .ok_or_else(|| {
            SandboxError::Config("no catalog given; pass --catalog or set output.catalog".into())
        })?;
    Catalog::load(&path)
}

fn cmd_scan_certs(
    config_path: &Path,
    format_str: String,
    dirs: Vec<PathBuf>,
) -> Result<i32, SandboxError> {
    let format = parse_format(&format_str);
    let config = Config::load(config_path)?;
    let scanner = CertPairScanner::new(&config.scanner).restricted_to(dirs);
    let pairs: Vec<CertPair> = scanner.scan().collect();

    print!("{}", output::render_cert_pairs(&pairs, format)?);
    Ok(0)
}

fn cmd_list_services(
    config_path: &Path,
    catalog: Option<PathBuf>,
    format_str: String,
) -> Result<i32, SandboxError> {
    let format = parse_format(&format_str);
    let config = Config::load(config_path)?;
    let catalog = load_catalog(&config, catalog)?;

    print!("{}", output::render_services(&catalog.services, format)?);
    Ok(0)
}

fn cmd_generate(
    config_path: &Path,
    catalog: Option<PathBuf>,
    service: Option<String>,
    cert: CertSelection,
    dirs: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<i32, SandboxError> {
    let config = Config::load(config_path)?;

    // A profile without a service needs no catalog.
    let catalog = if service.is_none() && catalog.is_none() && config.output.catalog.is_none() {
        Catalog::default()
    } else {
        load_catalog(&config, catalog)?
    };

    let output_dir = output_dir
        .or_else(|| config.output.directory.clone())
        .unwrap_or_else(|| PathBuf::from("banksandbox"));

    let options = GenerateOptions {
        output_dir,
        service_id: service,
        cert,
    };
    let scanner = CertPairScanner::new(&config.scanner).restricted_to(dirs);

    let report = banksandbox::generate(&catalog, &scanner, &options)?;
    for staged in &report.staged_certificates {
        eprintln!("Staged {}", staged.display());
    }
    println!("{}", report.manifest_path.display());
    Ok(0)
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32, SandboxError> {
    if config_path.exists() && !force {
        eprintln!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
        return Ok(1);
    }

    std::fs::write(config_path, Config::starter_toml())
        .map_err(|e| SandboxError::io(config_path, e))?;
    println!("Created {}", config_path.display());

    Ok(0)
}
