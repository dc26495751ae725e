use crate::config::KeeperConfig;
use crate::keeper::{BlockInfo, Msg, MsgAddPackage, VmKeeper};
use crate::state::Bank;
use crate::storage::{self, StorageEngine};
use crate::types::{Address, Coins, MemFile, MemMod, MemPackage};
use crate::utils::init_logging;
use crate::vm::NativeVm;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// CLI for inspecting and loading the package store.
#[derive(Parser)]
#[clap(name = "vmkeeper", version)]
pub struct Cli {
    /// Path to a TOML config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Path to data directory (overrides config)
    #[clap(long)]
    pub data_dir: Option<PathBuf>,

    /// Storage engine (overrides config)
    #[clap(long, value_enum)]
    pub engine: Option<StorageEngine>,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Check a package directory without storing it
    Validate {
        #[clap(long)]
        dir: PathBuf,
        #[clap(long)]
        pkgpath: String,
        #[clap(long, default_value = "v0.0.0")]
        version: String,
    },
    /// Deploy a package directory
    AddPkg {
        #[clap(long)]
        dir: PathBuf,
        #[clap(long)]
        pkgpath: String,
        #[clap(long, default_value = "v0.0.0")]
        version: String,
        #[clap(long)]
        creator: Address,
    },
    /// Print a stored package
    Show {
        #[clap(long)]
        pkgpath: String,
        #[clap(long, default_value = "v0.0.0")]
        version: String,
        /// include file bodies
        #[clap(long)]
        files: bool,
    },
    /// List every stored package
    List,
    /// List stored versions of one path
    Versions {
        #[clap(long)]
        pkgpath: String,
    },
    /// Print the balance of an address
    Balance {
        #[clap(long)]
        addr: Address,
    },
    /// Credit coins to an address (dev genesis)
    Fund {
        #[clap(long)]
        addr: Address,
        #[clap(long)]
        coins: Coins,
    },
}

#[derive(Serialize)]
struct PackageSummary<'a> {
    name: &'a str,
    path: &'a str,
    version: &'a str,
    files: Vec<&'a str>,
}

impl<'a> From<&'a MemPackage> for PackageSummary<'a> {
    fn from(pkg: &'a MemPackage) -> Self {
        Self {
            name: &pkg.name,
            path: pkg.path(),
            version: pkg.version(),
            files: pkg.files.iter().map(|f| f.name.as_str()).collect(),
        }
    }
}

fn is_package_file(name: &str) -> bool {
    name.ends_with(".gno") || name == "LICENSE" || name.starts_with("README")
}

/// Read a package directory: `.gno` files plus LICENSE/README, sorted by name.
pub fn read_package_dir(dir: &Path, pkgpath: &str, version: &str) -> Result<MemPackage> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_package_file(&name) {
            continue;
        }
        let body = fs::read_to_string(entry.path()).with_context(|| format!("reading {}", entry.path().display()))?;
        files.push(MemFile::new(name, body));
    }
    if files.is_empty() {
        bail!("no package files in {}", dir.display());
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(MemPackage::from_files(MemMod::new(pkgpath, version), files)?)
}

fn print_json<T: Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => KeeperConfig::load(path)?,
        None => KeeperConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(engine) = cli.engine {
        cfg.engine = engine;
    }
    init_logging(&cfg.log_filter);

    if let Cmd::Validate { dir, pkgpath, version } = &cli.cmd {
        let pkg = read_package_dir(dir, pkgpath, version)?;
        pkg.validate()?;
        return print_json(&PackageSummary::from(&pkg));
    }

    let kv = storage::open(&cfg.data_dir, cfg.engine)?;
    let keeper = VmKeeper::new(kv, NativeVm::new());
    keeper.begin_block(BlockInfo { chain_id: cfg.chain_id.clone(), height: 0 });
    info!(data_dir = %cfg.data_dir.display(), engine = ?cfg.engine, "store opened");

    match cli.cmd {
        Cmd::Validate { .. } => Ok(()),
        Cmd::AddPkg { dir, pkgpath, version, creator } => {
            let pkg = read_package_dir(&dir, &pkgpath, &version)?;
            let msg = Msg::AddPackage(MsgAddPackage::new(creator, pkg.mod_file, pkg.files));
            let res = keeper.deliver(&msg)?;
            print_json(&res)
        }
        Cmd::Show { pkgpath, version, files } => {
            let store = keeper.package_store();
            match store.get_package(&pkgpath, &version, files)? {
                Some(pkg) if files => print_json(&pkg),
                Some(pkg) => print_json(&PackageSummary::from(&pkg)),
                None => bail!("package not found: {}@{}", pkgpath, version),
            }
        }
        Cmd::List => print_json(&keeper.package_store().list()?),
        Cmd::Versions { pkgpath } => match keeper.package_store().package_info(&pkgpath)? {
            Some(info) => print_json(&info),
            None => bail!("package not found: {}", pkgpath),
        },
        Cmd::Balance { addr } => {
            let coins = keeper.bank().get_coins(&addr)?;
            print_json(&serde_json::json!({ "address": addr, "coins": coins }))
        }
        Cmd::Fund { addr, coins } => {
            let bank = keeper.bank();
            let total = bank.get_coins(&addr)?.add(&coins)?;
            bank.set_coins(&addr, &total)?;
            info!(addr = %addr, added = %coins, "funded");
            print_json(&serde_json::json!({ "address": addr, "coins": total }))
        }
    }
}
