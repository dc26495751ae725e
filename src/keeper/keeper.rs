use crate::keeper::context::{BlockInfo, ExecContext, Origin};
use crate::keeper::errors::{FatalFault, KeeperError, TxResult};
use crate::keeper::msgs::{run_pkg_path, Msg, MsgAddPackage, MsgCall, MsgRun};
use crate::state::{Bank, KvBank, PackageStore, RealmState};
use crate::storage::{CacheKvStore, KvStore};
use crate::types::{Address, Coins, MemPackage, PackageKey, ValidationError};
use crate::utils::metrics::METRICS;
use crate::vm::{Env, Vm};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-message view of state. Every write lands in `cache` and reaches the
/// base store only when the message succeeds.
struct Scope {
    cache: Arc<CacheKvStore>,
    store: PackageStore,
    bank: KvBank,
    state: RealmState,
}

impl Scope {
    fn new(base: Arc<dyn KvStore>) -> Self {
        let cache = Arc::new(CacheKvStore::new(base));
        let kv: Arc<dyn KvStore> = cache.clone();
        Self {
            cache,
            store: PackageStore::new(kv.clone()),
            bank: KvBank::new(kv.clone()),
            state: RealmState::new(kv),
        }
    }

    fn env<'a>(&'a self, ctx: &'a mut ExecContext) -> Env<'a> {
        Env { ctx, bank: &self.bank, store: &self.store, state: &self.state }
    }
}

/// Entry point for package deployment, calls and ephemeral runs.
///
/// Messages are handled one at a time against `base`. A message either
/// commits all of its writes or none of them.
pub struct VmKeeper<V: Vm> {
    base: Arc<dyn KvStore>,
    vm: V,
    block: RwLock<BlockInfo>,
}

impl<V: Vm> VmKeeper<V> {
    pub fn new(base: Arc<dyn KvStore>, vm: V) -> Self {
        Self { base, vm, block: RwLock::new(BlockInfo::default()) }
    }

    pub fn vm(&self) -> &V {
        &self.vm
    }

    pub fn begin_block(&self, block: BlockInfo) {
        debug!(chain_id = %block.chain_id, height = block.height, "begin block");
        METRICS.set_gauge("keeper.height", block.height as f64);
        *self.block.write() = block;
    }

    pub fn block(&self) -> BlockInfo {
        self.block.read().clone()
    }

    /// Read-only view of committed packages.
    pub fn package_store(&self) -> PackageStore {
        PackageStore::new(self.base.clone())
    }

    /// Bank over committed state; used for genesis funding and queries.
    pub fn bank(&self) -> KvBank {
        KvBank::new(self.base.clone())
    }

    fn in_scope<T>(
        &self,
        route: &'static str,
        f: impl FnOnce(&Scope) -> Result<T, KeeperError>,
    ) -> Result<T, KeeperError> {
        let scope = Scope::new(self.base.clone());
        match f(&scope) {
            Ok(v) => {
                debug!(route, staged = scope.cache.dirty_len(), "committing message writes");
                scope.cache.write().map_err(FatalFault::Store)?;
                METRICS.inc_counter(&format!("keeper.{}.ok", route));
                Ok(v)
            }
            Err(e) => {
                scope.cache.discard();
                if e.is_fatal() {
                    error!(route, error = %e, "fatal fault, message state discarded");
                    METRICS.inc_counter("keeper.fatal");
                } else {
                    warn!(route, error = %e, "message failed, rolled back");
                    METRICS.inc_counter(&format!("keeper.{}.rollback", route));
                }
                Err(e)
            }
        }
    }

    fn deposit(&self, scope: &Scope, from: &Address, to: &Address, send: &Coins) -> Result<(), KeeperError> {
        if send.is_zero() {
            return Ok(());
        }
        scope.bank.send_coins(from, to, send)?;
        Ok(())
    }

    /// Store a new package and run its `init` with the creator as origin caller.
    pub fn add_package(&self, msg: &MsgAddPackage) -> Result<(), KeeperError> {
        msg.validate_basic()?;
        let pkg = MemPackage::from_files(msg.mod_file.clone(), msg.files.clone())?;
        pkg.validate()?;

        self.in_scope("add_package", |scope| {
            scope.store.add_package(&pkg)?;
            for req in &pkg.mod_file.requires {
                if !scope.store.has_package(&req.path, &req.version)? {
                    return Err(KeeperError::PackageNotFound(PackageKey {
                        path: req.path.clone(),
                        version: req.version.clone(),
                    }));
                }
            }
            let unit = self.vm.preprocess(&pkg)?;

            let origin = Origin {
                caller: msg.creator,
                pkg_addr: Address::derive_pkg_addr(pkg.path()),
                send: Coins::empty(),
            };
            let mut ctx = ExecContext::new(origin, self.block());
            self.vm.initialize(&mut scope.env(&mut ctx), &unit)?;

            info!(pkg = %pkg.key(), creator = %msg.creator, files = pkg.files.len(), "package added");
            Ok(())
        })
    }

    /// Call an exported function. Returns the rendered return values.
    pub fn call(&self, msg: &MsgCall) -> Result<String, KeeperError> {
        msg.validate_basic()?;

        self.in_scope("call", |scope| {
            let pkg = scope.store.get_package(&msg.pkg_path, &msg.version, true)?.ok_or_else(|| {
                KeeperError::PackageNotFound(PackageKey { path: msg.pkg_path.clone(), version: msg.version.clone() })
            })?;
            let unit = self.vm.preprocess(&pkg)?;

            let pkg_addr = Address::derive_pkg_addr(&msg.pkg_path);
            self.deposit(scope, &msg.caller, &pkg_addr, &msg.send)?;

            let origin = Origin { caller: msg.caller, pkg_addr, send: msg.send.clone() };
            let mut ctx = ExecContext::new(origin, self.block());
            let exec = self.vm.execute(&mut scope.env(&mut ctx), &unit, &msg.func, &msg.args)?;

            debug!(pkg = %pkg.key(), func = %msg.func, caller = %msg.caller, send = %msg.send, "call done");
            Ok(exec.result)
        })
    }

    /// Run a throwaway `main` package under the caller's run path.
    /// Returns everything the program printed.
    pub fn run(&self, msg: &MsgRun) -> Result<String, KeeperError> {
        msg.validate_basic()?;
        let path = run_pkg_path(&msg.caller);
        let mut mod_file = msg.mod_file.clone();
        mod_file.import_path = path.clone();
        let pkg = MemPackage::from_files(mod_file, msg.files.clone())?;
        if pkg.name != "main" {
            return Err(ValidationError::NotMainPackage(pkg.name).into());
        }
        pkg.validate()?;

        self.in_scope("run", |scope| {
            let unit = self.vm.preprocess(&pkg)?;

            let pkg_addr = Address::derive_pkg_addr(&path);
            self.deposit(scope, &msg.caller, &pkg_addr, &msg.send)?;

            let origin = Origin { caller: msg.caller, pkg_addr, send: msg.send.clone() };
            let mut ctx = ExecContext::new(origin, self.block());
            let mut env = scope.env(&mut ctx);
            let init = self.vm.initialize(&mut env, &unit)?;
            let main = self.vm.execute(&mut env, &unit, "main", &[])?;

            debug!(path = %path, caller = %msg.caller, "run done");
            Ok(init.output + &main.output)
        })
    }

    /// Dispatch a message. Recoverable failures become a failed
    /// `TxResult`; fatal faults are returned as `Err`.
    pub fn deliver(&self, msg: &Msg) -> Result<TxResult, FatalFault> {
        let route = msg.route();
        METRICS.inc_counter(&format!("keeper.{}.delivered", route));
        let res = match msg {
            Msg::AddPackage(m) => self.add_package(m).map(|_| String::new()),
            Msg::Call(m) => self.call(m),
            Msg::Run(m) => self.run(m),
        };
        debug!(route, ok = res.is_ok(), "delivered");
        match res {
            Ok(data) => Ok(TxResult::ok(data)),
            Err(KeeperError::Fatal(f)) => Err(f),
            Err(e) => Ok(TxResult::err(&e)),
        }
    }
}
