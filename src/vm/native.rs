//! Native VM: package sources supply declarations, the host supplies bodies.
//!
//! `preprocess` scans each source file for top-level `func Name(params)`
//! declarations to learn which entry points exist and their arity. Bodies
//! are Rust closures bound per `(pkg_path, func)` with `NativeVm::bind`.
//! Closures receive a `Machine`, which exposes the origin accessors, the
//! bankers, realm state, printing and cross-package calls.
//!
//! Each name binds exactly one body, so a package may declare at most one
//! `init`; a second one is rejected at preprocess time.

use crate::keeper::banker::{Banker, BankerKind};
use crate::keeper::context::{BlockInfo, ExecContext, RealmFrame};
use crate::state::{Bank, PackageStore, RealmState};
use crate::types::{is_realm_path, Address, Coins, MemPackage};
use crate::vm::fault::VmFault;
use crate::vm::value::{render_values, TypedValue};
use crate::vm::{Env, Execution, Vm};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

lazy_static! {
    static ref RE_FUNC_HEAD: Regex =
        Regex::new(r"(?m)^func\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("func decl regex");
}

pub type NativeFn = Arc<dyn Fn(&mut Machine<'_>, &[String]) -> Result<Vec<TypedValue>, VmFault> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub params: usize,
    pub file: String,
}

#[derive(Debug, Clone)]
pub struct NativeUnit {
    pub pkg_path: String,
    pub pkg_name: String,
    pub funcs: BTreeMap<String, FuncDecl>,
}

impl NativeUnit {
    pub fn func(&self, name: &str) -> Option<&FuncDecl> {
        self.funcs.get(name)
    }
}

#[derive(Clone, Copy)]
struct Host<'a> {
    bank: &'a dyn Bank,
    store: &'a PackageStore,
    state: &'a RealmState,
}

#[derive(Default)]
pub struct NativeVm {
    bindings: RwLock<HashMap<(String, String), NativeFn>>,
}

impl NativeVm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the body of `pkg_path.func`. Rebinding replaces the old body.
    pub fn bind<F>(&self, pkg_path: &str, func: &str, f: F)
    where
        F: Fn(&mut Machine<'_>, &[String]) -> Result<Vec<TypedValue>, VmFault> + Send + Sync + 'static,
    {
        self.bindings.write().insert((pkg_path.to_string(), func.to_string()), Arc::new(f));
    }

    fn binding(&self, pkg_path: &str, func: &str) -> Option<NativeFn> {
        // cloned out so the lock is not held while contract code runs
        self.bindings.read().get(&(pkg_path.to_string(), func.to_string())).cloned()
    }

    fn invoke(
        &self,
        ctx: &mut ExecContext,
        host: Host<'_>,
        unit: &NativeUnit,
        func: &str,
        args: &[String],
        output: &mut String,
    ) -> Result<Vec<TypedValue>, VmFault> {
        let decl = unit.func(func).ok_or_else(|| {
            VmFault::recoverable(format!("function {} not declared in package {}", func, unit.pkg_path))
        })?;
        if decl.params != args.len() {
            return Err(VmFault::arity(func, decl.params, args.len()));
        }
        let body = self
            .binding(&unit.pkg_path, func)
            .ok_or_else(|| VmFault::fatal(format!("no native body bound for {}.{}", unit.pkg_path, func)))?;

        if is_realm_path(&unit.pkg_path) {
            let mut guard = ctx.push_realm(RealmFrame::new(unit.pkg_path.clone()));
            let mut m = Machine { vm: self, ctx: &mut *guard, host, pkg_path: &unit.pkg_path, output };
            body(&mut m, args)
        } else {
            // library packages run inside the caller's realm
            let mut m = Machine { vm: self, ctx, host, pkg_path: &unit.pkg_path, output };
            body(&mut m, args)
        }
    }
}

/// Text between the `(` at `open` and its matching `)`.
fn param_list(body: &str, open: usize) -> Option<&str> {
    let mut depth = 0usize;
    for (i, c) in body[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Number of parameters; commas inside nested types such as
/// `func(a, b int)` or `map[K]V` do not count.
fn count_params(list: &str) -> usize {
    if list.trim().is_empty() {
        return 0;
    }
    let mut depth = 0i32;
    let mut params = 1;
    for c in list.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => params += 1,
            _ => {}
        }
    }
    params
}

impl Vm for NativeVm {
    type Unit = NativeUnit;

    fn preprocess(&self, pkg: &MemPackage) -> Result<NativeUnit, VmFault> {
        let mut funcs: BTreeMap<String, FuncDecl> = BTreeMap::new();
        let mut sources = 0usize;
        for file in pkg.source_files() {
            sources += 1;
            for caps in RE_FUNC_HEAD.captures_iter(&file.body) {
                let name = caps[1].to_string();
                let open = caps.get(0).map(|m| m.end() - 1).unwrap_or_default();
                let list = param_list(&file.body, open).ok_or_else(|| {
                    VmFault::fatal(format!("{}:{}: unterminated parameter list of {}", pkg.path(), file.name, name))
                })?;
                let params = count_params(list);
                if (name == "init" || name == "main") && params != 0 {
                    return Err(VmFault::fatal(format!("{}:{}: func {} must have no arguments", pkg.path(), file.name, name)));
                }
                // one body is bound per name, so init is unique here too
                if funcs.contains_key(&name) {
                    return Err(VmFault::fatal(format!("{}:{}: {} redeclared in this block", pkg.path(), file.name, name)));
                }
                funcs.insert(name.clone(), FuncDecl { name, params, file: file.name.clone() });
            }
        }
        if sources == 0 {
            return Err(VmFault::fatal(format!("no source files in package {}", pkg.path())));
        }
        Ok(NativeUnit { pkg_path: pkg.path().to_string(), pkg_name: pkg.name.clone(), funcs })
    }

    fn initialize(&self, env: &mut Env<'_>, unit: &NativeUnit) -> Result<Execution, VmFault> {
        // an init with no bound body is an empty init
        if unit.func("init").is_none() || self.binding(&unit.pkg_path, "init").is_none() {
            return Ok(Execution::default());
        }
        self.execute(env, unit, "init", &[])
    }

    fn execute(&self, env: &mut Env<'_>, unit: &NativeUnit, entry: &str, args: &[String]) -> Result<Execution, VmFault> {
        let host = Host { bank: env.bank, store: env.store, state: env.state };
        let mut output = String::new();
        let values = self.invoke(&mut *env.ctx, host, unit, entry, args, &mut output)?;
        Ok(Execution { result: render_values(&values), output })
    }
}

/// What a native body sees while it runs.
pub struct Machine<'a> {
    vm: &'a NativeVm,
    ctx: &'a mut ExecContext,
    host: Host<'a>,
    pkg_path: &'a str,
    output: &'a mut String,
}

impl<'a> Machine<'a> {
    pub fn orig_caller(&self) -> Address {
        self.ctx.orig_caller()
    }

    pub fn orig_pkg_addr(&self) -> Address {
        self.ctx.orig_pkg_addr()
    }

    pub fn orig_send(&self) -> Coins {
        self.ctx.orig_send().clone()
    }

    pub fn current_realm(&self) -> Option<&RealmFrame> {
        self.ctx.current_realm()
    }

    pub fn previous_realm(&self) -> Option<&RealmFrame> {
        self.ctx.previous_realm()
    }

    /// Path of the package whose code is running.
    pub fn pkg_path(&self) -> &str {
        self.pkg_path
    }

    pub fn block(&self) -> &BlockInfo {
        self.ctx.block()
    }

    pub fn banker(&mut self, kind: BankerKind) -> Banker<'_> {
        Banker::new(kind, &mut *self.ctx, self.host.bank)
    }

    pub fn print(&mut self, s: &str) {
        self.output.push_str(s);
    }

    pub fn println(&mut self, s: &str) {
        self.output.push_str(s);
        self.output.push('\n');
    }

    pub fn get_state(&self, key: &str) -> Result<Option<String>, VmFault> {
        let raw = self
            .host
            .state
            .get(self.pkg_path, key)
            .map_err(|e| VmFault::fatal(format!("realm state read: {}", e)))?;
        raw.map(|bytes| String::from_utf8(bytes).map_err(|e| VmFault::fatal(format!("realm state decode: {}", e))))
            .transpose()
    }

    pub fn set_state(&mut self, key: &str, value: &str) -> Result<(), VmFault> {
        self.host
            .state
            .set(self.pkg_path, key, value.as_bytes())
            .map_err(|e| VmFault::fatal(format!("realm state write: {}", e)))
    }

    pub fn delete_state(&mut self, key: &str) -> Result<(), VmFault> {
        self.host
            .state
            .delete(self.pkg_path, key)
            .map_err(|e| VmFault::fatal(format!("realm state write: {}", e)))
    }

    /// Call into another stored package, entering its realm if it is one.
    pub fn call(&mut self, pkg_path: &str, version: &str, func: &str, args: &[String]) -> Result<Vec<TypedValue>, VmFault> {
        let pkg = self
            .host
            .store
            .get_package(pkg_path, version, true)
            .map_err(|e| VmFault::fatal(e.to_string()))?
            .ok_or_else(|| VmFault::recoverable(format!("package not found: {}@{}", pkg_path, version)))?;
        let unit = self.vm.preprocess(&pkg)?;
        self.vm.invoke(&mut *self.ctx, self.host, &unit, func, args, &mut *self.output)
    }
}
