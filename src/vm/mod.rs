//! VM seam: what the keeper needs from a language virtual machine.
//!
//! Exposes:
//! - Vm: compile a package (`preprocess`), run its `init`, execute an entry point
//! - Env: the per-message handles a VM executes against
//! - VmFault / FaultKind: tagged fault, fatal vs recoverable
//! - TypedValue: returned values and their textual rendering
//! - NativeVm: reference VM whose function bodies are host-bound closures

pub mod fault;
pub mod native;
pub mod value;

pub use fault::{FaultKind, VmFault};
pub use native::{FuncDecl, Machine, NativeFn, NativeUnit, NativeVm};
pub use value::{render_values, TypedValue};

use crate::keeper::context::ExecContext;
use crate::state::{Bank, PackageStore, RealmState};
use crate::types::MemPackage;

/// Handles for one message execution. The context is exclusively borrowed
/// so nothing else can observe or mutate it while the VM runs.
pub struct Env<'a> {
    pub ctx: &'a mut ExecContext,
    pub bank: &'a dyn Bank,
    pub store: &'a PackageStore,
    pub state: &'a RealmState,
}

/// Outcome of a successful execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// rendered return values
    pub result: String,
    /// everything the program printed
    pub output: String,
}

pub trait Vm: Send + Sync {
    /// Compiled form of a package.
    type Unit;

    fn preprocess(&self, pkg: &MemPackage) -> Result<Self::Unit, VmFault>;

    /// Run package initialization. Called once on deploy, and before `main` for ephemeral runs.
    fn initialize(&self, env: &mut Env<'_>, unit: &Self::Unit) -> Result<Execution, VmFault>;

    /// Execute `entry` with string arguments. The VM checks the declared
    /// arity and reports a mismatch as a fatal fault.
    fn execute(
        &self,
        env: &mut Env<'_>,
        unit: &Self::Unit,
        entry: &str,
        args: &[String],
    ) -> Result<Execution, VmFault>;
}
