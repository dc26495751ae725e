//! Per-message execution context.
//!
//! The origin (caller, package address, attached coins) is fixed when the
//! context is built. The realm stack changes as execution enters and
//! leaves realm packages; frames are pushed through `RealmGuard`, which
//! pops on drop so every exit path (return, fault, panic) unwinds the
//! stack in LIFO order.

use crate::types::{Address, Coins};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Block-level facts visible to contract code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub chain_id: String,
    pub height: u64,
}

impl Default for BlockInfo {
    fn default() -> Self {
        Self { chain_id: "dev".into(), height: 0 }
    }
}

/// Immutable snapshot of who started the message and with what funds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub caller: Address,
    pub pkg_addr: Address,
    pub send: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmFrame {
    pub pkg_addr: Address,
    pub pkg_path: String,
}

impl RealmFrame {
    pub fn new(pkg_path: impl Into<String>) -> Self {
        let pkg_path = pkg_path.into();
        Self { pkg_addr: Address::derive_pkg_addr(&pkg_path), pkg_path }
    }
}

#[derive(Debug)]
pub struct ExecContext {
    origin: Origin,
    block: BlockInfo,
    /// what is left of `origin.send` for the origin-send banker
    orig_send_remaining: Coins,
    realms: Vec<RealmFrame>,
}

impl ExecContext {
    pub fn new(origin: Origin, block: BlockInfo) -> Self {
        let orig_send_remaining = origin.send.clone();
        Self { origin, block, orig_send_remaining, realms: Vec::new() }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn orig_caller(&self) -> Address {
        self.origin.caller
    }

    pub fn orig_pkg_addr(&self) -> Address {
        self.origin.pkg_addr
    }

    pub fn orig_send(&self) -> &Coins {
        &self.origin.send
    }

    pub fn block(&self) -> &BlockInfo {
        &self.block
    }

    pub fn orig_send_remaining(&self) -> &Coins {
        &self.orig_send_remaining
    }

    pub(crate) fn set_orig_send_remaining(&mut self, remaining: Coins) {
        self.orig_send_remaining = remaining;
    }

    /// Top of the realm stack.
    pub fn current_realm(&self) -> Option<&RealmFrame> {
        self.realms.last()
    }

    /// The realm that called into the current one, if any.
    pub fn previous_realm(&self) -> Option<&RealmFrame> {
        let n = self.realms.len();
        if n < 2 {
            None
        } else {
            self.realms.get(n - 2)
        }
    }

    pub fn realm_depth(&self) -> usize {
        self.realms.len()
    }

    /// Enter a realm. The frame stays on the stack for the guard's lifetime.
    pub fn push_realm(&mut self, frame: RealmFrame) -> RealmGuard<'_> {
        tracing::trace!(pkg_path = %frame.pkg_path, depth = self.realms.len() + 1, "push realm");
        self.realms.push(frame);
        RealmGuard { ctx: self }
    }
}

/// Scoped realm frame; derefs to the context and pops the frame on drop.
pub struct RealmGuard<'a> {
    ctx: &'a mut ExecContext,
}

impl Deref for RealmGuard<'_> {
    type Target = ExecContext;

    fn deref(&self) -> &ExecContext {
        self.ctx
    }
}

impl DerefMut for RealmGuard<'_> {
    fn deref_mut(&mut self) -> &mut ExecContext {
        self.ctx
    }
}

impl Drop for RealmGuard<'_> {
    fn drop(&mut self) {
        let popped = self.ctx.realms.pop();
        tracing::trace!(pkg_path = ?popped.map(|f| f.pkg_path), "pop realm");
    }
}
