//! Transaction messages handled by the keeper.

use crate::types::{validate_pkg_path, Address, Coins, MemFile, MemMod, ValidationError, REALM_PATH_PREFIX};
use serde::{Deserialize, Serialize};

/// Deploy a package; stored under `(mod_file.import_path, mod_file.version)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddPackage {
    pub creator: Address,
    pub mod_file: MemMod,
    pub files: Vec<MemFile>,
}

impl MsgAddPackage {
    pub fn new(creator: Address, mod_file: MemMod, files: Vec<MemFile>) -> Self {
        Self { creator, mod_file, files }
    }

    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.creator.is_zero() {
            return Err(ValidationError::ZeroAddress("creator"));
        }
        validate_pkg_path(&self.mod_file.import_path)?;
        if self.files.is_empty() {
            return Err(ValidationError::NoFiles(self.mod_file.import_path.clone()));
        }
        Ok(())
    }
}

/// Call an exported function of a stored package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCall {
    pub caller: Address,
    #[serde(default)]
    pub send: Coins,
    pub pkg_path: String,
    pub version: String,
    pub func: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl MsgCall {
    pub fn new(
        caller: Address,
        send: Coins,
        pkg_path: impl Into<String>,
        version: impl Into<String>,
        func: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            caller,
            send,
            pkg_path: pkg_path.into(),
            version: version.into(),
            func: func.into(),
            args,
        }
    }

    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.caller.is_zero() {
            return Err(ValidationError::ZeroAddress("caller"));
        }
        validate_pkg_path(&self.pkg_path)?;
        if self.func.is_empty() {
            return Err(ValidationError::EmptyFunc);
        }
        Ok(())
    }
}

/// Compile and run a throwaway `main` package; nothing is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRun {
    pub caller: Address,
    #[serde(default)]
    pub send: Coins,
    pub mod_file: MemMod,
    pub files: Vec<MemFile>,
}

impl MsgRun {
    pub fn new(caller: Address, send: Coins, mod_file: MemMod, files: Vec<MemFile>) -> Self {
        Self { caller, send, mod_file, files }
    }

    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.caller.is_zero() {
            return Err(ValidationError::ZeroAddress("caller"));
        }
        if self.files.is_empty() {
            return Err(ValidationError::NoFiles(run_pkg_path(&self.caller)));
        }
        Ok(())
    }
}

/// Ephemeral path a Run executes under, unique per caller.
pub fn run_pkg_path(caller: &Address) -> String {
    format!("{}run_{}", REALM_PATH_PREFIX, caller)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Msg {
    AddPackage(MsgAddPackage),
    Call(MsgCall),
    Run(MsgRun),
}

impl Msg {
    pub fn route(&self) -> &'static str {
        match self {
            Msg::AddPackage(_) => "add_package",
            Msg::Call(_) => "call",
            Msg::Run(_) => "run",
        }
    }
}
