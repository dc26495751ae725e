use crate::types::{Address, Coins};
use std::fmt;

/// A value returned from contract code, rendered as `(<value> <type>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    String(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
    Address(Address),
    Coins(Coins),
}

impl TypedValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::String(_) => "string",
            TypedValue::Int(_) => "int",
            TypedValue::Uint(_) => "uint64",
            TypedValue::Bool(_) => "bool",
            TypedValue::Address(_) => "std.Address",
            TypedValue::Coins(_) => "std.Coins",
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => write!(f, "({:?} {})", s, self.type_name()),
            TypedValue::Int(v) => write!(f, "({} {})", v, self.type_name()),
            TypedValue::Uint(v) => write!(f, "({} {})", v, self.type_name()),
            TypedValue::Bool(v) => write!(f, "({} {})", v, self.type_name()),
            TypedValue::Address(a) => write!(f, "({:?} {})", a.to_string(), self.type_name()),
            TypedValue::Coins(c) => write!(f, "({:?} {})", c.to_string(), self.type_name()),
        }
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

/// One value per line, in return order.
pub fn render_values(values: &[TypedValue]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\n")
}
