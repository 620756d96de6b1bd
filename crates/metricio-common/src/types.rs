//! Core types for MetricIO
//!
//! Metric kinds, comparison operators, locator types, and the query
//! predicate shared by the wire protocol and the storage engine.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Timestamp sentinel meaning "now": the server substitutes its own clock
/// for an Add carrying it, and a query window with `end == TIME_NOW` has no
/// upper bound.
pub const TIME_NOW: u64 = 0;

/// Metric category a table stores and a query targets.
///
/// Discriminants are wire values; 0 is reserved for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetricKind {
    /// Free storage capacity
    Storage = 1,
    /// CPU load average
    CpuLoad = 2,
    /// Network traffic volume
    Traffic = 3,
    /// Round-trip time
    Rtt = 4,
    /// Route hop count
    HopCount = 5,
    /// BGP AS-path length
    AsPathLen = 6,
    /// Associated WLAN station count
    WlanAssoc = 7,
}

impl MetricKind {
    /// All kinds, in wire-discriminant order
    pub const ALL: [Self; 7] = [
        Self::Storage,
        Self::CpuLoad,
        Self::Traffic,
        Self::Rtt,
        Self::HopCount,
        Self::AsPathLen,
        Self::WlanAssoc,
    ];

    /// Decode a wire discriminant
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Storage),
            2 => Some(Self::CpuLoad),
            3 => Some(Self::Traffic),
            4 => Some(Self::Rtt),
            5 => Some(Self::HopCount),
            6 => Some(Self::AsPathLen),
            7 => Some(Self::WlanAssoc),
            _ => None,
        }
    }

    /// Canonical name, also the on-disk table file name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::CpuLoad => "cpu",
            Self::Traffic => "traffic",
            Self::Rtt => "rtt",
            Self::HopCount => "hopcount",
            Self::AsPathLen => "aspathlen",
            Self::WlanAssoc => "wlanassoc",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "storage" | "hdd" => Ok(Self::Storage),
            "cpu" | "load" => Ok(Self::CpuLoad),
            "traffic" => Ok(Self::Traffic),
            "rtt" => Ok(Self::Rtt),
            "hopcount" | "ttl" => Ok(Self::HopCount),
            "aspathlen" => Ok(Self::AsPathLen),
            "wlanassoc" => Ok(Self::WlanAssoc),
            _ => Err(Error::invalid(format!("unknown metric kind: {s}"))),
        }
    }
}

/// Comparison operator of a query predicate.
///
/// Discriminants are wire values; 0 is reserved for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompareOp {
    Lt = 1,
    Le = 2,
    Eq = 3,
    Gt = 4,
    Ge = 5,
}

impl CompareOp {
    /// Decode a wire discriminant
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Lt),
            2 => Some(Self::Le),
            3 => Some(Self::Eq),
            4 => Some(Self::Gt),
            5 => Some(Self::Ge),
            _ => None,
        }
    }

    /// Canonical symbol
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Apply the operator with the observed value on the left
    #[must_use]
    pub const fn matches(self, observed: u64, wanted: u64) -> bool {
        match self {
            Self::Lt => observed < wanted,
            Self::Le => observed <= wanted,
            Self::Eq => observed == wanted,
            Self::Gt => observed > wanted,
            Self::Ge => observed >= wanted,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for CompareOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "le" => Ok(Self::Le),
            "=" | "==" | "eq" => Ok(Self::Eq),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "ge" => Ok(Self::Ge),
            _ => Err(Error::invalid(format!("unknown operator: {s}"))),
        }
    }
}

/// Form of the locator strings a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LocatorType {
    /// Domain name
    Domain = 1,
    /// URI
    Uri = 2,
}

impl LocatorType {
    /// Decode a wire discriminant
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Domain),
            2 => Some(Self::Uri),
            _ => None,
        }
    }

    /// Canonical name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Uri => "uri",
        }
    }
}

impl fmt::Display for LocatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LocatorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain" => Ok(Self::Domain),
            "uri" => Ok(Self::Uri),
            _ => Err(Error::invalid(format!("unknown locator type: {s}"))),
        }
    }
}

/// Value/time predicate a search evaluates against every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predicate {
    /// Metric table to scan
    pub kind: MetricKind,
    /// Comparison operator
    pub op: CompareOp,
    /// Comparison value, observed value on the left
    pub value: u64,
    /// Window start, inclusive
    pub start: u64,
    /// Window end, inclusive; [`TIME_NOW`] means unbounded
    pub end: u64,
}

impl Predicate {
    /// Check a record timestamp against the time window
    #[must_use]
    pub const fn matches_time(&self, t: u64) -> bool {
        if t < self.start {
            return false;
        }
        if self.end != TIME_NOW && t > self.end {
            return false;
        }
        true
    }

    /// Check an observed value against the operator and comparison value
    #[must_use]
    pub const fn matches_value(&self, v: u64) -> bool {
        self.op.matches(v, self.value)
    }
}
