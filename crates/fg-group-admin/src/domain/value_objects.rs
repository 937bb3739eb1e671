//! # Domain Value Objects
//!
//! Validated identifiers. Each type can only be constructed through its
//! parser, including when deserialized from the mutation log.

use super::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the group every unassigned server and unbound table belongs to.
pub const DEFAULT_GROUP: &str = "default";

/// Namespace of a table given without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Maximum group name length in bytes.
pub const MAX_GROUP_NAME_LEN: usize = 128;

/// Group name. Case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
    /// Parse and validate a group name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let invalid = |reason: &str| ValidationError::InvalidName {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.len() > MAX_GROUP_NAME_LEN {
            return Err(invalid("name exceeds 128 bytes"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(invalid(&format!("character {c:?} is not allowed")));
        }

        Ok(Self(name))
    }

    /// The default group.
    pub fn default_group() -> Self {
        Self(DEFAULT_GROUP.to_string())
    }

    /// Whether this is the default group.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_GROUP
    }

    /// Name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GroupName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupName> for String {
    fn from(name: GroupName) -> Self {
        name.0
    }
}

/// Server address, `host:port`.
///
/// The port is split off at the last `:` so bracketed IPv6 hosts parse.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    host: String,
    port: u16,
}

impl NodeId {
    /// Parse a `host:port` address.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidServer {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if host.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("host contains whitespace"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port is not a number in 0..=65535"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl TryFrom<String> for NodeId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(node: NodeId) -> Self {
        node.to_string()
    }
}

/// Namespace-qualified table name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShardId {
    namespace: String,
    qualifier: String,
}

impl ShardId {
    /// Parse `namespace:qualifier` or a bare `qualifier`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidTable {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (namespace, qualifier) = match input.split_once(':') {
            Some((ns, q)) => (ns, q),
            None => (DEFAULT_NAMESPACE, input),
        };

        if namespace.is_empty() {
            return Err(invalid("namespace is empty"));
        }
        if qualifier.is_empty() {
            return Err(invalid("qualifier is empty"));
        }
        if input.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("name contains whitespace"));
        }
        if qualifier.contains(':') {
            return Err(invalid("more than one namespace separator"));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            qualifier: qualifier.to_string(),
        })
    }

    /// Namespace part.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Qualifier part.
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == DEFAULT_NAMESPACE {
            f.write_str(&self.qualifier)
        } else {
            write!(f, "{}:{}", self.namespace, self.qualifier)
        }
    }
}

impl TryFrom<String> for ShardId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShardId> for String {
    fn from(shard: ShardId) -> Self {
        shard.to_string()
    }
}

/// Commit order assigned by the mutation log.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Nothing applied yet.
    pub const ZERO: Self = Self(0);

    /// The sequence after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
