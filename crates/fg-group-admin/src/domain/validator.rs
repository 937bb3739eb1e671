//! # Membership Validator
//!
//! Pure checks run before a mutation is persisted. Order:
//!
//! 1. well-formed names (enforced when request strings are parsed)
//! 2. batch size
//! 3. uniqueness
//! 4. default-group protection
//! 5. non-empty deletion protection
//! 6. referential integrity (unknown group, in-flight conflicts)

use super::entities::Mutation;
use super::errors::{GroupError, ValidationError};
use super::registry::GroupRegistry;
use super::value_objects::{GroupName, NodeId, ShardId};
use std::collections::HashMap;

/// Everything a validation decision may look at.
pub struct ValidationContext<'a> {
    /// Current registry state
    pub registry: &'a GroupRegistry,
    /// Servers whose last move is not yet delivered, with its target
    pub servers_in_transition: &'a HashMap<NodeId, GroupName>,
    /// Tables whose last move is not yet delivered, with its target
    pub tables_in_transition: &'a HashMap<ShardId, GroupName>,
}

/// Validates proposed mutations against the registry.
#[derive(Clone, Debug)]
pub struct MembershipValidator {
    max_batch_size: usize,
    reject_moves_in_transition: bool,
}

impl MembershipValidator {
    /// Create a validator.
    pub fn new(max_batch_size: usize, reject_moves_in_transition: bool) -> Self {
        Self {
            max_batch_size,
            reject_moves_in_transition,
        }
    }

    /// Parse a group name from a request.
    pub fn group_name(input: &str) -> Result<GroupName, GroupError> {
        Ok(GroupName::new(input)?)
    }

    /// Parse a server address from a request.
    pub fn server(input: &str) -> Result<NodeId, GroupError> {
        Ok(NodeId::parse(input)?)
    }

    /// Parse a table name from a request.
    pub fn table(input: &str) -> Result<ShardId, GroupError> {
        Ok(ShardId::parse(input)?)
    }

    /// Decide whether `mutation` may be committed.
    pub fn validate(&self, ctx: &ValidationContext<'_>, mutation: &Mutation) -> Result<(), GroupError> {
        self.check_batch(mutation)?;

        match mutation {
            Mutation::AddGroup { name } => {
                if ctx.registry.contains_group(name) {
                    return Err(ValidationError::DuplicateName(name.to_string()).into());
                }
            }
            Mutation::RemoveGroup { name } => {
                if name.is_default() {
                    return Err(ValidationError::DefaultGroupProtected.into());
                }
                let Some(info) = ctx.registry.group(name) else {
                    return Err(GroupError::UnknownGroup(name.to_string()));
                };
                if !info.is_empty() {
                    return Err(ValidationError::GroupNotEmpty {
                        group: name.to_string(),
                        servers: info.servers.len(),
                        tables: info.tables.len(),
                    }
                    .into());
                }
            }
            Mutation::MoveServers { servers, target } => {
                require_group(ctx, target)?;
                if self.reject_moves_in_transition {
                    reject_in_flight(servers.iter(), ctx.servers_in_transition)?;
                }
            }
            Mutation::MoveTables { tables, target } => {
                require_group(ctx, target)?;
                if self.reject_moves_in_transition {
                    reject_in_flight(tables.iter(), ctx.tables_in_transition)?;
                }
            }
        }

        Ok(())
    }

    fn check_batch(&self, mutation: &Mutation) -> Result<(), ValidationError> {
        if matches!(
            mutation,
            Mutation::MoveServers { .. } | Mutation::MoveTables { .. }
        ) {
            let size = mutation.batch_len();
            if size == 0 {
                return Err(ValidationError::EmptyBatch);
            }
            if size > self.max_batch_size {
                return Err(ValidationError::BatchTooLarge {
                    size,
                    max: self.max_batch_size,
                });
            }
        }
        Ok(())
    }
}

fn require_group(ctx: &ValidationContext<'_>, name: &GroupName) -> Result<(), GroupError> {
    if ctx.registry.contains_group(name) {
        Ok(())
    } else {
        Err(GroupError::UnknownGroup(name.to_string()))
    }
}

fn reject_in_flight<'a, K>(
    mut entities: impl Iterator<Item = &'a K>,
    in_transition: &HashMap<K, GroupName>,
) -> Result<(), GroupError>
where
    K: std::hash::Hash + Eq + std::fmt::Display + 'a,
{
    match entities.find_map(|e| in_transition.get(e).map(|target| (e, target))) {
        Some((entity, target)) => Err(ValidationError::ConflictingMutation {
            entity: entity.to_string(),
            pending_target: target.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
