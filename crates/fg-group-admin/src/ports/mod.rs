//! # Ports
//!
//! Inbound API and outbound dependency traits.

pub mod inbound;
pub mod outbound;

pub use inbound::GroupAdminApi;
pub use outbound::{MembershipNotifier, MutationLog, RecordingNotifier};
