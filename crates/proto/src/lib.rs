//! Wire types shared by the editing session and the decision backend.
//!
//! Field names are snake_case on the wire. Request fields also accept their
//! camelCase spelling.

mod anchor;
mod command;
mod request;
mod version;

#[cfg(test)]
mod tests;

pub use anchor::Anchor;
pub use command::{Action, ActionId, CommandError, MutationCommand};
pub use impetus_primitives::{LockId, Source};
pub use request::{CONTEXT_MAX_CHARS, ClientMeta, InterventionRequest, Mode, RequestError};
pub use version::{ContractVersion, VersionParseError};
