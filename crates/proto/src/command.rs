use std::fmt;

use chrono::{DateTime, Utc};
use impetus_primitives::{LockId, Source};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::anchor::Anchor;

/// What a mutation command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
	/// Insert new content and lock it.
	Provoke,
	/// Remove unlocked content.
	Delete,
	/// Replace a range with new locked content.
	Rewrite,
}

impl Action {
	/// Wire name of the action.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Provoke => "provoke",
			Self::Delete => "delete",
			Self::Rewrite => "rewrite",
		}
	}

	/// Returns true if the action carries content and creates a lock.
	pub const fn creates_lock(self) -> bool {
		matches!(self, Self::Provoke | Self::Rewrite)
	}

	/// Returns true if the action removes existing text.
	pub const fn is_destructive(self) -> bool {
		matches!(self, Self::Delete | Self::Rewrite)
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Audit identifier of a command (`act_<uuid v4>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
	/// Prefix carried by every minted id.
	pub const PREFIX: &'static str = "act_";

	/// Mints a new identifier.
	pub fn mint() -> Self {
		Self(format!("{}{}", Self::PREFIX, Uuid::new_v4()))
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ActionId {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}

impl fmt::Display for ActionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A structured instruction for the content mutator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationCommand {
	/// The action to perform.
	pub action: Action,
	/// New content; present for provoke and rewrite.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	/// Target; required for delete and rewrite.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub anchor: Option<Anchor>,
	/// Lock minted for the new content; present for provoke and rewrite.
	#[serde(default, skip_serializing_if = "Option::is_none", alias = "lockId")]
	pub lock_id: Option<LockId>,
	/// Audit identifier.
	#[serde(alias = "actionId")]
	pub action_id: ActionId,
	/// When the command was issued.
	#[serde(alias = "issuedAt")]
	pub issued_at: DateTime<Utc>,
	/// Policy that produced the command.
	pub source: Source,
}

impl MutationCommand {
	/// A provoke command with freshly minted lock and action ids.
	pub fn provoke(content: impl Into<String>, anchor: Option<Anchor>, source: Source) -> Self {
		Self {
			action: Action::Provoke,
			content: Some(content.into()),
			anchor,
			lock_id: Some(LockId::mint()),
			action_id: ActionId::mint(),
			issued_at: Utc::now(),
			source,
		}
	}

	/// A rewrite command with freshly minted lock and action ids.
	pub fn rewrite(content: impl Into<String>, anchor: Anchor, source: Source) -> Self {
		Self {
			action: Action::Rewrite,
			content: Some(content.into()),
			anchor: Some(anchor),
			lock_id: Some(LockId::mint()),
			action_id: ActionId::mint(),
			issued_at: Utc::now(),
			source,
		}
	}

	/// A delete command with a freshly minted action id.
	pub fn delete(anchor: Anchor, source: Source) -> Self {
		Self {
			action: Action::Delete,
			content: None,
			anchor: Some(anchor),
			lock_id: None,
			action_id: ActionId::mint(),
			issued_at: Utc::now(),
			source,
		}
	}

	/// Checks the per-action field requirements.
	///
	/// Anchor bounds are not checked here; they depend on the live document.
	pub fn validate(&self) -> Result<(), CommandError> {
		let action = self.action;
		if self.action_id.as_str().is_empty() {
			return Err(CommandError::MissingActionId);
		}

		if action.creates_lock() {
			if self.content.as_deref().is_none_or(|c| c.trim().is_empty()) {
				return Err(CommandError::MissingContent { action });
			}
			if self.lock_id.as_ref().is_none_or(LockId::is_empty) {
				return Err(CommandError::MissingLockId { action });
			}
		} else if self.lock_id.is_some() {
			return Err(CommandError::UnexpectedLockId);
		}

		if action.is_destructive() {
			match &self.anchor {
				None => return Err(CommandError::MissingAnchor { action }),
				Some(Anchor::Position { .. }) => return Err(CommandError::PositionAnchor { action }),
				Some(_) => {}
			}
		}

		Ok(())
	}
}

/// A command violating the per-action field requirements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
	/// Provoke and rewrite need non-blank content.
	#[error("{action} requires non-empty content")]
	MissingContent {
		/// Offending action.
		action: Action,
	},
	/// Provoke and rewrite need a lock id.
	#[error("{action} requires a lock_id")]
	MissingLockId {
		/// Offending action.
		action: Action,
	},
	/// Delete never creates a lock.
	#[error("delete must not carry a lock_id")]
	UnexpectedLockId,
	/// Delete and rewrite need an anchor.
	#[error("{action} requires an anchor")]
	MissingAnchor {
		/// Offending action.
		action: Action,
	},
	/// Delete and rewrite need a range or lock reference.
	#[error("{action} requires a range or lock_id anchor, got pos")]
	PositionAnchor {
		/// Offending action.
		action: Action,
	},
	/// Every command carries an audit id.
	#[error("action_id must not be empty")]
	MissingActionId,
}
