use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A `major.minor[.patch]` contract version.
///
/// Ordering compares major, then minor, then patch. Serialized as its
/// dotted string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractVersion {
	/// Breaking revision.
	pub major: u32,
	/// Additive revision.
	pub minor: u32,
	/// Fix revision; 0 when omitted.
	pub patch: u32,
}

impl ContractVersion {
	/// The contract this crate implements.
	pub const CURRENT: Self = Self::new(2, 0, 0);

	/// Creates a version.
	pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
		Self { major, minor, patch }
	}
}

impl fmt::Display for ContractVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
	}
}

/// A version string that is not `major.minor[.patch]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid contract version `{0}`, expected major.minor[.patch]")]
pub struct VersionParseError(pub String);

impl FromStr for ContractVersion {
	type Err = VersionParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let err = || VersionParseError(s.to_owned());
		let mut parts = s.trim().split('.');
		let mut next = |required: bool| -> Result<u32, VersionParseError> {
			match parts.next() {
				Some(part) if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => {
					part.parse().map_err(|_| err())
				}
				None if !required => Ok(0),
				_ => Err(err()),
			}
		};

		let major = next(true)?;
		let minor = next(true)?;
		let patch = next(false)?;
		if parts.next().is_some() {
			return Err(err());
		}
		Ok(Self::new(major, minor, patch))
	}
}

impl TryFrom<String> for ContractVersion {
	type Error = VersionParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<ContractVersion> for String {
	fn from(version: ContractVersion) -> Self {
		version.to_string()
	}
}
