// Copyright 2026 Octave Online LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Controller names and the bitmask over secondary hierarchies.

use std::fmt;
use std::ops::BitOr;

/// Name of the supervisor's own (authoritative) hierarchy as the kernel knows it.
pub const SYSTEMD_CGROUP_CONTROLLER: &str = "name=systemd";

/// Short name of the authoritative hierarchy, used for its directory below the root.
pub const SYSTEMD_NAME: &str = "systemd";

const FILENAME_MAX: usize = 4096;

/// Secondary controllers kept in sync with the authoritative hierarchy.
///
/// Bit `i` of a [`ControllerMask`] refers to entry `i` of this list.
pub const MASK_CONTROLLERS: [&str; 5] = ["cpu", "cpuacct", "blkio", "memory", "devices"];

/// Returns true if `name` is a syntactically valid controller name.
///
/// With `allow_named`, a leading "name=" is accepted and skipped.
///
/// ```
/// use cg1tools::controller::is_valid;
///
/// assert!(is_valid("cpu", false));
/// assert!(is_valid("name=systemd", true));
/// assert!(!is_valid("name=systemd", false));
/// assert!(!is_valid("_hidden", false));
/// ```
pub fn is_valid(name: &str, allow_named: bool) -> bool {
	let name = match name.strip_prefix("name=") {
		Some(rest) if allow_named => rest,
		_ => name,
	};
	!name.is_empty()
		&& !name.starts_with('_')
		&& name.len() <= FILENAME_MAX
		&& name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Maps the authoritative hierarchy and "name=X" forms to their short directory names.
pub fn normalize(name: &str) -> &str {
	if name == SYSTEMD_CGROUP_CONTROLLER {
		SYSTEMD_NAME
	} else if let Some(rest) = name.strip_prefix("name=") {
		rest
	} else {
		name
	}
}

/// Picks the authoritative hierarchy when no controller was given.
pub(crate) fn or_default(controller: Option<&str>) -> &str {
	match controller {
		Some(c) if !c.is_empty() => c,
		_ => SYSTEMD_CGROUP_CONTROLLER,
	}
}

/// Set of secondary hierarchies, indexed by position in [`MASK_CONTROLLERS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ControllerMask(u32);

impl ControllerMask {
	pub const EMPTY: Self = Self(0);

	pub const fn from_bits(bits: u32) -> Self {
		Self(bits & ((1 << MASK_CONTROLLERS.len()) - 1))
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	/// The mask bit for a secondary controller, if it is one we track.
	pub fn for_controller(name: &str) -> Option<Self> {
		let name = normalize(name);
		MASK_CONTROLLERS.iter().position(|c| *c == name).map(|i| Self(1 << i))
	}

	/// Builds a mask from names, ignoring any that are not tracked.
	pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
		names.into_iter().filter_map(Self::for_controller).fold(Self::EMPTY, BitOr::bitor)
	}

	pub fn contains(self, name: &str) -> bool {
		Self::for_controller(name).is_some_and(|bit| self.0 & bit.0 != 0)
	}

	pub fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Every tracked controller in table order, with whether its bit is set.
	pub fn iter(self) -> impl Iterator<Item = (&'static str, bool)> {
		MASK_CONTROLLERS.iter().enumerate().map(move |(i, name)| (*name, self.0 & (1 << i) != 0))
	}
}

impl BitOr for ControllerMask {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		Self(self.0 | rhs.0)
	}
}

impl fmt::Display for ControllerMask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let names: Vec<&str> = self.iter().filter(|(_, set)| *set).map(|(name, _)| name).collect();
		f.write_str(&names.join(" "))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_valid() {
		assert!(is_valid("cpu_1", false));
		assert!(!is_valid("", true));
		assert!(!is_valid("name=", true));
		assert!(!is_valid("cpu-set", false));
		assert!(!is_valid("cpu.shares", false));
		assert!(!is_valid(&"a".repeat(FILENAME_MAX + 1), false));
	}

	#[test]
	fn test_normalize() {
		assert_eq!(normalize("name=systemd"), "systemd");
		assert_eq!(normalize("name=foo"), "foo");
		assert_eq!(normalize("memory"), "memory");
	}

	#[test]
	fn test_or_default() {
		assert_eq!(or_default(None), SYSTEMD_CGROUP_CONTROLLER);
		assert_eq!(or_default(Some("")), SYSTEMD_CGROUP_CONTROLLER);
		assert_eq!(or_default(Some("cpu")), "cpu");
	}

	#[test]
	fn test_mask_order() {
		let mask = ControllerMask::from_names(["memory", "cpu", "bogus"]);
		assert_eq!(mask.bits(), 0b01001);
		assert!(mask.contains("cpu"));
		assert!(!mask.contains("blkio"));
		let order: Vec<_> = mask.iter().map(|(name, _)| name).collect();
		assert_eq!(order, MASK_CONTROLLERS);
		insta::assert_snapshot!(mask, @"cpu memory");
	}

	#[test]
	fn test_from_bits_truncates() {
		assert_eq!(ControllerMask::from_bits(0xff).bits(), 0b11111);
		assert!(ControllerMask::EMPTY.is_empty());
	}
}
