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

//! Escaping of names used as cgroup directories, and decoding of unit
//! identities from paths in the authoritative hierarchy.
//!
//! A path there looks like `/user.slice/user-1000.slice/session-7.scope`
//! or `/system.slice/foo.service`: zero or more slices, optionally a session
//! scope, then the unit.

use crate::controller;
use crate::error::Error;
use crate::error::Result;
use crate::unit;
use crate::CgroupFs;
use nix::unistd::Uid;
use std::path::PathBuf;

const RESERVED_NAMES: [&str; 3] = ["notify_on_release", "release_agent", "tasks"];

impl CgroupFs {
	/// Makes `name` safe to use as a cgroup directory name.
	///
	/// Names that could collide with kernel attribute files get a leading
	/// underscore, as do names already starting with one, so that
	/// [`unescape`] only ever has to strip a single character. This checks
	/// which controllers are mounted, since `cpu.foo` would shadow a `cpu`
	/// attribute file.
	pub fn escape(&self, name: &str) -> String {
		let need_prefix = name.is_empty()
			|| name.starts_with('_')
			|| name.starts_with('.')
			|| RESERVED_NAMES.contains(&name)
			|| match name.rsplit_once('.') {
				Some(("cgroup", _)) => true,
				Some((stem, _)) => controller::is_valid(stem, false) && self.hierarchy_exists(stem),
				None => false,
			};
		if need_prefix {
			format!("_{name}")
		} else {
			name.to_string()
		}
	}

	/// Builds the nested slice path for a slice unit.
	///
	/// Each dash in the name opens one more level, so `a-b-c.slice` lives at
	/// `a.slice/a-b.slice/a-b-c.slice`.
	pub fn unit_to_slice_path(&self, name: &str) -> Result<String> {
		if !unit::is_valid(name) || !name.ends_with(".slice") {
			return Err(Error::invalid(format!("{name:?} is not a slice unit")));
		}
		let prefix = unit::to_prefix(name);
		let mut out = String::new();
		for (dash, _) in prefix.match_indices('-') {
			let ancestor = format!("{}.slice", &prefix[..dash]);
			if !unit::is_valid(&ancestor) {
				return Err(Error::invalid(format!("{name:?} has an invalid parent slice {ancestor:?}")));
			}
			out.push_str(&self.escape(&ancestor));
			out.push('/');
		}
		out.push_str(&self.escape(name));
		Ok(out)
	}
}

/// Reverses [`CgroupFs::escape`] by removing one leading underscore.
pub fn unescape(name: &str) -> &str {
	name.strip_prefix('_').unwrap_or(name)
}

/// Reads the unit name from the first segment of `cgroup`.
pub fn decode_unit(cgroup: &str) -> Result<String> {
	let segment = cgroup.split('/').next().unwrap_or_default();
	let name = unescape(segment);
	if !unit::is_valid(name) {
		return Err(Error::invalid(format!("{name:?} is not a unit name")));
	}
	Ok(name.to_string())
}

fn is_slice(segment: &str) -> bool {
	segment.len() > ".slice".len() && segment.ends_with(".slice")
}

/// Skips leading slashes and slice segments; the rest starts at the first non-slice segment.
fn skip_slices(mut p: &str) -> &str {
	loop {
		p = p.trim_start_matches('/');
		let n = p.find('/').unwrap_or(p.len());
		if !is_slice(&p[..n]) {
			return p;
		}
		p = &p[n..];
	}
}

fn skip_session(p: &str) -> Option<&str> {
	let p = p.trim_start_matches('/');
	let n = p.find('/').unwrap_or(p.len());
	let segment = &p[..n];
	if n <= "session-.scope".len() || !segment.starts_with("session-") || !segment.ends_with(".scope") {
		return None;
	}
	Some(p[n..].trim_start_matches('/'))
}

fn not_found(path: &str) -> Error {
	Error::NotFound(PathBuf::from(path))
}

/// The unit owning `path`, after any leading slices.
///
/// ```
/// use cg1tools::escape::path_to_unit;
///
/// assert_eq!(path_to_unit("/a.slice/b.slice/myservice.service").unwrap(), "myservice.service");
/// ```
pub fn path_to_unit(path: &str) -> Result<String> {
	decode_unit(skip_slices(path))
}

/// The user unit below a login session, as in `/user.slice/.../session-1.scope/foo.service`.
pub fn path_to_user_unit(path: &str) -> Result<String> {
	let rest = skip_session(skip_slices(path)).ok_or_else(|| not_found(path))?;
	decode_unit(skip_slices(rest))
}

/// The innermost slice of the leading slice chain.
pub fn path_to_slice(path: &str) -> Result<String> {
	let mut p = path;
	let mut found = None;
	loop {
		p = p.trim_start_matches('/');
		let n = p.find('/').unwrap_or(p.len());
		if !is_slice(&p[..n]) {
			return found.map(str::to_string).ok_or_else(|| not_found(path));
		}
		found = Some(&p[..n]);
		p = &p[n..];
	}
}

fn scope_id<'a>(path: &'a str, kind: &str) -> Result<&'a str> {
	let rest = skip_slices(path);
	let segment = rest.split('/').next().unwrap_or_default();
	unescape(segment)
		.strip_prefix(kind)
		.and_then(|s| s.strip_suffix(".scope"))
		.filter(|id| !id.is_empty())
		.ok_or_else(|| not_found(path))
}

/// The session id from a `session-<id>.scope` segment after the slices.
pub fn path_to_session(path: &str) -> Result<String> {
	scope_id(path, "session-").map(str::to_string)
}

/// The machine name from a `machine-<name>.scope` segment after the slices.
pub fn path_to_machine_name(path: &str) -> Result<String> {
	scope_id(path, "machine-").map(str::to_string)
}

/// The owner of a `user-<uid>.slice`.
pub fn path_to_owner_uid(path: &str) -> Result<Uid> {
	let slice = path_to_slice(path)?;
	let id = slice
		.strip_prefix("user-")
		.and_then(|s| s.strip_suffix(".slice"))
		.ok_or_else(|| not_found(path))?;
	let uid: u32 = id.parse().map_err(|_| Error::invalid(format!("{id:?} is not a user id")))?;
	// (uid_t)-1 and the 16-bit -1 are never real users
	if uid == u32::MAX || uid == u32::from(u16::MAX) {
		return Err(Error::invalid(format!("{uid} is not a valid user id")));
	}
	Ok(Uid::from_raw(uid))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn fake() -> (tempfile::TempDir, CgroupFs) {
		let tmp = tempfile::tempdir().unwrap();
		fs::create_dir(tmp.path().join("cpu")).unwrap();
		let cg = CgroupFs::new(tmp.path()).assume_mounted();
		(tmp, cg)
	}

	#[test]
	fn test_escape() {
		let (_tmp, cg) = fake();
		assert_eq!(cg.escape("foo.service"), "foo.service");
		assert_eq!(cg.escape(""), "_");
		assert_eq!(cg.escape("_x"), "__x");
		assert_eq!(cg.escape(".hidden"), "_.hidden");
		assert_eq!(cg.escape("tasks"), "_tasks");
		assert_eq!(cg.escape("release_agent"), "_release_agent");
		assert_eq!(cg.escape("cgroup.procs"), "_cgroup.procs");
		assert_eq!(cg.escape("cpu.shares"), "_cpu.shares");
		assert_eq!(cg.escape("memory.limit"), "memory.limit");
		assert_eq!(cg.escape("/tmp.x"), "/tmp.x");
		assert_eq!(cg.escape("a/cpu.x"), "a/cpu.x");
	}

	#[test]
	fn test_unescape_inverts_escape() {
		let (_tmp, cg) = fake();
		for name in ["", "tasks", "cpu.x", "plain", ".dot", "cgroup.clone_children"] {
			assert_eq!(unescape(&cg.escape(name)), name);
		}
		assert_eq!(unescape("__x"), "_x");
	}

	#[test]
	fn test_unit_to_slice_path() {
		let (_tmp, cg) = fake();
		insta::assert_snapshot!(cg.unit_to_slice_path("a-b-c.slice").unwrap(), @"a.slice/a-b.slice/a-b-c.slice");
		insta::assert_snapshot!(cg.unit_to_slice_path("system.slice").unwrap(), @"system.slice");
		assert!(cg.unit_to_slice_path("foo.service").is_err());
		assert!(cg.unit_to_slice_path("-.slice").is_err());
	}

	#[test]
	fn test_path_to_unit() {
		assert_eq!(path_to_unit("/system.slice/foo.service/child").unwrap(), "foo.service");
		assert_eq!(path_to_unit("foo.service").unwrap(), "foo.service");
		assert_eq!(path_to_unit("/_foo.service").unwrap(), "foo.service");
		assert!(matches!(path_to_unit("/a.slice/"), Err(Error::InvalidArgument(_))));
		assert!(matches!(path_to_unit("/a.slice/notaunit"), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn test_path_to_user_unit() {
		let p = "/user.slice/user-1000.slice/session-2.scope/app.slice/foo.service";
		assert_eq!(path_to_user_unit(p).unwrap(), "foo.service");
		assert!(path_to_user_unit("/user.slice/foo.service").unwrap_err().is_not_found());
		assert!(path_to_user_unit("/user.slice/session-.scope/foo.service").unwrap_err().is_not_found());
	}

	#[test]
	fn test_path_to_slice() {
		assert_eq!(path_to_slice("/a.slice/b.slice/x.service").unwrap(), "b.slice");
		assert_eq!(path_to_slice("//a.slice").unwrap(), "a.slice");
		assert!(path_to_slice("/x.service/a.slice").unwrap_err().is_not_found());
		assert!(path_to_slice("/.slice").unwrap_err().is_not_found());
	}

	#[test]
	fn test_session_machine_owner() {
		let p = "/user.slice/user-1000.slice/session-7.scope";
		assert_eq!(path_to_session(p).unwrap(), "7");
		assert_eq!(path_to_owner_uid(p).unwrap(), Uid::from_raw(1000));
		assert_eq!(path_to_machine_name("/machine.slice/machine-foo.scope").unwrap(), "foo");
		assert_eq!(path_to_machine_name("/machine.slice/_machine-bar.scope/x").unwrap(), "bar");
		assert!(path_to_machine_name("/machine.slice/machine-.scope").unwrap_err().is_not_found());
		assert!(path_to_session("/machine.slice/machine-foo.scope").unwrap_err().is_not_found());
		assert!(path_to_session("/user.slice").unwrap_err().is_not_found());
	}

	#[test]
	fn test_owner_uid_errors() {
		assert!(path_to_owner_uid("/system.slice/x.service").unwrap_err().is_not_found());
		assert!(matches!(path_to_owner_uid("/user-abc.slice"), Err(Error::InvalidArgument(_))));
		assert!(matches!(path_to_owner_uid("/user-65535.slice"), Err(Error::InvalidArgument(_))));
	}
}
