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

use crate::controller;
use crate::error::Error;
use crate::error::Result;
use crate::path;
use crate::CgroupFs;
use nix::unistd::Pid;
use std::fmt;
use std::str::FromStr;

/// Splits a spec string into its controller and path.
///
/// A spec is one of `/abs/path`, `controller` or `controller:/abs/path`.
/// Controllers come back normalized and paths with redundant slashes removed.
///
/// ```
/// use cg1tools::parse_spec;
///
/// assert_eq!(parse_spec("/a//b").unwrap(), (None, Some("/a/b".to_string())));
/// assert_eq!(parse_spec("name=systemd").unwrap(), (Some("systemd".to_string()), None));
/// assert_eq!(parse_spec("cpu:/x").unwrap(), (Some("cpu".to_string()), Some("/x".to_string())));
/// ```
pub fn parse_spec(spec: &str) -> Result<(Option<String>, Option<String>)> {
	if path::is_absolute(spec) {
		if !path::is_safe(spec) {
			return Err(Error::invalid(format!("unsafe path {spec:?}")));
		}
		return Ok((None, Some(path::normalize(spec))));
	}
	let Some((c, p)) = spec.split_once(':') else {
		if !controller::is_valid(spec, true) {
			return Err(Error::invalid(format!("controller {spec:?}")));
		}
		return Ok((Some(controller::normalize(spec).to_string()), None));
	};
	let c = controller::normalize(c);
	if !controller::is_valid(c, true) {
		return Err(Error::invalid(format!("controller {c:?}")));
	}
	if !path::is_safe(p) || !path::is_absolute(p) {
		return Err(Error::invalid(format!("path {p:?} in spec {spec:?}")));
	}
	Ok((Some(c.to_string()), Some(path::normalize(p))))
}

/// Builds a `controller:/path` spec; no controller means the authoritative hierarchy.
pub fn format_spec(controller: Option<&str>, path: &str) -> Result<String> {
	let controller = match controller {
		None => controller::SYSTEMD_NAME,
		Some(c) if controller::is_valid(c, true) => controller::normalize(c),
		Some(c) => return Err(Error::invalid(format!("controller {c:?}"))),
	};
	if !path::is_absolute(path) {
		return Err(Error::invalid(format!("path {path:?} is not absolute")));
	}
	Ok(format!("{controller}:{}", path::normalize(path)))
}

/// A control group: a path within one controller's hierarchy.
///
/// No controller means the authoritative hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CGroup {
	controller: Option<String>,
	path: String,
}

impl CGroup {
	/// The control group of the current process in the authoritative hierarchy.
	pub fn current(cg: &CgroupFs) -> Result<Self> {
		Self::from_proc_pid_cgroup(cg, Pid::from_raw(0))
	}

	pub fn from_proc_pid_cgroup(cg: &CgroupFs, pid: Pid) -> Result<Self> {
		Self::from_path(cg.pid_get_path(None, pid)?)
	}

	/// A group in the authoritative hierarchy. The path must be absolute and must not contain "..".
	pub fn from_path(path: impl AsRef<str>) -> Result<Self> {
		let path = path.as_ref();
		if !path::is_absolute(path) || !path::is_safe(path) {
			return Err(Error::invalid(format!("path {path:?}")));
		}
		Ok(Self {
			controller: None,
			path: path::normalize(path),
		})
	}

	pub fn controller(&self) -> Option<&str> {
		self.controller.as_deref()
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// Descends into `path`, or replaces the path if `path` is absolute.
	///
	/// ```
	/// use cg1tools::CGroup;
	///
	/// let mut cgroup = CGroup::from_path("/a/b/c").unwrap();
	/// cgroup.append("d").unwrap();
	/// assert_eq!(cgroup.path(), "/a/b/c/d");
	/// cgroup.append("/e").unwrap();
	/// assert_eq!(cgroup.path(), "/e");
	/// assert!(cgroup.append("../etc").is_err());
	/// ```
	pub fn append(&mut self, path: &str) -> Result<()> {
		if !path::is_safe(path) {
			return Err(Error::invalid(format!("path {path:?}")));
		}
		self.path = if path::is_absolute(path) {
			path::normalize(path)
		} else {
			path::normalize(&path::join(&self.path, path))
		};
		Ok(())
	}
}

impl FromStr for CGroup {
	type Err = Error;

	fn from_str(spec: &str) -> Result<Self> {
		let (controller, path) = parse_spec(spec)?;
		Ok(Self {
			controller,
			path: path.unwrap_or_else(|| "/".to_string()),
		})
	}
}

impl fmt::Display for CGroup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let controller = self.controller.as_deref().map(controller::normalize).unwrap_or(controller::SYSTEMD_NAME);
		write!(f, "{controller}:{}", self.path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_spec_errors() {
		assert!(parse_spec("/a/../b").is_err());
		assert!(parse_spec("cpu-x").is_err());
		assert!(parse_spec("cpu:a/b").is_err());
		assert!(parse_spec("cpu:/a/../b").is_err());
		assert!(parse_spec(":/a").is_err());
	}

	#[test]
	fn test_format_spec() {
		insta::assert_snapshot!(format_spec(None, "/a//b/").unwrap(), @"systemd:/a/b");
		insta::assert_snapshot!(format_spec(Some("name=systemd"), "/").unwrap(), @"systemd:/");
		insta::assert_snapshot!(format_spec(Some("cpu"), "/x").unwrap(), @"cpu:/x");
		assert!(format_spec(Some("cpu"), "x").is_err());
		assert!(format_spec(Some("-"), "/x").is_err());
	}

	#[test]
	fn test_spec_round_trip() {
		for (c, p) in [("cpu", "/a/b"), ("memory", "/"), ("systemd", "/user.slice")] {
			let spec = format_spec(Some(c), p).unwrap();
			assert_eq!(parse_spec(&spec).unwrap(), (Some(c.to_string()), Some(p.to_string())));
		}
	}

	#[test]
	fn test_cgroup_from_str() {
		let cgroup: CGroup = "cpu:/a//b".parse().unwrap();
		assert_eq!(cgroup.controller(), Some("cpu"));
		assert_eq!(cgroup.path(), "/a/b");
		assert_eq!(cgroup.to_string(), "cpu:/a/b");

		let cgroup: CGroup = "memory".parse().unwrap();
		assert_eq!(cgroup.path(), "/");

		let cgroup: CGroup = "/x".parse().unwrap();
		assert_eq!(cgroup.controller(), None);
		assert_eq!(cgroup.to_string(), "systemd:/x");
	}

	#[test]
	fn test_append_relative() {
		let mut cgroup = CGroup::from_path("/").unwrap();
		cgroup.append("a/./b").unwrap();
		assert_eq!(cgroup.path(), "/a/b");
	}

	#[test]
	fn test_paths_stay_inside_hierarchy() {
		assert!(matches!(CGroup::from_path("/a/../../etc"), Err(Error::InvalidArgument(_))));
		assert!(matches!(CGroup::from_path("a/b"), Err(Error::InvalidArgument(_))));

		let mut cgroup = CGroup::from_path("/a").unwrap();
		assert!(matches!(cgroup.append("../../../etc"), Err(Error::InvalidArgument(_))));
		assert!(cgroup.append("/x/..").is_err());
		assert!(cgroup.append("").is_err());
		assert_eq!(cgroup.path(), "/a");
	}
}
