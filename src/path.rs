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

//! String helpers for slash-separated control group paths.

use crate::error::Error;
use crate::error::Result;

const PATH_MAX: usize = 4096;
const NAME_MAX: usize = 255;

/// Collapses repeated slashes, drops "." segments and any trailing slash.
///
/// ```
/// use cg1tools::path::normalize;
///
/// assert_eq!(normalize("//a/./b//"), "/a/b");
/// assert_eq!(normalize("/"), "/");
/// assert_eq!(normalize("a//b"), "a/b");
/// ```
pub fn normalize(path: &str) -> String {
	let absolute = path.starts_with('/');
	let mut out = String::with_capacity(path.len());
	for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
		if absolute || !out.is_empty() {
			out.push('/');
		}
		out.push_str(segment);
	}
	if absolute && out.is_empty() {
		out.push('/');
	}
	out
}

pub fn is_absolute(path: &str) -> bool {
	path.starts_with('/')
}

/// A path is safe if it is non-empty, fits in PATH_MAX and never climbs with "..".
pub fn is_safe(path: &str) -> bool {
	!path.is_empty() && path.len() <= PATH_MAX && !path.split('/').any(|s| s == "..")
}

/// A single path component that is neither empty, ".", ".." nor contains a slash.
pub fn filename_is_safe(name: &str) -> bool {
	!name.is_empty() && name != "." && name != ".." && !name.contains('/') && name.len() <= NAME_MAX
}

/// Returns the part of `path` below `prefix`, comparing whole components.
///
/// The remainder keeps no leading slash; it is empty when both name the same
/// directory.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
	let mut path = path;
	for want in prefix.split('/').filter(|s| !s.is_empty()) {
		path = path.trim_start_matches('/');
		let (got, rest) = path.split_at(path.find('/').unwrap_or(path.len()));
		if got != want {
			return None;
		}
		path = rest;
	}
	Some(path.trim_start_matches('/'))
}

/// Joins a child name below a control group path.
pub fn join(parent: &str, child: &str) -> String {
	if parent.ends_with('/') {
		format!("{parent}{child}")
	} else {
		format!("{parent}/{child}")
	}
}

/// The parent of an absolute path; the parent of a top-level entry is "/".
pub fn parent(path: &str) -> Result<String> {
	let path = normalize(path);
	match path.rfind('/') {
		Some(0) if path.len() > 1 => Ok("/".to_string()),
		Some(i) if i > 0 => Ok(path[..i].to_string()),
		_ => Err(Error::invalid(format!("{path:?} has no parent"))),
	}
}

/// Every ancestor of `path`, nearest first, ending with the root "/".
///
/// ```
/// use cg1tools::path::ancestors;
///
/// assert_eq!(ancestors("/a/b/c"), ["/a/b", "/a", "/"]);
/// assert_eq!(ancestors("/"), ["/"]);
/// ```
pub fn ancestors(path: &str) -> Vec<String> {
	let mut prefix = normalize(path);
	let mut out = Vec::new();
	while let Some(slash) = prefix.rfind('/') {
		prefix.truncate(slash);
		out.push(if prefix.is_empty() { "/".to_string() } else { prefix.clone() });
	}
	out
}

pub fn equal(a: &str, b: &str) -> bool {
	normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize() {
		assert_eq!(normalize("/a//b/"), "/a/b");
		assert_eq!(normalize("///"), "/");
		assert_eq!(normalize(""), "");
		assert_eq!(normalize("/sys/fs/cgroup//cpu/./x/cgroup.procs"), "/sys/fs/cgroup/cpu/x/cgroup.procs");
	}

	#[test]
	fn test_is_safe() {
		assert!(is_safe("/a/b"));
		assert!(is_safe("/a/..b"));
		assert!(!is_safe("/a/../b"));
		assert!(!is_safe("/.."));
		assert!(!is_safe(""));
	}

	#[test]
	fn test_strip_prefix() {
		assert_eq!(strip_prefix("/sys/fs/cgroup/cpu", "/sys/fs/cgroup"), Some("cpu"));
		assert_eq!(strip_prefix("/sys/fs/cgroup", "/sys/fs/cgroup/"), Some(""));
		assert_eq!(strip_prefix("/sys/fs/cgroupx", "/sys/fs/cgroup"), None);
		assert_eq!(strip_prefix("/a/b", "/"), Some("a/b"));
	}

	#[test]
	fn test_parent() {
		assert_eq!(parent("/a/b").unwrap(), "/a");
		assert_eq!(parent("/a").unwrap(), "/");
		assert!(parent("/").is_err());
	}

	#[test]
	fn test_join_and_equal() {
		assert_eq!(join("/", "x"), "/x");
		assert_eq!(join("/a", "x"), "/a/x");
		assert!(equal("/a//b/", "/a/b"));
		assert!(!equal("/a", "/b"));
	}
}
