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

use crate::cgroup::parse_spec;
use crate::controller;
use crate::error::Error;
use crate::error::Result;
use crate::path;
use crate::CgroupFs;
use nix::unistd::Pid;
use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::PathBuf;

/// Deepest subtree any recursive walk will descend into.
pub(crate) const MAX_DEPTH: usize = 1024;

pub(crate) fn check_depth(depth: usize, path: &str) -> Result<()> {
	if depth > MAX_DEPTH {
		return Err(Error::TooDeep { path: path.to_string() });
	}
	Ok(())
}

/// Reader over the process ids in a `cgroup.procs` file.
///
/// The kernel may list a process more than once across reads, so callers
/// that act on each pid need to dedupe.
#[derive(Debug)]
pub struct Processes {
	path: PathBuf,
	reader: BufReader<File>,
	line: String,
}

impl Processes {
	/// The next pid, or `None` at the end of the file.
	pub fn next_pid(&mut self) -> Result<Option<Pid>> {
		loop {
			self.line.clear();
			let n = self.reader.read_line(&mut self.line).map_err(|e| Error::io(&self.path, e))?;
			if n == 0 {
				return Ok(None);
			}
			let entry = self.line.trim();
			if entry.is_empty() {
				continue;
			}
			return match entry.parse::<i32>() {
				Ok(pid) if pid > 0 => Ok(Some(Pid::from_raw(pid))),
				_ => Err(Error::Format {
					path: self.path.clone(),
					reason: format!("{entry:?} is not a process id"),
				}),
			};
		}
	}
}

impl Iterator for Processes {
	type Item = Result<Pid>;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_pid().transpose()
	}
}

/// Reader over the immediate child groups of a control group.
#[derive(Debug)]
pub struct Subgroups {
	path: PathBuf,
	entries: fs::ReadDir,
}

impl Subgroups {
	/// The next child directory name, or `None` when there are no more.
	pub fn next_subgroup(&mut self) -> Result<Option<String>> {
		for entry in self.entries.by_ref() {
			let entry = entry.map_err(|e| Error::io(&self.path, e))?;
			let is_dir = entry.file_type().map_err(|e| Error::io(entry.path(), e))?.is_dir();
			if !is_dir {
				continue;
			}
			match entry.file_name().into_string() {
				Ok(name) => return Ok(Some(name)),
				Err(name) => log::debug!("Skipping non-UTF-8 control group {name:?} in {}", self.path.display()),
			}
		}
		Ok(None)
	}
}

impl Iterator for Subgroups {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_subgroup().transpose()
	}
}

impl CgroupFs {
	/// Opens the member list of a control group; `None` means the authoritative hierarchy.
	pub fn processes(&self, controller: Option<&str>, path: &str) -> Result<Processes> {
		let fs = self.path(Some(controller::or_default(controller)), Some(path), Some("cgroup.procs"))?;
		let file = File::open(&fs).map_err(|e| Error::io(&fs, e))?;
		Ok(Processes {
			path: fs,
			reader: BufReader::new(file),
			line: String::new(),
		})
	}

	/// Opens the child list of a control group. This is not recursive.
	pub fn subgroups(&self, controller: Option<&str>, path: &str) -> Result<Subgroups> {
		let fs = self.path(Some(controller::or_default(controller)), Some(path), None)?;
		let entries = fs::read_dir(&fs).map_err(|e| Error::io(&fs, e))?;
		Ok(Subgroups { path: fs, entries })
	}

	/// True if no process other than `ignore` is a member. A missing group is empty.
	pub fn is_empty(&self, controller: Option<&str>, path: &str, ignore: Option<Pid>) -> Result<bool> {
		let procs = match self.processes(controller, path) {
			Ok(procs) => procs,
			Err(e) if e.is_not_found() => return Ok(true),
			Err(e) => return Err(e),
		};
		for pid in procs {
			if Some(pid?) != ignore {
				return Ok(false);
			}
		}
		Ok(true)
	}

	pub fn is_empty_by_spec(&self, spec: &str, ignore: Option<Pid>) -> Result<bool> {
		let (c, p) = parse_spec(spec)?;
		self.is_empty(c.as_deref(), p.as_deref().unwrap_or("/"), ignore)
	}

	/// True if the group and every descendant are empty.
	pub fn is_empty_recursive(&self, controller: Option<&str>, path: &str, ignore: Option<Pid>) -> Result<bool> {
		self.is_empty_recursive_at(controller, path, ignore, 0)
	}

	fn is_empty_recursive_at(&self, controller: Option<&str>, path: &str, ignore: Option<Pid>, depth: usize) -> Result<bool> {
		check_depth(depth, path)?;
		if !self.is_empty(controller, path, ignore)? {
			return Ok(false);
		}
		let children = match self.subgroups(controller, path) {
			Ok(children) => children,
			Err(e) if e.is_not_found() => return Ok(true),
			Err(e) => return Err(e),
		};
		for name in children {
			let child = path::join(path, &name?);
			if !self.is_empty_recursive_at(controller, &child, ignore, depth + 1)? {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fake() -> (tempfile::TempDir, CgroupFs) {
		let tmp = tempfile::tempdir().unwrap();
		fs::create_dir_all(tmp.path().join("systemd/a/b/c")).unwrap();
		fs::create_dir_all(tmp.path().join("cpu")).unwrap();
		let cg = CgroupFs::new(tmp.path()).assume_mounted();
		(tmp, cg)
	}

	#[test]
	fn test_processes() {
		let (tmp, cg) = fake();
		fs::write(tmp.path().join("systemd/a/cgroup.procs"), "1\n22\n22\n\n333\n").unwrap();
		let pids: Vec<i32> = cg.processes(None, "/a").unwrap().map(|p| p.unwrap().as_raw()).collect();
		assert_eq!(pids, [1, 22, 22, 333]);
	}

	#[test]
	fn test_processes_bad_entry() {
		let (tmp, cg) = fake();
		fs::write(tmp.path().join("systemd/a/cgroup.procs"), "5\n0\n").unwrap();
		let mut procs = cg.processes(None, "/a").unwrap();
		assert_eq!(procs.next_pid().unwrap(), Some(Pid::from_raw(5)));
		assert!(matches!(procs.next_pid(), Err(Error::Format { .. })));

		fs::write(tmp.path().join("systemd/a/cgroup.procs"), "abc\n").unwrap();
		let mut procs = cg.processes(None, "/a").unwrap();
		assert!(matches!(procs.next_pid(), Err(Error::Format { .. })));
	}

	#[test]
	fn test_processes_missing() {
		let (_tmp, cg) = fake();
		assert!(cg.processes(None, "/nope").unwrap_err().is_not_found());
		assert!(cg.processes(Some("cpu"), "/a").unwrap_err().is_not_found());
	}

	#[test]
	fn test_subgroups_skips_files() {
		let (tmp, cg) = fake();
		fs::create_dir(tmp.path().join("systemd/a/d")).unwrap();
		fs::write(tmp.path().join("systemd/a/cgroup.procs"), "").unwrap();
		let mut names: Vec<String> = cg.subgroups(None, "/a").unwrap().map(Result::unwrap).collect();
		names.sort();
		assert_eq!(names, ["b", "d"]);
	}

	#[test]
	fn test_is_empty() {
		let (tmp, cg) = fake();
		let me = Pid::from_raw(77);
		assert!(cg.is_empty(None, "/missing", None).unwrap());
		assert!(cg.is_empty(None, "/a", None).unwrap());
		fs::write(tmp.path().join("systemd/a/cgroup.procs"), "77\n").unwrap();
		assert!(!cg.is_empty(None, "/a", None).unwrap());
		assert!(cg.is_empty(None, "/a", Some(me)).unwrap());
		assert!(cg.is_empty_by_spec("systemd:/a", Some(me)).unwrap());
		assert!(!cg.is_empty_by_spec("/a", None).unwrap());
	}

	#[test]
	fn test_is_empty_recursive() {
		let (tmp, cg) = fake();
		assert!(cg.is_empty_recursive(None, "/a", None).unwrap());
		fs::write(tmp.path().join("systemd/a/b/c/cgroup.procs"), "9\n").unwrap();
		assert!(!cg.is_empty_recursive(None, "/a", None).unwrap());
		assert!(cg.is_empty(None, "/a", None).unwrap());
		assert!(cg.is_empty_recursive(None, "/a", Some(Pid::from_raw(9))).unwrap());
		assert!(cg.is_empty_recursive(None, "/gone", None).unwrap());
	}
}
