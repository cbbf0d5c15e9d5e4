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

use crate::enumerate::check_depth;
use crate::error::Result;
use crate::kill::is_busy;
use crate::path;
use crate::tally::Tally;
use crate::CgroupFs;
use nix::unistd::Pid;
use std::collections::HashSet;

/// One side of a migration: a path within a controller's hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
	pub controller: Option<&'a str>,
	pub path: &'a str,
}

impl<'a> Location<'a> {
	pub fn new(controller: Option<&'a str>, path: &'a str) -> Self {
		Self { controller, path }
	}
}

impl CgroupFs {
	/// Moves every member of `from` (not its descendants) into `to`.
	///
	/// Like [`CgroupFs::kill`], the member list is re-read until a pass
	/// finds nobody new. Returns whether any process was moved.
	pub fn migrate(&self, from: Location<'_>, to: Location<'_>, ignore: Option<Pid>, seen: &mut HashSet<Pid>) -> Result<bool> {
		let mut tally = Tally::default();
		loop {
			let mut done = true;
			let procs = match self.processes(from.controller, from.path) {
				Ok(procs) => procs,
				Err(e) => {
					if !e.is_not_found() {
						tally.fail(e);
					}
					return tally.finish();
				}
			};
			for pid in procs {
				let pid = match pid {
					Ok(pid) => pid,
					Err(e) => {
						tally.fail(e);
						return tally.finish();
					}
				};
				if Some(pid) == ignore || !seen.insert(pid) {
					continue;
				}
				match self.attach(to.controller, to.path, pid) {
					Ok(()) => tally.act(),
					Err(e) if e.is_process_gone() => {}
					Err(e) => tally.fail(e),
				}
				done = false;
			}
			if done {
				return tally.finish();
			}
		}
	}

	/// Moves the members of `from` and all its descendants into `to`.
	///
	/// With `remove`, each source directory is removed after it has been
	/// emptied; directories that are still busy are left alone.
	pub fn migrate_recursive(&self, from: Location<'_>, to: Location<'_>, ignore: Option<Pid>, remove: bool) -> Result<bool> {
		let mut seen = HashSet::new();
		self.migrate_recursive_at(from, to, ignore, remove, &mut seen, 0)
	}

	fn migrate_recursive_at(
		&self,
		from: Location<'_>,
		to: Location<'_>,
		ignore: Option<Pid>,
		remove: bool,
		seen: &mut HashSet<Pid>,
		depth: usize,
	) -> Result<bool> {
		check_depth(depth, from.path)?;
		let mut tally = Tally::from(self.migrate(from, to, ignore, seen));
		let mut children = match self.subgroups(from.controller, from.path) {
			Ok(children) => children,
			Err(e) => {
				if !e.is_not_found() {
					tally.fail(e);
				}
				return tally.finish();
			}
		};
		loop {
			match children.next_subgroup() {
				Ok(Some(name)) => {
					let child = path::join(from.path, &name);
					let child = Location::new(from.controller, &child);
					tally.merge(self.migrate_recursive_at(child, to, ignore, remove, seen, depth + 1));
				}
				Ok(None) => break,
				Err(e) => {
					tally.fail(e);
					break;
				}
			}
		}
		if remove {
			if let Err(e) = self.rmdir(from.controller, from.path) {
				if !is_busy(&e) && !tally.has_failed() {
					return Err(e);
				}
			}
		}
		tally.finish()
	}

	/// Empties a group into its parent and removes it. A missing group is fine.
	pub fn delete(&self, controller: Option<&str>, path: &str) -> Result<bool> {
		let parent = path::parent(path)?;
		let from = Location::new(controller, path);
		let to = Location::new(controller, &parent);
		match self.migrate_recursive(from, to, None, true) {
			Err(e) if e.is_not_found() => Ok(false),
			other => other,
		}
	}
}
