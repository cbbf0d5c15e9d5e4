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

//! Mirroring operations on the authoritative hierarchy into the secondary ones.
//!
//! A [`ControllerMask`] says which secondary hierarchies should carry a
//! copy of a group. Hierarchies outside the mask hold the processes in the
//! nearest ancestor that exists there instead.

use crate::controller;
use crate::controller::ControllerMask;
use crate::controller::MASK_CONTROLLERS;
use crate::controller::SYSTEMD_CGROUP_CONTROLLER;
use crate::controller::SYSTEMD_NAME;
use crate::error::Result;
use crate::migrate::Location;
use crate::path;
use crate::CgroupFs;
use nix::unistd::Pid;
use std::collections::HashSet;

const PRIMARY: Option<&str> = Some(SYSTEMD_CGROUP_CONTROLLER);

impl CgroupFs {
	/// Attaches to the nearest ancestor of `path` that accepts the process.
	fn attach_to_ancestor(&self, controller: &str, path: &str, pid: Pid) {
		for ancestor in path::ancestors(path) {
			if self.attach(Some(controller), &ancestor, pid).is_ok() {
				return;
			}
		}
		log::debug!("No {controller} group above {path} accepted process {pid}");
	}

	/// Creates `path` in the authoritative hierarchy and in each masked one,
	/// and removes stale copies from the others.
	pub fn create_with_mask(&self, mask: ControllerMask, path: &str) -> Result<bool> {
		let created = self.create(PRIMARY, path)?;
		for (name, set) in mask.iter() {
			let result = if set {
				self.create(Some(name), path).map(drop)
			} else {
				self.trim(Some(name), path, true)
			};
			if let Err(e) = result {
				log::debug!("Failed to sync {name}:{path}: {e}");
			}
		}
		Ok(created)
	}

	/// Attaches a process to `path` everywhere, falling back to ancestors
	/// in hierarchies where the group does not exist.
	pub fn attach_with_mask(&self, mask: ControllerMask, path: &str, pid: Pid) -> Result<()> {
		let result = self.attach(PRIMARY, path, pid);
		for (name, set) in mask.iter() {
			if set {
				match self.attach(Some(name), path, pid) {
					Err(e) if e.is_not_found() => self.attach_to_ancestor(name, path, pid),
					Err(e) => log::debug!("Failed to attach {pid} to {name}:{path}: {e}"),
					Ok(()) => {}
				}
			} else {
				self.attach_to_ancestor(name, path, pid);
			}
		}
		result
	}

	/// [`CgroupFs::attach_with_mask`] for several processes; the last failure is returned.
	pub fn attach_many_with_mask(&self, mask: ControllerMask, path: &str, pids: &HashSet<Pid>) -> Result<()> {
		let mut result = Ok(());
		for pid in pids {
			if let Err(e) = self.attach_with_mask(mask, path, *pid) {
				result = Err(e);
			}
		}
		result
	}

	/// Moves a subtree within the authoritative hierarchy, then places its
	/// processes at `to` (or the nearest existing ancestor) in the secondary
	/// hierarchies. Source directories are only removed in the authoritative one.
	pub fn migrate_with_mask(&self, mask: ControllerMask, from: &str, to: &str) -> Result<bool> {
		if path::equal(from, to) {
			return Ok(false);
		}
		let source = Location::new(PRIMARY, to);
		let result = self.migrate_recursive(Location::new(PRIMARY, from), source, None, true);
		for (name, set) in mask.iter() {
			if set {
				match self.migrate_recursive(source, Location::new(Some(name), to), None, false) {
					Err(e) if e.is_not_found() => {}
					Err(e) => {
						log::debug!("Failed to migrate {to} into {name}: {e}");
						continue;
					}
					Ok(_) => continue,
				}
			}
			for ancestor in path::ancestors(to) {
				if self.migrate_recursive(source, Location::new(Some(name), &ancestor), None, false).is_ok() {
					break;
				}
			}
		}
		result
	}

	/// Trims `path` in the authoritative hierarchy and in each masked one.
	pub fn trim_with_mask(&self, mask: ControllerMask, path: &str, delete_root: bool) -> Result<()> {
		self.trim(PRIMARY, path, delete_root)?;
		for (name, set) in mask.iter() {
			if set {
				if let Err(e) = self.trim(Some(name), path, delete_root) {
					log::debug!("Failed to trim {name}:{path}: {e}");
				}
			}
		}
		Ok(())
	}

	/// Which secondary hierarchies are mounted right now.
	pub fn mask_supported(&self) -> ControllerMask {
		ControllerMask::from_names(MASK_CONTROLLERS.into_iter().filter(|name| self.hierarchy_exists(name)))
	}

	/// Cleans up a user-supplied controller list.
	///
	/// Drops the authoritative hierarchy, invalid names and hierarchies that
	/// are not mounted, then removes duplicates, keeping the first of each.
	pub fn shorten_controllers<S: AsRef<str>>(&self, controllers: &[S]) -> Vec<String> {
		let mut out: Vec<String> = Vec::with_capacity(controllers.len());
		for name in controllers {
			let name = controller::normalize(name.as_ref());
			if name == SYSTEMD_NAME {
				continue;
			}
			if !controller::is_valid(name, true) {
				log::warn!("Controller {name} is not valid, removing from controllers list.");
				continue;
			}
			if !self.hierarchy_exists(name) {
				log::debug!("Controller {name} is not available, removing from controllers list.");
				continue;
			}
			if !out.iter().any(|seen| seen == name) {
				out.push(name.to_string());
			}
		}
		out
	}
}
