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

//! Looking up which control groups a process belongs to via `/proc/<pid>/cgroup`.

use crate::controller;
use crate::error::Error;
use crate::error::Result;
use crate::escape;
use crate::path;
use crate::CgroupFs;
use nix::unistd::Pid;
use nix::unistd::Uid;
use std::fs;
use std::io;

const SYSTEM_SLICE: &str = "system.slice";

/// Finds the path for `controller` in the contents of a `/proc/<pid>/cgroup` file.
///
/// Each line reads `<id>:<controller>[,<controller>...]:<path>`.
fn find_path(contents: &str, controller: &str) -> Option<String> {
	contents.lines().find_map(|line| {
		let (_, rest) = line.split_once(':')?;
		let (tags, path) = rest.split_once(':')?;
		tags.split(',')
			.any(|tag| tag == controller || tag.strip_prefix("name=") == Some(controller))
			.then(|| path.to_string())
	})
}

impl CgroupFs {
	/// The path of `pid` in one hierarchy; `None` means the authoritative one and pid 0 the caller.
	pub fn pid_get_path(&self, controller: Option<&str>, pid: Pid) -> Result<String> {
		let controller = match controller {
			Some(c) if !controller::is_valid(c, true) => return Err(Error::invalid(format!("controller {c:?}"))),
			Some(c) => controller::normalize(c),
			None => controller::SYSTEMD_CGROUP_CONTROLLER,
		};
		let file = if pid.as_raw() == 0 {
			self.proc_root().join("self/cgroup")
		} else {
			self.proc_root().join(pid.to_string()).join("cgroup")
		};
		let contents = match fs::read_to_string(&file) {
			Ok(contents) => contents,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NoSuchProcess(pid)),
			Err(e) => return Err(Error::io(file, e)),
		};
		find_path(&contents, controller).ok_or(Error::NotFound(file))
	}

	/// The authoritative path of pid 1, minus a trailing `system.slice`.
	///
	/// This is where the supervisor's tree starts, which is not "/" inside a container.
	pub fn root_path(&self) -> Result<String> {
		let p = self.pid_get_path(None, Pid::from_raw(1))?;
		match p.strip_suffix(SYSTEM_SLICE).and_then(|s| s.strip_suffix('/')) {
			Some("") => Ok("/".to_string()),
			Some(root) => Ok(root.to_string()),
			None => Ok(p),
		}
	}

	/// Splits the authoritative path of `pid` into the tree root and the part below it.
	pub fn pid_get_path_shifted(&self, pid: Pid) -> Result<(String, String)> {
		let root = self.root_path()?;
		let full = self.pid_get_path(None, pid)?;
		if root == "/" {
			return Ok((String::new(), full));
		}
		match path::strip_prefix(&full, &root) {
			Some(rest) => Ok((root, format!("/{rest}"))),
			None => Ok((String::new(), full)),
		}
	}

	fn shifted(&self, pid: Pid) -> Result<String> {
		Ok(self.pid_get_path_shifted(pid)?.1)
	}

	pub fn pid_get_unit(&self, pid: Pid) -> Result<String> {
		escape::path_to_unit(&self.shifted(pid)?)
	}

	pub fn pid_get_user_unit(&self, pid: Pid) -> Result<String> {
		escape::path_to_user_unit(&self.shifted(pid)?)
	}

	pub fn pid_get_machine_name(&self, pid: Pid) -> Result<String> {
		escape::path_to_machine_name(&self.shifted(pid)?)
	}

	pub fn pid_get_session(&self, pid: Pid) -> Result<String> {
		escape::path_to_session(&self.shifted(pid)?)
	}

	pub fn pid_get_owner_uid(&self, pid: Pid) -> Result<Uid> {
		escape::path_to_owner_uid(&self.shifted(pid)?)
	}

	pub fn pid_get_slice(&self, pid: Pid) -> Result<String> {
		escape::path_to_slice(&self.shifted(pid)?)
	}
}
