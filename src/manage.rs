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
use crate::enumerate::MAX_DEPTH;
use crate::error::Error;
use crate::error::Result;
use crate::path;
use crate::CgroupFs;
use nix::unistd::Gid;
use nix::unistd::Pid;
use nix::unistd::Uid;
use std::fs;
use std::fs::DirBuilder;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const DIR_MODE: u32 = 0o755;

fn write_line(path: &Path, value: &str) -> Result<()> {
	fs::write(path, format!("{value}\n")).map_err(|e| Error::io(path, e))
}

fn read_one_line(path: &Path) -> Result<String> {
	let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
	Ok(contents.lines().next().unwrap_or_default().trim().to_string())
}

fn chmod_and_chown(path: &Path, mode: Option<u32>, uid: Option<Uid>, gid: Option<Gid>) -> Result<()> {
	if let Some(mode) = mode {
		fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| Error::io(path, e))?;
	}
	if uid.is_some() || gid.is_some() {
		nix::unistd::chown(path, uid, gid).map_err(|errno| Error::io(path, io::Error::from(errno)))?;
	}
	Ok(())
}

/// Removes every directory below `dir`, deepest first, staying on one filesystem.
fn trim_below(dir: &Path, dev: u64, depth: usize) -> io::Result<()> {
	if depth > MAX_DEPTH {
		return Ok(());
	}
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		// file_type() does not follow symlinks
		if !entry.file_type()?.is_dir() {
			continue;
		}
		let child = entry.path();
		if entry.metadata()?.dev() != dev {
			continue;
		}
		if let Err(e) = trim_below(&child, dev, depth + 1) {
			log::debug!("Failed to trim {}: {e}", child.display());
		}
		if let Err(e) = fs::remove_dir(&child) {
			log::debug!("Failed to remove {}: {e}", child.display());
		}
	}
	Ok(())
}

impl CgroupFs {
	/// Removes one empty group directory. A missing directory is not an error.
	pub fn rmdir(&self, controller: Option<&str>, path: &str) -> Result<()> {
		let fs = self.path(Some(controller::or_default(controller)), Some(path), None)?;
		match fs::remove_dir(&fs) {
			Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::io(fs, e)),
			_ => Ok(()),
		}
	}

	/// Creates a group and any missing ancestors. Returns `false` if it already existed.
	pub fn create(&self, controller: Option<&str>, path: &str) -> Result<bool> {
		let fs = self.path_and_check(controller::or_default(controller), Some(path), None)?;
		if let Some(parent) = fs.parent() {
			DirBuilder::new()
				.recursive(true)
				.mode(DIR_MODE)
				.create(parent)
				.map_err(|e| Error::io(parent, e))?;
		}
		match DirBuilder::new().mode(DIR_MODE).create(&fs) {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists && fs.is_dir() => Ok(false),
			Err(e) => Err(Error::io(fs, e)),
		}
	}

	pub fn create_and_attach(&self, controller: Option<&str>, path: &str, pid: Pid) -> Result<bool> {
		let created = self.create(controller, path)?;
		self.attach(controller, path, pid)?;
		Ok(created)
	}

	/// Moves a process into a group. Pid 0 means the calling process.
	pub fn attach(&self, controller: Option<&str>, path: &str, pid: Pid) -> Result<()> {
		let fs = self.path_and_check(controller::or_default(controller), Some(path), Some("cgroup.procs"))?;
		let pid = if pid.as_raw() == 0 { nix::unistd::getpid() } else { pid };
		let mut file = OpenOptions::new().append(true).open(&fs).map_err(|e| Error::io(&fs, e))?;
		file.write_all(format!("{pid}\n").as_bytes()).map_err(|e| Error::io(&fs, e))
	}

	/// Removes all descendants of a group, and with `delete_root` the group itself.
	///
	/// Busy descendants are skipped. Mount points and symlinks are not followed.
	pub fn trim(&self, controller: Option<&str>, path: &str, delete_root: bool) -> Result<()> {
		let fs = self.path(Some(controller::or_default(controller)), Some(path), None)?;
		let walked = fs::metadata(&fs).and_then(|meta| trim_below(&fs, meta.dev(), 0));
		if delete_root {
			if let Err(e) = fs::remove_dir(&fs) {
				if e.kind() != io::ErrorKind::NotFound {
					return Err(Error::io(fs, e));
				}
			}
		}
		walked.map_err(|e| Error::io(fs, e))
	}

	/// Writes `value` to an attribute file such as `cpu.shares`.
	pub fn set_attribute(&self, controller: Option<&str>, path: &str, attribute: &str, value: &str) -> Result<()> {
		let fs = self.path(Some(controller::or_default(controller)), Some(path), Some(attribute))?;
		fs::write(&fs, value).map_err(|e| Error::io(fs, e))
	}

	/// Sets permissions and ownership of the group directory itself.
	pub fn set_group_access(
		&self,
		controller: Option<&str>,
		path: &str,
		mode: Option<u32>,
		uid: Option<Uid>,
		gid: Option<Gid>,
	) -> Result<()> {
		let fs = self.path(Some(controller::or_default(controller)), Some(path), None)?;
		chmod_and_chown(&fs, mode.map(|m| m & 0o777), uid, gid)
	}

	/// Sets permissions and ownership of the member lists, so others may move processes in.
	pub fn set_task_access(
		&self,
		controller: Option<&str>,
		path: &str,
		mode: Option<u32>,
		uid: Option<Uid>,
		gid: Option<Gid>,
	) -> Result<()> {
		if mode.is_none() && uid.is_none() && gid.is_none() {
			return Ok(());
		}
		let controller = Some(controller::or_default(controller));
		let mode = mode.map(|m| m & 0o666);
		let procs = self.path(controller, Some(path), Some("cgroup.procs"))?;
		chmod_and_chown(&procs, mode, uid, gid)?;
		// "tasks" is kept in sync with "cgroup.procs"
		let tasks = self.path(controller, Some(path), Some("tasks"))?;
		chmod_and_chown(&tasks, mode, uid, gid)
	}

	/// Installs `agent` as the release agent and turns on release notification.
	///
	/// Returns `true` if notification had to be switched on. Fails with
	/// [`Error::AlreadyExists`] if a different agent is installed.
	pub fn install_release_agent(&self, controller: Option<&str>, agent: &str) -> Result<bool> {
		let controller = Some(controller::or_default(controller));
		let fs = self.path(controller, None, Some("release_agent"))?;
		let current = read_one_line(&fs)?;
		if current.is_empty() {
			write_line(&fs, agent)?;
		} else if current != agent {
			return Err(Error::AlreadyExists(current));
		}

		let fs = self.path(controller, None, Some("notify_on_release"))?;
		match read_one_line(&fs)?.as_str() {
			"0" => {
				write_line(&fs, "1")?;
				Ok(true)
			}
			"1" => Ok(false),
			other => Err(Error::Format {
				path: fs,
				reason: format!("expected 0 or 1, found {other:?}"),
			}),
		}
	}

	pub fn uninstall_release_agent(&self, controller: Option<&str>) -> Result<()> {
		let controller = Some(controller::or_default(controller));
		write_line(&self.path(controller, None, Some("notify_on_release"))?, "0")?;
		write_line(&self.path(controller, None, Some("release_agent"))?, "")
	}
}

/// The controller an attribute file belongs to, e.g. `cpu` for `cpu.shares`.
///
/// Attributes without a dot, such as `tasks`, belong to no controller.
pub fn controller_from_attr(attr: &str) -> Result<Option<String>> {
	if !path::filename_is_safe(attr) {
		return Err(Error::invalid(format!("attribute {attr:?}")));
	}
	let Some((c, _)) = attr.split_once('.') else {
		return Ok(None);
	};
	if !controller::is_valid(c, false) {
		return Err(Error::invalid(format!("controller {c:?} in attribute {attr:?}")));
	}
	Ok(Some(c.to_string()))
}
