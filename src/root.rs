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
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;

pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Handle on a legacy cgroup filesystem: one directory per controller below a root.
///
/// Every operation in this crate hangs off a `CgroupFs`. Use [`CgroupFs::system`]
/// for the real thing; tests build their own over a temporary directory.
#[derive(Debug)]
pub struct CgroupFs {
	root: PathBuf,
	proc_root: PathBuf,
	mounted: AtomicBool,
}

impl CgroupFs {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
			mounted: AtomicBool::new(false),
		}
	}

	/// The process-wide handle on `/sys/fs/cgroup`; the mount check runs at most once.
	pub fn system() -> &'static CgroupFs {
		static SYSTEM: OnceLock<CgroupFs> = OnceLock::new();
		SYSTEM.get_or_init(|| CgroupFs::new(DEFAULT_CGROUP_ROOT))
	}

	/// Reads per-process records from `proc_root` instead of `/proc`.
	pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
		self.proc_root = proc_root.into();
		self
	}

	/// Skips the mount point check, e.g. for a fake hierarchy in a temp dir.
	pub fn assume_mounted(self) -> Self {
		self.mounted.store(true, Ordering::Release);
		self
	}

	pub fn reset_mount_check(&self) {
		self.mounted.store(false, Ordering::Release);
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn proc_root(&self) -> &Path {
		&self.proc_root
	}

	/// Fails with [`Error::NotAvailable`] unless the root is a mount point.
	pub fn verify_mounted(&self) -> Result<()> {
		if self.mounted.load(Ordering::Acquire) {
			return Ok(());
		}
		let here = fs::metadata(&self.root).map_err(|e| Error::io(&self.root, e))?;
		let up = fs::metadata(self.root.join("..")).map_err(|e| Error::io(&self.root, e))?;
		// "/" is its own parent
		let is_mount = here.dev() != up.dev() || here.ino() == up.ino();
		if !is_mount {
			return Err(Error::NotAvailable(format!("cgroup root {}", self.root.display())));
		}
		self.mounted.store(true, Ordering::Release);
		Ok(())
	}

	/// True if the hierarchy directory for `controller` exists under the root.
	pub fn hierarchy_exists(&self, controller: &str) -> bool {
		self.root.join(controller).exists()
	}

	fn check_hierarchy(&self, normalized: &str) -> Result<()> {
		if self.hierarchy_exists(normalized) {
			Ok(())
		} else {
			Err(Error::NotAvailable(format!("controller {normalized}")))
		}
	}

	fn join(&self, controller: Option<&str>, path: Option<&str>, suffix: Option<&str>) -> Result<PathBuf> {
		let controller = controller.filter(|s| !s.is_empty());
		let path = path.filter(|s| !s.is_empty());
		let suffix = suffix.filter(|s| !s.is_empty());
		let joined = match (controller, path, suffix) {
			(Some(c), p, s) => {
				let mut out = format!("{}/{c}", self.root.display());
				for part in [p, s].into_iter().flatten() {
					out.push('/');
					out.push_str(part);
				}
				out
			}
			(None, Some(p), Some(s)) => format!("{p}/{s}"),
			(None, Some(p), None) => p.to_string(),
			(None, None, _) => return Err(Error::invalid("need a controller or a path")),
		};
		Ok(PathBuf::from(path::normalize(&joined)))
	}

	/// Resolves a control group to its location on disk.
	///
	/// With a controller, the result is `<root>/<controller>/<path>/<suffix>`.
	/// Without one, `path` is taken to already be a filesystem path.
	pub fn path(&self, controller: Option<&str>, path: Option<&str>, suffix: Option<&str>) -> Result<PathBuf> {
		if let Some(c) = controller {
			if !controller::is_valid(c, true) {
				return Err(Error::invalid(format!("controller {c:?}")));
			}
		}
		self.verify_mounted()?;
		self.join(controller.map(controller::normalize), path, suffix)
	}

	/// Like [`CgroupFs::path`], but also requires the controller's hierarchy to be mounted.
	pub fn path_and_check(&self, controller: &str, path: Option<&str>, suffix: Option<&str>) -> Result<PathBuf> {
		if !controller::is_valid(controller, true) {
			return Err(Error::invalid(format!("controller {controller:?}")));
		}
		let normalized = controller::normalize(controller);
		self.check_hierarchy(normalized)?;
		self.join(Some(normalized), path, suffix)
	}

	/// Accepts either a path below the root or a spec string, and returns the former.
	pub fn mangle(&self, path_or_spec: &str) -> Result<PathBuf> {
		let under_root = path::strip_prefix(path_or_spec, &self.root.to_string_lossy()).is_some();
		if path::is_absolute(path_or_spec) && path::is_safe(path_or_spec) && under_root {
			return Ok(PathBuf::from(path::normalize(path_or_spec)));
		}
		let (c, p) = parse_spec(path_or_spec)?;
		self.path(
			Some(c.as_deref().unwrap_or(controller::SYSTEMD_CGROUP_CONTROLLER)),
			Some(p.as_deref().unwrap_or("/")),
			None,
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fake() -> (tempfile::TempDir, CgroupFs) {
		let tmp = tempfile::tempdir().unwrap();
		fs::create_dir_all(tmp.path().join("systemd")).unwrap();
		fs::create_dir_all(tmp.path().join("cpu")).unwrap();
		let cg = CgroupFs::new(tmp.path()).assume_mounted();
		(tmp, cg)
	}

	#[test]
	fn test_path_combinations() {
		let (tmp, cg) = fake();
		let root = tmp.path();
		assert_eq!(cg.path(Some("cpu"), None, None).unwrap(), root.join("cpu"));
		assert_eq!(cg.path(Some("cpu"), Some("/a//b/"), None).unwrap(), root.join("cpu/a/b"));
		assert_eq!(cg.path(Some("cpu"), None, Some("tasks")).unwrap(), root.join("cpu/tasks"));
		assert_eq!(
			cg.path(Some("name=systemd"), Some("/a"), Some("cgroup.procs")).unwrap(),
			root.join("systemd/a/cgroup.procs")
		);
		assert_eq!(cg.path(None, Some("/x//y"), Some("z")).unwrap(), PathBuf::from("/x/y/z"));
		assert_eq!(cg.path(None, Some("/x"), None).unwrap(), PathBuf::from("/x"));
		assert!(matches!(cg.path(None, None, Some("z")), Err(Error::InvalidArgument(_))));
		assert!(matches!(cg.path(Some("cpu-set"), Some("/"), None), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn test_path_round_trips() {
		let (tmp, cg) = fake();
		for (controller, p) in [("cpu", "/a/b"), ("name=systemd", "/user.slice/x.scope"), ("memory", "/")] {
			let resolved = cg.path(Some(controller), Some(p), None).unwrap();
			let rel = resolved.strip_prefix(tmp.path()).unwrap().to_str().unwrap().to_string();
			let (c, rest) = rel.split_once('/').unwrap_or((&rel, ""));
			assert_eq!(c, controller::normalize(controller));
			assert_eq!(format!("/{rest}"), p);
		}
	}

	#[test]
	fn test_path_and_check() {
		let (tmp, cg) = fake();
		assert_eq!(cg.path_and_check("cpu", Some("/a"), None).unwrap(), tmp.path().join("cpu/a"));
		assert!(matches!(cg.path_and_check("memory", Some("/a"), None), Err(Error::NotAvailable(_))));
		assert!(matches!(cg.path_and_check("bad name", None, None), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn test_mount_check() {
		let tmp = tempfile::tempdir().unwrap();
		let cg = CgroupFs::new(tmp.path());
		assert!(matches!(cg.path(Some("cpu"), Some("/"), None), Err(Error::NotAvailable(_))));

		let cg = CgroupFs::new("/");
		assert_eq!(cg.path(Some("cpu"), Some("/a"), None).unwrap(), PathBuf::from("/cpu/a"));

		let cg = CgroupFs::new(tmp.path()).assume_mounted();
		assert!(cg.path(Some("cpu"), Some("/"), None).is_ok());
		cg.reset_mount_check();
		assert!(cg.path(Some("cpu"), Some("/"), None).is_err());
	}

	#[test]
	fn test_mangle() {
		let (tmp, cg) = fake();
		let root = tmp.path();
		let raw = format!("{}//cpu/x/", root.display());
		assert_eq!(cg.mangle(&raw).unwrap(), root.join("cpu/x"));
		assert_eq!(cg.mangle("cpu:/a").unwrap(), root.join("cpu/a"));
		assert_eq!(cg.mangle("/a/b").unwrap(), root.join("systemd/a/b"));
		assert_eq!(cg.mangle("memory").unwrap(), root.join("memory"));
		assert!(cg.mangle("cpu:relative").is_err());
	}

	#[test]
	fn test_mangle_rejects_relative_paths() {
		let cg = CgroupFs::new("/sys/fs/cgroup").assume_mounted();
		assert_eq!(cg.mangle("/sys/fs/cgroup/cpu/x").unwrap(), PathBuf::from("/sys/fs/cgroup/cpu/x"));
		assert!(matches!(cg.mangle("sys/fs/cgroup/cpu/x"), Err(Error::InvalidArgument(_))));
		assert!(matches!(cg.mangle("/sys/fs/cgroup/../../etc"), Err(Error::InvalidArgument(_))));
	}
}
