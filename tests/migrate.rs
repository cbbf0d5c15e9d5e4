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

use cg1tools::CgroupFs;
use cg1tools::Error;
use cg1tools::Location;
use nix::unistd::Pid;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn fake() -> (TempDir, CgroupFs) {
	let tmp = tempfile::tempdir().unwrap();
	fs::create_dir_all(tmp.path().join("systemd")).unwrap();
	fs::create_dir_all(tmp.path().join("cpu")).unwrap();
	let cg = CgroupFs::new(tmp.path()).assume_mounted();
	(tmp, cg)
}

fn write_procs(root: &Path, group: &str, pids: &[i32]) {
	let dir = root.join(group.trim_start_matches('/'));
	fs::create_dir_all(&dir).unwrap();
	let contents: String = pids.iter().map(|pid| format!("{pid}\n")).collect();
	fs::write(dir.join("cgroup.procs"), contents).unwrap();
}

fn read_procs(root: &Path, group: &str) -> Vec<i32> {
	let contents = fs::read_to_string(root.join(group.trim_start_matches('/')).join("cgroup.procs")).unwrap();
	let mut pids: Vec<i32> = contents.lines().map(|line| line.parse().unwrap()).collect();
	pids.sort();
	pids
}

#[test]
fn test_migrate_recursive() {
	let (tmp, cg) = fake();
	let root = tmp.path();
	write_procs(root, "systemd/src", &[1, 2]);
	write_procs(root, "systemd/src/child", &[3, 2]);
	fs::create_dir_all(root.join("systemd/src/empty")).unwrap();
	write_procs(root, "systemd/dst", &[]);

	let moved = cg.migrate_recursive(Location::new(None, "/src"), Location::new(None, "/dst"), None, true).unwrap();
	assert!(moved);
	assert_eq!(read_procs(root, "systemd/dst"), [1, 2, 3]);
	assert!(!root.join("systemd/src/empty").exists());
	assert!(root.join("systemd/src/child").exists());
}

#[test]
fn test_migrate_across_hierarchies() {
	let (tmp, cg) = fake();
	let root = tmp.path();
	write_procs(root, "systemd/src", &[4, 5]);
	write_procs(root, "cpu/x", &[]);

	let from = Location::new(None, "/src");
	let to = Location::new(Some("cpu"), "/x");
	assert!(cg.migrate_recursive(from, to, Some(Pid::from_raw(5)), false).unwrap());
	assert_eq!(read_procs(root, "cpu/x"), [4]);
	assert_eq!(read_procs(root, "systemd/src"), [4, 5]);
}

#[test]
fn test_migrate_missing_groups() {
	let (tmp, cg) = fake();
	let root = tmp.path();
	write_procs(root, "systemd/dst", &[]);
	let moved = cg.migrate_recursive(Location::new(None, "/missing"), Location::new(None, "/dst"), None, true);
	assert!(!moved.unwrap());

	write_procs(root, "systemd/src", &[7]);
	let err = cg
		.migrate_recursive(Location::new(None, "/src"), Location::new(None, "/nowhere"), None, false)
		.unwrap_err();
	assert!(err.is_not_found());
}

#[test]
fn test_migrate_recursive_child_error_wins() {
	let (tmp, cg) = fake();
	let root = tmp.path();
	write_procs(root, "systemd/src", &[1]);
	fs::create_dir_all(root.join("systemd/src/child")).unwrap();
	fs::write(root.join("systemd/src/child/cgroup.procs"), "garbage\n").unwrap();
	write_procs(root, "systemd/dst", &[]);

	let err = cg
		.migrate_recursive(Location::new(None, "/src"), Location::new(None, "/dst"), None, false)
		.unwrap_err();
	assert!(matches!(err, Error::Format { .. }));
	assert_eq!(read_procs(root, "systemd/dst"), [1]);
}

#[test]
fn test_delete() {
	let (tmp, cg) = fake();
	let root = tmp.path();
	write_procs(root, "systemd/p", &[]);
	write_procs(root, "systemd/p/q", &[7]);
	fs::create_dir_all(root.join("systemd/p/q/r")).unwrap();

	assert!(cg.delete(None, "/p/q").unwrap());
	assert_eq!(read_procs(root, "systemd/p"), [7]);
	assert!(!root.join("systemd/p/q/r").exists());

	assert!(!cg.delete(None, "/missing").unwrap());
	assert!(cg.delete(None, "/").is_err());
}
