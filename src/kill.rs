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

//! Killing every process in a control group subtree.

use crate::enumerate::check_depth;
use crate::error::Error;
use crate::error::Result;
use crate::path;
use crate::tally::Tally;
use crate::CgroupFs;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

const TERMINATE_ROUNDS: usize = 15;
const KILL_ROUND: usize = 9;
const ROUND_INTERVAL: Duration = Duration::from_millis(200);

/// Delivers signals to processes. `None` only probes that the process exists.
pub trait Signaller {
	fn signal(&self, pid: Pid, signal: Option<Signal>) -> nix::Result<()>;
}

/// Sends real signals with kill(2).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSignaller;

impl Signaller for SystemSignaller {
	fn signal(&self, pid: Pid, signal: Option<Signal>) -> nix::Result<()> {
		nix::sys::signal::kill(pid, signal)
	}
}

impl<F> Signaller for F
where
	F: Fn(Pid, Option<Signal>) -> nix::Result<()>,
{
	fn signal(&self, pid: Pid, signal: Option<Signal>) -> nix::Result<()> {
		self(pid, signal)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillOptions {
	/// Signal to send, or `None` to only check which processes remain.
	pub signal: Option<Signal>,
	/// Follow the signal with SIGCONT so stopped processes can act on it.
	pub sigcont: bool,
	/// A process to leave alone, usually the caller.
	pub ignore: Option<Pid>,
	/// Remove each group's directory once it has been visited.
	pub remove: bool,
}

impl KillOptions {
	pub fn new(signal: impl Into<Option<Signal>>) -> Self {
		Self {
			signal: signal.into(),
			sigcont: false,
			ignore: None,
			remove: false,
		}
	}

	fn wants_sigcont(&self) -> bool {
		self.sigcont && !matches!(self.signal, None | Some(Signal::SIGCONT) | Some(Signal::SIGKILL))
	}
}

/// True for rmdir failures that just mean something is still inside.
pub(crate) fn is_busy(error: &Error) -> bool {
	error.is_not_found() || matches!(error.raw_os_error(), Some(e) if e == Errno::EBUSY as i32 || e == Errno::ENOTEMPTY as i32)
}

impl CgroupFs {
	/// Signals every member of one group until no new members turn up.
	///
	/// Processes may fork faster than we signal them, so the member list is
	/// re-read until a full pass finds nobody new. `seen` records everyone
	/// already handled. Returns whether any process was signalled; a group
	/// that vanishes counts as done.
	pub fn kill<S: Signaller + ?Sized>(
		&self,
		controller: Option<&str>,
		path: &str,
		opts: &KillOptions,
		seen: &mut HashSet<Pid>,
		signaller: &S,
	) -> Result<bool> {
		let mut tally = Tally::default();
		loop {
			let mut done = true;
			let procs = match self.processes(controller, path) {
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
				if Some(pid) == opts.ignore || !seen.insert(pid) {
					continue;
				}
				match signaller.signal(pid, opts.signal) {
					Ok(()) => {
						if opts.wants_sigcont() {
							let _ = signaller.signal(pid, Some(Signal::SIGCONT));
						}
						tally.act();
					}
					Err(Errno::ESRCH) => {}
					Err(source) => tally.fail(Error::Signal { pid, source }),
				}
				done = false;
			}
			if done {
				return tally.finish();
			}
		}
	}

	/// [`CgroupFs::kill`] applied to a group and all of its descendants.
	pub fn kill_recursive<S: Signaller + ?Sized>(
		&self,
		controller: Option<&str>,
		path: &str,
		opts: &KillOptions,
		seen: &mut HashSet<Pid>,
		signaller: &S,
	) -> Result<bool> {
		self.kill_recursive_at(controller, path, opts, seen, signaller, 0)
	}

	fn kill_recursive_at<S: Signaller + ?Sized>(
		&self,
		controller: Option<&str>,
		path: &str,
		opts: &KillOptions,
		seen: &mut HashSet<Pid>,
		signaller: &S,
		depth: usize,
	) -> Result<bool> {
		check_depth(depth, path)?;
		let mut tally = Tally::from(self.kill(controller, path, opts, seen, signaller));
		let mut children = match self.subgroups(controller, path) {
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
					let child = path::join(path, &name);
					tally.merge(self.kill_recursive_at(controller, &child, opts, seen, signaller, depth + 1));
				}
				Ok(None) => break,
				Err(e) => {
					tally.fail(e);
					break;
				}
			}
		}
		if opts.remove {
			if let Err(e) = self.rmdir(controller, path) {
				if !is_busy(&e) && !tally.has_failed() {
					return Err(e);
				}
			}
		}
		tally.finish()
	}

	/// Terminates a subtree, escalating from SIGTERM to SIGKILL.
	///
	/// Sends SIGTERM, then re-checks every 200ms; the tenth round sends
	/// SIGKILL and the remaining rounds only check. Returns `true` once the
	/// subtree is empty, or `false` if processes were still there after the
	/// last round. `ignore` is left alone, which callers use for their own pid.
	pub fn terminate_and_wait<S: Signaller + ?Sized>(
		&self,
		controller: Option<&str>,
		path: &str,
		ignore: Option<Pid>,
		remove: bool,
		signaller: &S,
	) -> Result<bool> {
		for round in 0..TERMINATE_ROUNDS {
			let signal = match round {
				0 => Some(Signal::SIGTERM),
				KILL_ROUND => Some(Signal::SIGKILL),
				_ => None,
			};
			let opts = KillOptions {
				signal,
				sigcont: true,
				ignore,
				remove,
			};
			let mut seen = HashSet::new();
			if !self.kill_recursive(controller, path, &opts, &mut seen, signaller)? {
				log::debug!("{path} is empty after {} round(s)", round + 1);
				return Ok(true);
			}
			log::debug!("{path} still has {} process(es) after round {round} ({signal:?})", seen.len());
			thread::sleep(ROUND_INTERVAL);
		}
		Ok(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_wants_sigcont() {
		let mut opts = KillOptions::new(Signal::SIGTERM);
		assert!(!opts.wants_sigcont());
		opts.sigcont = true;
		assert!(opts.wants_sigcont());
		opts.signal = Some(Signal::SIGKILL);
		assert!(!opts.wants_sigcont());
		opts.signal = None;
		assert!(!opts.wants_sigcont());
	}

	#[test]
	fn test_is_busy() {
		use std::io;
		assert!(is_busy(&Error::io("/x", io::Error::from_raw_os_error(Errno::EBUSY as i32))));
		assert!(is_busy(&Error::io("/x", io::Error::from_raw_os_error(Errno::ENOTEMPTY as i32))));
		assert!(is_busy(&Error::io("/x", io::Error::from(io::ErrorKind::NotFound))));
		assert!(!is_busy(&Error::io("/x", io::Error::from_raw_os_error(Errno::EACCES as i32))));
	}
}
