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

use nix::errno::Errno;
use nix::unistd::Pid;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by control group operations.
///
/// Control groups and processes come and go underneath us, so most callers
/// treat [`Error::NotFound`] as "nothing to do" rather than as a failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// The control group, or a file inside it, does not exist.
	#[error("{}: no such control group or file", .0.display())]
	NotFound(PathBuf),

	/// The process has exited or never existed.
	#[error("no such process: {0}")]
	NoSuchProcess(Pid),

	/// Malformed controller name, path, spec string or unit name.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// A release agent is installed with a different value.
	#[error("release agent already set to {0:?}")]
	AlreadyExists(String),

	/// The cgroup root or a controller hierarchy is not mounted.
	#[error("{0} is not available")]
	NotAvailable(String),

	/// A kernel file held something we could not parse.
	#[error("{}: malformed contents: {reason}", .path.display())]
	Format { path: PathBuf, reason: String },

	#[error("{path}: control group tree nested too deeply")]
	TooDeep { path: String },

	#[error("failed to signal process {pid}: {source}")]
	Signal {
		pid: Pid,
		#[source]
		source: Errno,
	},

	#[error("{}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	/// Wraps an I/O error on `path`, folding "not found" into [`Error::NotFound`].
	pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		let path = path.into();
		if source.kind() == io::ErrorKind::NotFound {
			Error::NotFound(path)
		} else {
			Error::Io { path, source }
		}
	}

	pub(crate) fn invalid(msg: impl Into<String>) -> Self {
		Error::InvalidArgument(msg.into())
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Error::NotFound(_))
	}

	/// The errno behind this error, if it came from the kernel.
	pub fn raw_os_error(&self) -> Option<i32> {
		match self {
			Error::Io { source, .. } => source.raw_os_error(),
			Error::Signal { source, .. } => Some(*source as i32),
			_ => None,
		}
	}

	/// True for errors meaning the process went away before we got to it.
	pub(crate) fn is_process_gone(&self) -> bool {
		matches!(self, Error::NoSuchProcess(_)) || self.raw_os_error() == Some(Errno::ESRCH as i32)
	}
}
