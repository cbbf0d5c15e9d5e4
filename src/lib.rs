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

//! This package manages legacy Control Groups (also known as cgroups v1) in the Linux kernel on behalf of a process supervisor.
//!
//! With cgroups v1 every controller (`cpu`, `memory`, `blkio`, ...) has its own hierarchy below `/sys/fs/cgroup`.
//! The supervisor keeps its own named hierarchy (`name=systemd`) as the source of truth, and this crate keeps the
//! controller hierarchies in step with it:
//!
//! - resolving spec strings such as `cpu:/system.slice` to directories ([`CgroupFs::path`], [`parse_spec`]);
//! - listing and killing the processes of a subtree, even while they fork ([`CgroupFs::terminate_and_wait`]);
//! - moving processes between groups ([`CgroupFs::migrate_recursive`]);
//! - mirroring create, attach, migrate and trim across hierarchies with a [`ControllerMask`];
//! - decoding slice, unit, session and machine names from paths ([`escape`]).
//!
//! All operations are synchronous and hang off a [`CgroupFs`].
//!
//! The `cg1util` binary exposes most of this for use by hand.

mod cgroup;
pub mod controller;
mod enumerate;
mod error;
pub mod escape;
mod kill;
mod manage;
mod mask;
mod migrate;
pub mod path;
mod proc;
mod root;
mod tally;
pub mod unit;

#[doc(hidden)]
pub mod internal;

pub use cgroup::format_spec;
pub use cgroup::parse_spec;
pub use cgroup::CGroup;
pub use controller::ControllerMask;
pub use enumerate::Processes;
pub use enumerate::Subgroups;
pub use error::Error;
pub use error::Result;
pub use kill::KillOptions;
pub use kill::Signaller;
pub use kill::SystemSignaller;
pub use manage::controller_from_attr;
pub use migrate::Location;
pub use root::CgroupFs;
