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

use crate::CgroupFs;
use std::fmt::Debug;
use std::process;

/// Sets up logging and exits early on hosts without a cgroup v1 tree.
pub fn os_check(cg: &CgroupFs, args: &impl Debug) {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
	log::debug!("{args:?}");
	if !cfg!(target_os = "linux") {
		eprintln!("Control groups are only available on Linux");
		process::exit(1);
	}
	if let Err(e) = cg.verify_mounted() {
		eprintln!("{e}. Is the cgroup v1 filesystem mounted?");
		process::exit(1);
	}
}
