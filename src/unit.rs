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

//! Lexical rules for unit names such as `getty@tty1.service` or `user-1000.slice`.

const UNIT_NAME_MAX: usize = 256;

const UNIT_SUFFIXES: &[&str] = &[
	"service", "socket", "busname", "target", "device", "mount", "automount", "swap", "timer", "path", "slice",
	"scope", "snapshot",
];

fn valid_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_' | '.' | '\\')
}

/// True for a complete unit name: `prefix[@instance].suffix`. Templates are rejected.
pub fn is_valid(name: &str) -> bool {
	if name.is_empty() || name.len() > UNIT_NAME_MAX {
		return false;
	}
	let Some((stem, suffix)) = name.rsplit_once('.') else {
		return false;
	};
	if !UNIT_SUFFIXES.contains(&suffix) {
		return false;
	}
	let (prefix, instance) = match stem.split_once('@') {
		Some((prefix, instance)) => (prefix, Some(instance)),
		None => (stem, None),
	};
	if prefix.is_empty() || !prefix.chars().all(valid_char) {
		return false;
	}
	match instance {
		Some(instance) => !instance.is_empty() && instance.chars().all(valid_char),
		None => true,
	}
}

/// The part of a unit name before the instance marker or, failing that, the suffix.
pub fn to_prefix(name: &str) -> &str {
	if let Some((prefix, _)) = name.split_once('@') {
		return prefix;
	}
	name.rsplit_once('.').map_or(name, |(prefix, _)| prefix)
}
