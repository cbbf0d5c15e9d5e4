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

use crate::error::Error;
use crate::error::Result;

/// Running outcome of a recursive kill or migrate pass.
///
/// The first error sticks. Until one is recorded, any action upgrades the
/// outcome from "nothing to do" to "acted".
#[derive(Debug, Default)]
pub(crate) struct Tally {
	acted: bool,
	error: Option<Error>,
}

impl Tally {
	pub fn act(&mut self) {
		if self.error.is_none() {
			self.acted = true;
		}
	}

	pub fn fail(&mut self, error: Error) {
		if self.error.is_none() {
			self.error = Some(error);
		}
	}

	pub fn has_failed(&self) -> bool {
		self.error.is_some()
	}

	/// Folds in the outcome of a nested pass.
	pub fn merge(&mut self, other: Result<bool>) {
		match other {
			Ok(true) => self.act(),
			Ok(false) => {}
			Err(e) => self.fail(e),
		}
	}

	pub fn finish(self) -> Result<bool> {
		match self.error {
			Some(e) => Err(e),
			None => Ok(self.acted),
		}
	}
}

impl From<Result<bool>> for Tally {
	fn from(result: Result<bool>) -> Self {
		let mut tally = Tally::default();
		tally.merge(result);
		tally
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_first_error_sticks() {
		let mut tally = Tally::default();
		tally.fail(Error::invalid("first"));
		tally.act();
		tally.fail(Error::invalid("second"));
		match tally.finish() {
			Err(Error::InvalidArgument(msg)) => assert_eq!(msg, "first"),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn test_action_overrides_idle() {
		let mut tally = Tally::from(Ok(false));
		tally.merge(Ok(false));
		assert!(!tally.finish().unwrap());

		let mut tally = Tally::from(Ok(false));
		tally.merge(Ok(true));
		tally.merge(Ok(false));
		assert!(tally.finish().unwrap());
	}
}
