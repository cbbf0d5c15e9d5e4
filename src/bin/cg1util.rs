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

use cg1tools::escape;
use cg1tools::internal;
use cg1tools::CGroup;
use cg1tools::CgroupFs;
use cg1tools::ControllerMask;
use cg1tools::KillOptions;
use cg1tools::Location;
use cg1tools::SystemSignaller;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Manipulates legacy control group (cgroups v1) hierarchies")]
struct Cli {
	/// Where the controller hierarchies are mounted.
	#[arg(long, global = true, default_value = "/sys/fs/cgroup")]
	root: PathBuf,

	/// Where to read per-process control group records.
	#[arg(long = "proc", global = true, default_value = "/proc")]
	proc_root: PathBuf,

	#[command(subcommand)]
	command: Command,
}

#[derive(Args, Debug)]
struct MaskArgs {
	/// Secondary hierarchies that should mirror the group, such as "cpu,memory". Unmounted ones are skipped.
	#[arg(long, value_delimiter = ',')]
	controllers: Vec<String>,
}

#[derive(Args, Debug)]
struct CreateCommand {
	/// Control group spec: "/path", "controller" or "controller:/path". Without a controller the group is mirrored into --controllers.
	#[arg()]
	cgroup: CGroup,

	#[command(flatten)]
	mask: MaskArgs,
}

#[derive(Args, Debug)]
struct ClassifyCommand {
	/// Control group spec: "/path", "controller" or "controller:/path".
	#[arg()]
	cgroup: CGroup,

	/// Process IDs to reclassify.
	#[arg(value_delimiter = ',', required = true)]
	pids: Vec<i32>,

	/// Create the control group if it doesn't exist yet.
	#[arg(long)]
	auto: bool,

	#[command(flatten)]
	mask: MaskArgs,
}

#[derive(Args, Debug)]
struct KillCommand {
	/// Control group spec: "/path", "controller" or "controller:/path".
	#[arg()]
	cgroup: CGroup,

	/// Signal to send, by name ("TERM", "SIGKILL") or number.
	#[arg(short, long, default_value = "SIGTERM", value_parser = parse_signal)]
	signal: Signal,

	/// Escalate from SIGTERM to SIGKILL until the group is empty; ignores --signal.
	#[arg(long)]
	wait: bool,

	/// Remove the group directories afterwards.
	#[arg(long)]
	remove: bool,
}

fn parse_signal(input: &str) -> Result<Signal, String> {
	let upper = input.to_ascii_uppercase();
	if let Ok(number) = upper.parse::<i32>() {
		return Signal::try_from(number).map_err(|e| e.to_string());
	}
	let name = if upper.starts_with("SIG") { upper } else { format!("SIG{upper}") };
	name.parse().map_err(|_| format!("unknown signal {input:?}"))
}

#[derive(Args, Debug)]
struct MigrateCommand {
	/// Control group to empty.
	#[arg()]
	from: CGroup,

	/// Control group to move the processes into.
	#[arg()]
	to: CGroup,

	/// Remove the source directories afterwards. Always done when mirroring.
	#[arg(long)]
	remove: bool,

	#[command(flatten)]
	mask: MaskArgs,
}

#[derive(Args, Debug)]
struct TrimCommand {
	/// Control group spec: "/path", "controller" or "controller:/path".
	#[arg()]
	cgroup: CGroup,

	/// Remove the group itself, not only its descendants.
	#[arg(long)]
	delete_root: bool,

	#[command(flatten)]
	mask: MaskArgs,
}

#[derive(Args, Debug)]
struct ListCommand {
	/// Control group spec: "/path", "controller" or "controller:/path".
	#[arg()]
	cgroup: CGroup,

	/// Include all descendant groups.
	#[arg(short, long)]
	recursive: bool,
}

#[derive(Args, Debug)]
struct DecodeCommand {
	/// Path in the authoritative hierarchy, such as "/user.slice/user-1000.slice/session-1.scope".
	#[arg(required_unless_present = "pid")]
	path: Option<String>,

	/// Decode the control group of this process instead.
	#[arg(long, conflicts_with = "path")]
	pid: Option<i32>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Creates a new control group
	Create(CreateCommand),
	/// Moves running processes to a different control group
	Classify(ClassifyCommand),
	/// Signals every process in a control group and its descendants
	Kill(KillCommand),
	/// Moves every process from one control group subtree to another
	Migrate(MigrateCommand),
	/// Removes the descendants of a control group
	Trim(TrimCommand),
	/// Moves the processes of a control group into its parent and removes it
	Delete {
		#[arg()]
		cgroup: CGroup,
	},
	/// Lists the processes in a control group
	Procs(ListCommand),
	/// Checks whether a control group has no processes
	Empty(ListCommand),
	/// Prints the directory of a control group spec
	Path {
		#[arg()]
		spec: String,
	},
	/// Prints the slice, unit, session, machine and owner encoded in a path
	Decode(DecodeCommand),
	/// Prints which secondary controllers are mounted
	Mask,
}

fn mask_of(cg: &CgroupFs, args: &MaskArgs) -> ControllerMask {
	let names = cg.shorten_controllers(&args.controllers);
	ControllerMask::from_names(names.iter().map(String::as_str))
}

fn print_procs(cg: &CgroupFs, controller: Option<&str>, path: &str, recursive: bool) -> cg1tools::Result<()> {
	match cg.processes(controller, path) {
		Ok(procs) => {
			for pid in procs {
				println!("{path}\t{}", pid?);
			}
		}
		Err(e) if e.is_not_found() => return Ok(()),
		Err(e) => return Err(e),
	}
	if recursive {
		for name in cg.subgroups(controller, path)? {
			print_procs(cg, controller, &cg1tools::path::join(path, &name?), true)?;
		}
	}
	Ok(())
}

fn print_decoded(path: &str) {
	let fields = [
		("slice", escape::path_to_slice(path)),
		("unit", escape::path_to_unit(path)),
		("user-unit", escape::path_to_user_unit(path)),
		("session", escape::path_to_session(path)),
		("machine", escape::path_to_machine_name(path)),
		("owner", escape::path_to_owner_uid(path).map(|uid| uid.to_string())),
	];
	println!("path: {path}");
	for (key, value) in fields {
		if let Ok(value) = value {
			println!("{key}: {value}");
		}
	}
}

fn run(cg: &CgroupFs, command: Command) -> cg1tools::Result<()> {
	match command {
		Command::Create(cmd_args) => match cmd_args.cgroup.controller() {
			Some(controller) => {
				cg.create(Some(controller), cmd_args.cgroup.path())?;
			}
			None => {
				cg.create_with_mask(mask_of(cg, &cmd_args.mask), cmd_args.cgroup.path())?;
			}
		},
		Command::Classify(cmd_args) => {
			let cgroup = &cmd_args.cgroup;
			let mask = mask_of(cg, &cmd_args.mask);
			if cmd_args.auto {
				match cgroup.controller() {
					Some(controller) => cg.create(Some(controller), cgroup.path())?,
					None => cg.create_with_mask(mask, cgroup.path())?,
				};
			}
			for pid in cmd_args.pids.into_iter().map(Pid::from_raw) {
				match cgroup.controller() {
					Some(controller) => cg.attach(Some(controller), cgroup.path(), pid)?,
					None => cg.attach_with_mask(mask, cgroup.path(), pid)?,
				}
			}
		}
		Command::Kill(cmd_args) => {
			let cgroup = &cmd_args.cgroup;
			if cmd_args.wait {
				if !cg.terminate_and_wait(
					cgroup.controller(),
					cgroup.path(),
					Some(nix::unistd::getpid()),
					cmd_args.remove,
					&SystemSignaller,
				)? {
					eprintln!("{cgroup} still has processes");
				}
			} else {
				let opts = KillOptions {
					signal: Some(cmd_args.signal),
					sigcont: true,
					ignore: Some(nix::unistd::getpid()),
					remove: cmd_args.remove,
				};
				let mut seen = HashSet::new();
				cg.kill_recursive(cgroup.controller(), cgroup.path(), &opts, &mut seen, &SystemSignaller)?;
				log::info!("Signalled {} process(es) in {cgroup}", seen.len());
			}
		}
		Command::Migrate(cmd_args) => {
			let (from, to) = (&cmd_args.from, &cmd_args.to);
			if cmd_args.mask.controllers.is_empty() {
				cg.migrate_recursive(
					Location::new(from.controller(), from.path()),
					Location::new(to.controller(), to.path()),
					Some(nix::unistd::getpid()),
					cmd_args.remove,
				)?;
			} else {
				cg.migrate_with_mask(mask_of(cg, &cmd_args.mask), from.path(), to.path())?;
			}
		}
		Command::Trim(cmd_args) => {
			let cgroup = &cmd_args.cgroup;
			match cgroup.controller() {
				Some(controller) => cg.trim(Some(controller), cgroup.path(), cmd_args.delete_root)?,
				None => cg.trim_with_mask(mask_of(cg, &cmd_args.mask), cgroup.path(), cmd_args.delete_root)?,
			}
		}
		Command::Delete { cgroup } => {
			cg.delete(cgroup.controller(), cgroup.path())?;
		}
		Command::Procs(cmd_args) => {
			let cgroup = &cmd_args.cgroup;
			print_procs(cg, cgroup.controller(), cgroup.path(), cmd_args.recursive)?;
		}
		Command::Empty(cmd_args) => {
			let cgroup = &cmd_args.cgroup;
			let empty = if cmd_args.recursive {
				cg.is_empty_recursive(cgroup.controller(), cgroup.path(), None)?
			} else {
				cg.is_empty(cgroup.controller(), cgroup.path(), None)?
			};
			println!("{empty}");
		}
		Command::Path { spec } => {
			println!("{}", cg.mangle(&spec)?.display());
		}
		Command::Decode(cmd_args) => {
			let path = match cmd_args.path {
				Some(path) => path,
				None => cg.pid_get_path_shifted(Pid::from_raw(cmd_args.pid.unwrap_or_default()))?.1,
			};
			print_decoded(&path);
		}
		Command::Mask => {
			println!("{}", cg.mask_supported());
		}
	}
	Ok(())
}

fn main() -> ExitCode {
	let args = Cli::parse();
	let cg = CgroupFs::new(&args.root).with_proc_root(&args.proc_root);
	internal::os_check(&cg, &args);
	match run(&cg, args.command) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("cg1util: {e}");
			ExitCode::FAILURE
		}
	}
}

#[cfg(test)]
fn cli(input: &str) -> Result<Command, clap::error::ErrorKind> {
	Cli::try_parse_from(shlex::split(input).unwrap()).map(|args| args.command).map_err(|e| e.kind())
}

#[test]
fn test_cli_create() {
	assert!(cli("cg1util").is_err());
	insta::assert_debug_snapshot!(cli("cg1util xyz"), @r"
	Err(
	    InvalidSubcommand,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util create"), @r"
	Err(
	    MissingRequiredArgument,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util create cpu-set:/a"), @r"
	Err(
	    ValueValidation,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util create /a extra"), @r"
	Err(
	    UnknownArgument,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util create //a/b --controllers cpu,memory"), @r#"
	Ok(
	    Create(
	        CreateCommand {
	            cgroup: CGroup {
	                controller: None,
	                path: "/a/b",
	            },
	            mask: MaskArgs {
	                controllers: [
	                    "cpu",
	                    "memory",
	                ],
	            },
	        },
	    ),
	)
	"#);
	insta::assert_debug_snapshot!(cli("cg1util --root /tmp/cg create name=systemd:/x"), @r#"
	Ok(
	    Create(
	        CreateCommand {
	            cgroup: CGroup {
	                controller: Some(
	                    "systemd",
	                ),
	                path: "/x",
	            },
	            mask: MaskArgs {
	                controllers: [],
	            },
	        },
	    ),
	)
	"#);

	let args = Cli::try_parse_from(["cg1util", "create", "/x", "--root", "/tmp/cg", "--proc", "/tmp/proc"]).unwrap();
	assert_eq!(args.root, PathBuf::from("/tmp/cg"));
	assert_eq!(args.proc_root, PathBuf::from("/tmp/proc"));
}

#[test]
fn test_cli_classify() {
	insta::assert_debug_snapshot!(cli("cg1util classify /grp"), @r"
	Err(
	    MissingRequiredArgument,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util classify /grp pid"), @r"
	Err(
	    ValueValidation,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util classify /grp 123,456 --auto"), @r#"
	Ok(
	    Classify(
	        ClassifyCommand {
	            cgroup: CGroup {
	                controller: None,
	                path: "/grp",
	            },
	            pids: [
	                123,
	                456,
	            ],
	            auto: true,
	            mask: MaskArgs {
	                controllers: [],
	            },
	        },
	    ),
	)
	"#);
	let Ok(Command::Classify(cmd)) = cli("cg1util classify --auto /grp 123 456") else {
		panic!("expected classify");
	};
	assert_eq!(cmd.pids, [123, 456]);
	assert!(cmd.auto);
}

#[test]
fn test_cli_kill() {
	insta::assert_debug_snapshot!(cli("cg1util kill cpu:/grp --wait"), @r#"
	Ok(
	    Kill(
	        KillCommand {
	            cgroup: CGroup {
	                controller: Some(
	                    "cpu",
	                ),
	                path: "/grp",
	            },
	            signal: SIGTERM,
	            wait: true,
	            remove: false,
	        },
	    ),
	)
	"#);
	for input in ["cg1util kill /grp -s KILL", "cg1util kill /grp --signal sigkill", "cg1util kill /grp -s 9"] {
		let Ok(Command::Kill(cmd)) = cli(input) else {
			panic!("expected kill for {input:?}");
		};
		assert_eq!(cmd.signal, Signal::SIGKILL);
	}
	insta::assert_debug_snapshot!(cli("cg1util kill /grp -s bogus"), @r"
	Err(
	    ValueValidation,
	)
	");
}

#[test]
fn test_cli_decode() {
	insta::assert_debug_snapshot!(cli("cg1util decode"), @r"
	Err(
	    MissingRequiredArgument,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util decode /a.slice --pid 1"), @r"
	Err(
	    ArgumentConflict,
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util decode --pid 1"), @r"
	Ok(
	    Decode(
	        DecodeCommand {
	            path: None,
	            pid: Some(
	                1,
	            ),
	        },
	    ),
	)
	");
	insta::assert_debug_snapshot!(cli("cg1util migrate /a /b --remove"), @r#"
	Ok(
	    Migrate(
	        MigrateCommand {
	            from: CGroup {
	                controller: None,
	                path: "/a",
	            },
	            to: CGroup {
	                controller: None,
	                path: "/b",
	            },
	            remove: true,
	            mask: MaskArgs {
	                controllers: [],
	            },
	        },
	    ),
	)
	"#);
	insta::assert_debug_snapshot!(cli("cg1util mask"), @r"
	Ok(
	    Mask,
	)
	");
}
