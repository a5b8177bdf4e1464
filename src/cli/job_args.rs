//! Per-unit command lines: one flag per declared tag

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::binding::{PathBinding, PathMap};
use crate::error::{ErrorCode, HearthError, Result};
use crate::job::{Job, UnitRef};
use crate::tag::{Direction, TagKind};

const OVERWRITE: &str = "overwrite";

/// Build a command with a required `--<tag>` flag per tag of the unit
pub fn command_for(unit: &UnitRef) -> Command {
    let mut command = Command::new(unit.name().to_string())
        .no_binary_name(true)
        .about(format!("Run {}", unit.name()));

    for tag in unit.contract().tags() {
        let help = match tag.direction {
            Direction::Input => "input path",
            Direction::Output => "output path",
        };
        let mut arg = Arg::new(tag.name.clone())
            .long(tag.name.clone())
            .value_name("PATH")
            .required(true)
            .help_heading(match tag.direction {
                Direction::Input => "Inputs",
                Direction::Output => "Outputs",
            });
        arg = match tag.kind {
            TagKind::Single => arg.help(help).action(ArgAction::Set),
            TagKind::Set => arg
                .help(format!("{}s (one or more)", help))
                .num_args(1..)
                .action(ArgAction::Append),
        };
        command = command.arg(arg);
    }

    command.arg(
        Arg::new(OVERWRITE)
            .long(OVERWRITE)
            .action(ArgAction::SetTrue)
            .help("Replace outputs that already exist"),
    )
}

/// Help text for a unit's command line
pub fn help_for(unit: &UnitRef) -> String {
    command_for(unit).render_help().to_string()
}

/// Parse tag flags into a validated job instance
pub fn parse_job<I, S>(unit: &UnitRef, args: I) -> Result<Job>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let matches = command_for(unit)
        .try_get_matches_from(args)
        .map_err(|e| {
            HearthError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, e.to_string().trim().to_string())
        })?;

    let mut inputs = PathMap::new();
    let mut outputs = PathMap::new();
    for tag in unit.contract().tags() {
        let binding = binding_for(&matches, &tag.name, tag.kind)?;
        match tag.direction {
            Direction::Input => inputs.insert(tag.name, binding),
            Direction::Output => outputs.insert(tag.name, binding),
        };
    }

    Ok(Job::new(unit.clone(), inputs, outputs)?.with_overwrite(matches.get_flag(OVERWRITE)))
}

fn binding_for(matches: &ArgMatches, tag: &str, kind: TagKind) -> Result<PathBinding> {
    let mut values = matches
        .get_many::<String>(tag)
        .map(|values| values.cloned().collect::<Vec<_>>())
        .unwrap_or_default();

    match kind {
        TagKind::Set => Ok(PathBinding::Set(values)),
        TagKind::Single if values.len() == 1 => Ok(PathBinding::Single(values.remove(0))),
        TagKind::Single => Err(HearthError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("--{} takes exactly one path", tag),
        )),
    }
}

/// Lines announcing a run: the unit and every bound path
pub fn banner(job: &Job) -> String {
    fn section(title: &str, map: &PathMap) -> Vec<String> {
        let mut lines = vec![format!("  {}:", title)];
        for (tag, binding) in map {
            lines.push(format!("    --{}: {}", tag, binding.paths().join(", ")));
        }
        lines
    }

    let mut lines = vec![format!("Running {}", job.name())];
    lines.extend(section("Inputs", &job.bindings().inputs));
    lines.extend(section("Outputs", &job.bindings().outputs));
    lines.join("\n")
}
