//! Console command parsing

use crate::remote::ListTarget;
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  h | hold | resume        toggle / freeze / unfreeze the frame table
  show                     redraw the frame table now
  stats                    print registry counters
  filters                  print the filter forms
  wl|bl add <id>           add an identifier (000-7ff or 00000000-1fffffff)
  wl|bl rm <id>            remove an identifier
  wl|bl row <n>            add the identifier shown in table row n
  wl|bl set                install the edited list on the device
  wl|bl reset              clear the list on the device
  wl|bl reload             fetch the list from the device
  mask set <mask> <result> edit the mask pair and install it
  mask reset | reload      clear / fetch the mask pair
  timeout set <seconds>    edit the inactivity timeout and install it
  timeout reload           fetch the inactivity timeout
  help                     show this text
  quit                     leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListAction {
    Add(String),
    Remove(String),
    AddRow(usize),
    Apply,
    Reset,
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleHold,
    Hold,
    Resume,
    Show,
    Stats,
    Filters,
    List(ListTarget, ListAction),
    MaskSet { mask: String, masking_result: String },
    MaskReset,
    MaskReload,
    TimeoutSet(String),
    TimeoutReload,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0:?} (type 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            [] => return Err(CommandError::Empty),
            ["h"] => Command::ToggleHold,
            ["hold"] => Command::Hold,
            ["resume"] => Command::Resume,
            ["show"] => Command::Show,
            ["stats"] => Command::Stats,
            ["filters"] => Command::Filters,
            ["help"] | ["?"] => Command::Help,
            ["quit"] | ["q"] | ["exit"] => Command::Quit,
            [list @ ("wl" | "bl"), rest @ ..] => {
                let target = if *list == "wl" {
                    ListTarget::Whitelist
                } else {
                    ListTarget::Blacklist
                };
                Command::List(target, parse_list_action(rest)?)
            }
            ["mask", "set", mask, masking_result] => Command::MaskSet {
                mask: mask.to_string(),
                masking_result: masking_result.to_string(),
            },
            ["mask", "reset"] => Command::MaskReset,
            ["mask", "reload"] => Command::MaskReload,
            ["mask", ..] => return Err(CommandError::Usage("mask set <mask> <result> | reset | reload")),
            ["timeout", "set", seconds] => Command::TimeoutSet(seconds.to_string()),
            ["timeout", "reload"] => Command::TimeoutReload,
            ["timeout", ..] => return Err(CommandError::Usage("timeout set <seconds> | reload")),
            [other, ..] => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn parse_list_action(words: &[&str]) -> Result<ListAction, CommandError> {
    const USAGE: &str = "wl|bl add <id> | rm <id> | row <n> | set | reset | reload";

    let action = match words {
        ["add", identifier] => ListAction::Add(identifier.to_string()),
        ["rm", identifier] => ListAction::Remove(identifier.to_string()),
        ["row", row] => match row.parse::<usize>() {
            Ok(row) if row > 0 => ListAction::AddRow(row),
            _ => return Err(CommandError::Usage(USAGE)),
        },
        ["set"] => ListAction::Apply,
        ["reset"] => ListAction::Reset,
        ["reload"] => ListAction::Reload,
        _ => return Err(CommandError::Usage(USAGE)),
    };
    Ok(action)
}
