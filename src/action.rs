//! Parsing of `:`-prefixed input lines into flow actions.

use std::path::PathBuf;

use crate::flow::{CleanStep, DesignFile, FlowStep};

/// Prefix that turns an input line into an action instead of a shell
/// command.
pub const ACTION_PREFIX: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `:make [step]`, the whole flow when no step is given.
    Make(Option<FlowStep>),
    /// `:clean [step]`, everything when no step is given.
    Clean(CleanStep),
    Gui,
    SourceEnv,
    Pdk(String),
    Pdks,
    Design(String),
    Import(PathBuf),
    Reset(DesignFile),
    Makefile,
    Show(DesignFile),
    /// Replace a design file with the contents of a local file.
    Load(DesignFile, PathBuf),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
:make [step]        run the flow, or one step (synth floorplan place cts route gds spef drc lvs report)
:clean [step]       make clean_all, or clean_<step> (synth floorplan place cts route finish)
:gui                open the flow GUI on the final database
:env                source the tool environment
:pdk <name>         select the PDK
:pdks               list available PDKs
:design <name>      select an already imported design
:import <dir>       import RTL from a directory for the selected PDK
:reset <file>       rewrite config.mk or constraint.sdc from the reference design
:makefile           point the flow Makefile at the selected design
:show <file>        print config.mk or constraint.sdc
:load <file> <path> replace config.mk or constraint.sdc with the contents of <path>
:status             show session and selection state
:quit               leave flowbridge
Anything else is sent to the shell from the application root.";

impl Action {
    /// Parses an input line starting with [`ACTION_PREFIX`].
    pub fn parse(line: &str) -> Result<Self, String> {
        let body = line
            .trim()
            .strip_prefix(ACTION_PREFIX)
            .ok_or_else(|| format!("actions start with `{ACTION_PREFIX}`"))?;
        let (name, arg) = match body.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (body, ""),
        };

        let action = match name {
            "make" | "run" => {
                if arg.is_empty() {
                    Action::Make(None)
                } else {
                    Action::Make(Some(arg.parse()?))
                }
            }
            "clean" => {
                if arg.is_empty() {
                    Action::Clean(CleanStep::All)
                } else {
                    Action::Clean(arg.parse()?)
                }
            }
            "gui" => Action::Gui,
            "env" => Action::SourceEnv,
            "pdk" => Action::Pdk(required(name, arg)?.to_string()),
            "pdks" => Action::Pdks,
            "design" => Action::Design(required(name, arg)?.to_string()),
            "import" => Action::Import(PathBuf::from(required(name, arg)?)),
            "reset" => Action::Reset(required(name, arg)?.parse()?),
            "makefile" => Action::Makefile,
            "show" | "edit" => Action::Show(required(name, arg)?.parse()?),
            "load" | "save" => {
                let (file, path) = required(name, arg)?
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| format!(":{name} needs a design file and a path"))?;
                Action::Load(file.parse()?, PathBuf::from(path.trim()))
            }
            "status" => Action::Status,
            "help" | "?" => Action::Help,
            "quit" | "q" | "exit" => Action::Quit,
            other => return Err(format!("unknown action `:{other}`, try :help")),
        };
        Ok(action)
    }
}

fn required<'a>(name: &str, arg: &'a str) -> Result<&'a str, String> {
    if arg.is_empty() {
        Err(format!(":{name} needs an argument"))
    } else {
        Ok(arg)
    }
}
