//! Line-oriented control surface for terminals.

use std::io::{self, BufRead, Write};

use super::{ControlAction, ControlSurface};
use crate::actuator::LightActuator;

const HELP: &str = "commands: auto | on (stay on) | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Action(ControlAction),
    Help,
    Blank,
}

fn parse_command(line: &str) -> Option<Command> {
    let normalized = line.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
    let command = match normalized.as_str() {
        "" => Command::Blank,
        "auto" | "a" => Command::Action(ControlAction::Auto),
        "on" | "stay on" | "stay" => Command::Action(ControlAction::StayOn),
        "quit" | "q" | "exit" => Command::Action(ControlAction::Quit),
        "help" | "?" => Command::Help,
        _ => return None,
    };
    Some(command)
}

/// Read commands from `input` until "quit" or end of input, which also quits.
pub fn run_console<A, R, W>(surface: &ControlSurface<A>, input: R, mut output: W) -> io::Result<()>
where
    A: LightActuator,
    R: BufRead,
    W: Write,
{
    writeln!(output, "{}", HELP)?;

    for line in input.lines() {
        match parse_command(&line?) {
            Some(Command::Action(action)) => {
                surface.handle(action);
                if action == ControlAction::Quit {
                    return Ok(());
                }
            }
            Some(Command::Help) => writeln!(output, "{}", HELP)?,
            Some(Command::Blank) => {}
            None => writeln!(output, "unknown command; {}", HELP)?,
        }
    }

    surface.handle(ControlAction::Quit);
    Ok(())
}
