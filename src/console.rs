//! Operator commands read by `winchd` from stdin

use crate::error::{Error, Result};
use std::str::FromStr;

/// One console command
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// `power <pct>`: signed power, positive raises
    Power(f64),
    Stop,
    Status,
    /// `load <raw>`: set the simulated load cell value
    Load(f64),
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(Error::InvalidParameter("empty command".to_string()));
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "power" | "p" => ConsoleCommand::Power(number(verb, words.next())?),
            "load" => ConsoleCommand::Load(number(verb, words.next())?),
            "stop" | "s" => ConsoleCommand::Stop,
            "status" | "?" => ConsoleCommand::Status,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => {
                return Err(Error::InvalidParameter(format!(
                    "unknown command '{}'",
                    other
                )));
            }
        };

        if let Some(extra) = words.next() {
            return Err(Error::InvalidParameter(format!(
                "unexpected argument '{}' to {}",
                extra, verb
            )));
        }
        Ok(command)
    }
}

fn number(verb: &str, arg: Option<&str>) -> Result<f64> {
    let arg = arg.ok_or_else(|| Error::InvalidParameter(format!("{} needs a value", verb)))?;
    arg.parse::<f64>()
        .map_err(|_| Error::InvalidParameter(format!("'{}' is not a number", arg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("power 0.5".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Power(0.5));
        assert_eq!("P -0.3".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Power(-0.3));
        assert_eq!("load 20000".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Load(20000.0));
        assert_eq!("  stop ".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Stop);
        assert_eq!("status".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Status);
        assert_eq!("quit".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<ConsoleCommand>().is_err());
        assert!("power".parse::<ConsoleCommand>().is_err());
        assert!("power fast".parse::<ConsoleCommand>().is_err());
        assert!("stop now".parse::<ConsoleCommand>().is_err());
        assert!("goto 3".parse::<ConsoleCommand>().is_err());
    }
}
