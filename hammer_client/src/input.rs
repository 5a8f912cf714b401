//! Input handling.
//!
//! A windowed build would map a key or button press to `Command::Throw`. The
//! headless client reads the same commands from the console.

use anyhow::{bail, Context};

/// A player action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Release. `Some(power)` overrides the face-driven meter.
    Throw(Option<f32>),
    /// Release as if the face had produced this score, `[0, 1]`.
    Power(f32),
    Reset,
    /// Print this session's results as JSON.
    Results,
    Status,
    Quit,
}

/// Parses one console line.
pub fn parse_command(line: &str) -> anyhow::Result<Command> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        bail!("empty command");
    };
    let arg = parts.next();
    if parts.next().is_some() {
        bail!("too many arguments for '{verb}'");
    }

    let cmd = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("throw" | "t" | "release", None) => Command::Throw(None),
        ("throw" | "t" | "release", Some(p)) => {
            let power = p
                .parse::<f32>()
                .with_context(|| format!("invalid power '{p}'"))?;
            Command::Throw(Some(power))
        }
        ("power", Some(v)) => {
            let score = v
                .parse::<f32>()
                .with_context(|| format!("invalid score '{v}'"))?;
            if !(0.0..=1.0).contains(&score) {
                bail!("score must be within 0..1, got {score}");
            }
            Command::Power(score)
        }
        ("power", None) => bail!("usage: power <0..1>"),
        ("reset" | "r" | "again", None) => Command::Reset,
        ("results", None) => Command::Results,
        ("status", None) => Command::Status,
        ("quit" | "exit", None) => Command::Quit,
        (_, Some(_)) if is_known(verb) => bail!("'{verb}' takes no arguments"),
        _ => bail!(
            "unknown command '{verb}' (try: throw [power], power <0..1>, reset, status, results, quit)"
        ),
    };
    Ok(cmd)
}

fn is_known(verb: &str) -> bool {
    matches!(
        verb.to_ascii_lowercase().as_str(),
        "reset" | "r" | "again" | "status" | "results" | "quit" | "exit"
    )
}
