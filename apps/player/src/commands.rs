//! Line commands typed into the player.

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    TogglePlay,
    NextStory,
    NextSlide,
    PreviousSlide,
    /// One-based slide number.
    GoToSlide(usize),
    Seek(f64),
    SeekFraction(f64),
    Open(String),
    List,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  p | <enter>      play / pause
  n                next story
  ] | >            next slide
  [ | <            previous slide
  g <number>       go to slide
  s <seconds>      seek
  f <0..1 | N%>    seek to a fraction of the narration
  o <story-id>     open a story
  l                list stories
  ?                show current slide
  q                quit";

pub fn parse(line: &str) -> Result<PlayerCommand, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let command = match head.to_ascii_lowercase().as_str() {
        "" | "p" | "play" | "pause" => PlayerCommand::TogglePlay,
        "n" | "next" => PlayerCommand::NextStory,
        "]" | ">" => PlayerCommand::NextSlide,
        "[" | "<" => PlayerCommand::PreviousSlide,
        "g" | "goto" => {
            let number: usize = parse_number(rest, "slide number")?;
            if number == 0 {
                return Err("slides are numbered from 1".into());
            }
            PlayerCommand::GoToSlide(number)
        }
        "s" | "seek" => PlayerCommand::Seek(parse_number(rest, "seconds")?),
        "f" | "fraction" => {
            let fraction = match rest.strip_suffix('%') {
                Some(percent) => parse_number::<f64>(percent, "percentage")? / 100.0,
                None => parse_number(rest, "fraction")?,
            };
            PlayerCommand::SeekFraction(fraction)
        }
        "o" | "open" => {
            if rest.is_empty() {
                return Err("usage: o <story-id>".into());
            }
            PlayerCommand::Open(rest.to_string())
        }
        "l" | "list" => PlayerCommand::List,
        "?" | "status" => PlayerCommand::Status,
        "h" | "help" => PlayerCommand::Help,
        "q" | "quit" | "exit" => PlayerCommand::Quit,
        other => return Err(format!("unknown command `{other}` (h for help)")),
    };
    Ok(command)
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("expected {what}, got `{raw}`"))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
