use super::*;

#[test]
fn bare_enter_toggles_playback() {
    assert_eq!(parse(""), Ok(PlayerCommand::TogglePlay));
    assert_eq!(parse("  P "), Ok(PlayerCommand::TogglePlay));
}

#[test]
fn navigation_commands() {
    assert_eq!(parse("n"), Ok(PlayerCommand::NextStory));
    assert_eq!(parse("]"), Ok(PlayerCommand::NextSlide));
    assert_eq!(parse("<"), Ok(PlayerCommand::PreviousSlide));
    assert_eq!(parse("g 3"), Ok(PlayerCommand::GoToSlide(3)));
    assert!(parse("g 0").is_err());
    assert_eq!(
        parse("o the-curious-cloud"),
        Ok(PlayerCommand::Open("the-curious-cloud".into()))
    );
    assert!(parse("o").is_err());
}

#[test]
fn seek_commands_take_numbers() {
    assert_eq!(parse("s 12.5"), Ok(PlayerCommand::Seek(12.5)));
    assert_eq!(parse("f 0.25"), Ok(PlayerCommand::SeekFraction(0.25)));
    assert_eq!(parse("f 50%"), Ok(PlayerCommand::SeekFraction(0.5)));
    assert!(parse("s soon").unwrap_err().contains("seconds"));
}

#[test]
fn unknown_commands_point_at_help() {
    let error = parse("dance").unwrap_err();
    assert!(error.contains("dance"));
    assert!(error.contains("help"));
    assert_eq!(parse("q"), Ok(PlayerCommand::Quit));
}
