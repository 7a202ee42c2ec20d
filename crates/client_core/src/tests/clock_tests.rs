use super::*;
use crate::test_support::ManualAudio;

fn request(duration_hint: Option<f64>) -> MediaRequest {
    MediaRequest {
        url: "fake://story/story_audio.mp3".into(),
        duration_hint,
    }
}

fn clock_with(
    audio: Arc<ManualAudio>,
    generation: u64,
) -> (PlaybackClock, mpsc::UnboundedReceiver<ClockSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let clock = PlaybackClock::new(audio, generation, Duration::from_millis(100), tx);
    (clock, rx)
}

#[tokio::test(start_paused = true)]
async fn load_reports_metadata_with_generation() {
    let audio = ManualAudio::new();
    let (mut clock, mut rx) = clock_with(audio.clone(), 7);
    let duration = clock.load(&request(Some(15.0))).await.expect("load");
    assert_eq!(duration, Some(15.0));
    assert_eq!(
        rx.recv().await,
        Some(ClockSignal {
            generation: 7,
            event: ClockEvent::MetadataReady(Some(15.0)),
        })
    );
    assert_eq!(audio.snapshot().opened, vec!["fake://story/story_audio.mp3"]);
}

#[tokio::test(start_paused = true)]
async fn non_positive_duration_counts_as_unknown() {
    let audio = ManualAudio::new();
    let (mut clock, _rx) = clock_with(audio, 1);
    assert_eq!(clock.load(&request(Some(0.0))).await.expect("load"), None);
    assert_eq!(clock.duration(), None);
}

#[tokio::test(start_paused = true)]
async fn polls_while_playing_and_stops_on_pause() {
    let audio = ManualAudio::new();
    let (mut clock, mut rx) = clock_with(audio.clone(), 3);
    clock.load(&request(Some(15.0))).await.expect("load");
    let _metadata = rx.recv().await;

    audio.set_position(2.5);
    clock.play().expect("play");
    assert!(clock.is_polling());
    let tick = rx.recv().await.expect("tick");
    assert_eq!(tick.generation, 3);
    assert_eq!(tick.event, ClockEvent::TimeAdvanced(2.5));

    clock.pause();
    assert!(!clock.is_polling());
    assert!(!audio.snapshot().playing);
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn ended_is_reported_once_and_polling_stops() {
    let audio = ManualAudio::new();
    let (mut clock, mut rx) = clock_with(audio.clone(), 2);
    clock.load(&request(Some(15.0))).await.expect("load");
    let _metadata = rx.recv().await;

    audio.update(|state| state.ended = true);
    clock.play().expect("play");
    let signal = rx.recv().await.expect("ended");
    assert_eq!(signal.event, ClockEvent::Ended);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());
    assert!(!clock.is_polling());
}

#[tokio::test(start_paused = true)]
async fn seek_clamps_to_known_duration() {
    let audio = ManualAudio::new();
    let (mut clock, _rx) = clock_with(audio.clone(), 1);
    clock.load(&request(Some(15.0))).await.expect("load");
    assert_eq!(clock.seek(42.0), 15.0);
    assert_eq!(clock.seek(-1.0), 0.0);
    assert_eq!(clock.seek(f64::NAN), 0.0);
    assert_eq!(clock.seek(6.0), 6.0);
    assert_eq!(clock.current_time(), 6.0);
}

#[tokio::test(start_paused = true)]
async fn open_and_play_failures_propagate() {
    let audio = ManualAudio::new();
    audio.update(|state| state.fail_open = true);
    let (mut clock, _rx) = clock_with(audio.clone(), 1);
    assert!(matches!(
        clock.load(&request(None)).await,
        Err(PlaybackError::Open { .. })
    ));

    audio.update(|state| {
        state.fail_open = false;
        state.fail_play = true;
    });
    clock.load(&request(None)).await.expect("load");
    assert!(matches!(clock.play(), Err(PlaybackError::Play(_))));
    assert!(!clock.is_polling());
}

#[tokio::test(start_paused = true)]
async fn teardown_closes_audio_and_silences_ticks() {
    let audio = ManualAudio::new();
    let (mut clock, mut rx) = clock_with(audio.clone(), 4);
    clock.load(&request(Some(15.0))).await.expect("load");
    clock.play().expect("play");
    clock.teardown();
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(audio.snapshot().closed, 1);
}

#[tokio::test(start_paused = true)]
async fn rebind_retags_future_ticks() {
    let audio = ManualAudio::new();
    let (mut clock, mut rx) = clock_with(audio.clone(), 1);
    clock.load(&request(Some(15.0))).await.expect("load");
    let _metadata = rx.recv().await;
    clock.halt();
    clock.rebind(9);
    clock.play().expect("play");
    assert_eq!(rx.recv().await.expect("tick").generation, 9);
}

#[tokio::test]
async fn simulated_audio_tracks_seek_and_end() {
    let audio = SimulatedAudio::new(1.0);
    assert_eq!(audio.play(), Err(PlaybackError::NotLoaded));
    assert!(audio.open(&request(Some(10.0))).await.is_ok());
    assert_eq!(audio.position(), 0.0);
    audio.seek(4.0);
    assert_eq!(audio.position(), 4.0);
    assert!(!audio.is_ended());
    audio.seek(30.0);
    assert_eq!(audio.position(), 10.0);
    assert!(audio.is_ended());

    audio.play().expect("play");
    assert!(audio.position() < 1.0);
    audio.pause();
    audio.close();
    assert_eq!(audio.play(), Err(PlaybackError::NotLoaded));
}

#[tokio::test]
async fn simulated_audio_rejects_empty_url() {
    let audio = SimulatedAudio::default();
    let result = audio
        .open(&MediaRequest {
            url: " ".into(),
            duration_hint: None,
        })
        .await;
    assert!(matches!(result, Err(PlaybackError::Open { .. })));
}
