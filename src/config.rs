//! Alarm playback configuration, loaded once per process.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Default location on disk where the server looks for the alarm configuration.
const DEFAULT_CONFIG_PATH: &str = "config/alarm.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BOCK_ALARM_CONFIG_PATH";

static GLOBAL: OnceLock<AlarmPlaybackConfig> = OnceLock::new();

/// Presentation parameters of the pause alarm. A random video is chosen each time it fires
/// and plays its own sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPlaybackConfig {
    /// Candidate video URLs.
    #[validate(length(min = 1))]
    pub alarm_videos: Vec<String>,
    /// How many times the chosen video loops.
    #[validate(range(min = 1))]
    pub video_loop_count: u32,
    /// Estimated length of one loop, in seconds.
    #[validate(range(min = 1))]
    pub estimated_video_duration: u64,
    /// Seconds to wait after the last loop before dismissing the alarm.
    #[validate(range(min = 1))]
    pub auto_dismiss_delay: u64,
    /// Milliseconds alternating vibrate, pause, vibrate, ...
    #[validate(length(min = 1))]
    pub vibration_pattern: Vec<u32>,
    /// Animation timings.
    pub animation: AnimationTimings,
    /// Color scheme.
    pub colors: AlarmColors,
}

/// Animation durations, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnimationTimings {
    /// Fade-in of the overlay.
    pub fade_in_duration: u64,
    /// Slide-up of the card.
    pub slide_up_duration: u64,
    /// Icon bounce.
    pub bounce_duration: u64,
    /// Pulsing circles.
    pub pulse_duration: u64,
}

/// CSS colors of the alarm card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlarmColors {
    /// Card border.
    pub border_color: String,
    /// Title text.
    pub title_color: String,
    /// Subtitle text.
    pub subtitle_color: String,
    /// Dismiss button.
    pub button_color: String,
    /// Dismiss button on hover.
    pub button_hover_color: String,
}

impl AlarmPlaybackConfig {
    /// Process-wide configuration, loaded on first access.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::load)
    }

    /// Load the configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from `path`, falling back to the built-in defaults when the
    /// file is missing, unreadable, malformed or fails validation.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        info!(
                            path = %path.display(),
                            videos = config.alarm_videos.len(),
                            "loaded alarm configuration"
                        );
                        config
                    }
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "invalid alarm configuration; falling back to defaults"
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse alarm configuration; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "alarm configuration not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read alarm configuration; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Time spent looping the video. Saturates instead of overflowing.
    pub fn total_play_duration(&self) -> Duration {
        Duration::from_secs(
            u64::from(self.video_loop_count).saturating_mul(self.estimated_video_duration),
        )
    }

    /// Time after which the alarm dismisses itself. Saturates instead of overflowing.
    pub fn auto_dismiss_after(&self) -> Duration {
        self.total_play_duration()
            .saturating_add(Duration::from_secs(self.auto_dismiss_delay))
    }

    /// Pick the video for one alarm.
    pub fn pick_video<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.alarm_videos.choose(rng).map(String::as_str)
    }
}

impl Default for AlarmPlaybackConfig {
    fn default() -> Self {
        Self {
            alarm_videos: default_videos(),
            video_loop_count: 3,
            estimated_video_duration: 5,
            auto_dismiss_delay: 5,
            vibration_pattern: vec![200, 100, 200, 100, 200],
            animation: AnimationTimings {
                fade_in_duration: 300,
                slide_up_duration: 500,
                bounce_duration: 800,
                pulse_duration: 2000,
            },
            colors: AlarmColors {
                border_color: "#ef4444".into(),
                title_color: "#fff".into(),
                subtitle_color: "#cbd5e1".into(),
                button_color: "#ef4444".into(),
                button_hover_color: "#dc2626".into(),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in video list shipped with the binary.
fn default_videos() -> Vec<String> {
    [
        "https://giphy.com/clips/originals-funk-funky-vibes-KwFpOcGO13VNcvq9P8",
        "https://giphy.com/clips/thesimpsons-the-simpsons-episode-3-season-32-UQxmLIaAVVW0W4F3lq",
        "https://giphy.com/clips/pbs-arts-express-yourself-dule-hill-krhhMAwDvm4IjTAW7w",
        "https://giphy.com/clips/xbox-xbox-series-x-star-wars-jedi-fallen-order-cal-kestis-3PPKDDmuelN0iSmnlq",
        "https://giphy.com/clips/hamlet-teamwork-lotr-and-my-axe-2B5kPltgtmBzQ6TcQX",
        "https://giphy.com/clips/leroypatterson-roku-the-channel-bad-ideas-X1SZ0ge7XH7c3IFr6x",
        "https://giphy.com/clips/thefastsaga-fast-and-furious-saga-7-nBZt3Coeub58xh9xMX",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("bock-back-{}-{name}.json", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_are_valid() {
        let config = AlarmPlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.alarm_videos.is_empty());
        assert!(config.video_loop_count > 0);
        assert!(config.estimated_video_duration > 0);
        assert!(config.auto_dismiss_delay > 0);
        assert!(!config.vibration_pattern.is_empty());
    }

    #[test]
    fn auto_dismiss_follows_the_loops() {
        let config = AlarmPlaybackConfig::default();
        assert_eq!(config.total_play_duration(), Duration::from_secs(15));
        assert_eq!(config.auto_dismiss_after(), Duration::from_secs(20));
    }

    #[test]
    fn picked_video_comes_from_the_list() {
        let config = AlarmPlaybackConfig::default();
        let mut rng = rand::rng();
        for _ in 0..16 {
            let video = config.pick_video(&mut rng).unwrap();
            assert!(config.alarm_videos.iter().any(|candidate| candidate == video));
        }
    }

    #[test]
    fn oversized_durations_saturate_instead_of_panicking() {
        let mut huge = AlarmPlaybackConfig::default();
        huge.estimated_video_duration = u64::MAX;
        huge.auto_dismiss_delay = u64::MAX;
        let path = scratch_file("oversized", &serde_json::to_string(&huge).unwrap());

        let loaded = AlarmPlaybackConfig::load_from(&path);
        fs::remove_file(path).unwrap();

        assert_eq!(loaded, huge);
        assert_eq!(loaded.total_play_duration(), Duration::from_secs(u64::MAX));
        assert_eq!(loaded.auto_dismiss_after(), Duration::MAX);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let path = env::temp_dir().join("bock-back-definitely-missing.json");
        assert_eq!(
            AlarmPlaybackConfig::load_from(&path),
            AlarmPlaybackConfig::default()
        );
    }

    #[test]
    fn file_overrides_defaults() {
        let mut expected = AlarmPlaybackConfig::default();
        expected.alarm_videos = vec!["https://example.com/alarm.mp4".into()];
        expected.video_loop_count = 1;
        let path = scratch_file("override", &serde_json::to_string(&expected).unwrap());

        assert_eq!(AlarmPlaybackConfig::load_from(&path), expected);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut invalid = AlarmPlaybackConfig::default();
        invalid.alarm_videos.clear();
        let path = scratch_file("invalid", &serde_json::to_string(&invalid).unwrap());

        assert_eq!(
            AlarmPlaybackConfig::load_from(&path),
            AlarmPlaybackConfig::default()
        );
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = scratch_file("malformed", "{ not json");
        assert_eq!(
            AlarmPlaybackConfig::load_from(&path),
            AlarmPlaybackConfig::default()
        );
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn serialized_fields_are_camel_case() {
        let value = serde_json::to_value(AlarmPlaybackConfig::default()).unwrap();
        assert!(value.get("alarmVideos").is_some());
        assert!(value.get("videoLoopCount").is_some());
        assert!(value["animation"].get("fadeInDuration").is_some());
        assert!(value["colors"].get("buttonHoverColor").is_some());
    }
}
