// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::{
    liveness::{PlaybackCriterion, PollPolicy},
    participant::{Role, WindowGeometry},
};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub target: TargetSettings,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub ui: UiSettings,

    #[serde(default)]
    pub liveness: LivenessSettings,

    #[serde(default)]
    pub artifacts: ArtifactSettings,

    #[serde(default)]
    pub sources: Vec<SourceSettings>,

    #[serde(default)]
    pub scenarios: Vec<ScenarioSettings>,
}

impl Settings {
    /// Load the settings from the given TOML file. Single values can be
    /// overwritten with `OPENTALK_HARNESS_<SECTION>__<KEY>` environment variables.
    pub fn load(file_name: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(file_name, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("OPENTALK_HARNESS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

/// The application under test
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSettings {
    pub base_url: Url,

    /// Send a request to `base_url` before launching any browser
    #[serde(default)]
    pub check_reachable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// Chromium binary, searched in the usual places when unset
    pub executable: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Required when running as root, e.g. inside a container
    #[serde(default)]
    pub no_sandbox: bool,

    #[serde(
        default = "default_launch_timeout",
        deserialize_with = "duration_secs"
    )]
    pub launch_timeout: Duration,

    /// Passed to every browser in addition to the fake media flags
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: false,
            launch_timeout: default_launch_timeout(),
            extra_args: Vec::new(),
        }
    }
}

/// Selectors of the join dialog. Changing them in the application breaks the harness.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UiSettings {
    #[serde(default = "default_name_input")]
    pub name_input: String,

    #[serde(default = "default_confirm")]
    pub confirm: String,

    /// Cancel button of the share-link prompt the initiator sees
    #[serde(default = "default_dismiss_share_modal")]
    pub dismiss_share_modal: String,

    #[serde(
        default = "default_control_timeout",
        deserialize_with = "duration_secs"
    )]
    pub control_timeout: Duration,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            name_input: default_name_input(),
            confirm: default_confirm(),
            dismiss_share_modal: default_dismiss_share_modal(),
            control_timeout: default_control_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LivenessSettings {
    #[serde(default = "default_liveness_timeout", deserialize_with = "duration_secs")]
    pub timeout: Duration,

    #[serde(default = "default_poll_interval", deserialize_with = "duration_millis")]
    pub poll_interval: Duration,

    /// Keep polling this long after convergence to catch flapping media
    #[serde(default, deserialize_with = "optional_duration_millis")]
    pub stability_window: Option<Duration>,
}

impl LivenessSettings {
    /// Reject values the poll loops cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.poll_interval.is_zero() {
            return Err(crate::Error::Configuration(
                "liveness.poll_interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            timeout: self.timeout,
            interval: self.poll_interval,
        }
    }
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            timeout: default_liveness_timeout(),
            poll_interval: default_poll_interval(),
            stability_window: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactSettings {
    /// Screenshots of all pages of a failed scenario are stored here
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSettings {
    pub name: String,

    #[serde(default = "default_room")]
    pub room: String,

    pub participants: Vec<ParticipantSettings>,

    /// Minimum amount of `video` elements every page has to show
    pub expected_elements: usize,

    /// Element indices which are not checked against the criterion
    #[serde(default)]
    pub excluded_elements: BTreeSet<usize>,

    #[serde(default)]
    pub criterion: PlaybackCriterion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantSettings {
    pub index: usize,

    /// Defaults to `User <index + 1>`
    pub display_name: Option<String>,

    #[serde(default)]
    pub role: Role,

    pub window: Option<WindowGeometry>,
}

fn default_true() -> bool {
    true
}

fn default_launch_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_name_input() -> String {
    "input#usernameInput.swal2-input".to_owned()
}

fn default_confirm() -> String {
    ".swal2-confirm".to_owned()
}

fn default_dismiss_share_modal() -> String {
    ".swal2-cancel".to_owned()
}

fn default_control_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_liveness_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_room() -> String {
    "test".to_owned()
}

pub fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Duration::from_secs(<u64>::deserialize(deserializer)?))
}

pub fn duration_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Duration::from_millis(<u64>::deserialize(deserializer)?))
}

fn optional_duration_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
