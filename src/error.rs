// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use std::time::Duration;

use crate::{join::Control, liveness::MediaElementObservation};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures that abort a scenario run.
///
/// Every variant that concerns a single browser session carries the index of
/// the participant, so a failed run points at the page that misbehaved.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid settings, a missing synthetic source or an unreachable target.
    /// Raised before any browser is launched.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("participant {index}: failed to provision browser session")]
    Provisioning {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("participant {index}: {control} control `{selector}` not found within {waited:?}")]
    UiContract {
        index: usize,
        control: Control,
        selector: String,
        waited: Duration,
    },

    #[error("participant {index}: expected {predicate} within {timeout:?}, last observation: {last}")]
    LivenessTimeout {
        index: usize,
        predicate: String,
        timeout: Duration,
        last: MediaElementObservation,
    },

    #[error("participant {index}: {predicate} stopped holding after convergence, observation: {last}")]
    LivenessRegression {
        index: usize,
        predicate: String,
        last: MediaElementObservation,
    },

    #[error("participant {index}: failed to {action}")]
    Surface {
        index: usize,
        action: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Index of the participant the failure belongs to, if any
    #[must_use]
    pub fn participant(&self) -> Option<usize> {
        match self {
            Self::Configuration(_) => None,
            Self::Provisioning { index, .. }
            | Self::UiContract { index, .. }
            | Self::LivenessTimeout { index, .. }
            | Self::LivenessRegression { index, .. }
            | Self::Surface { index, .. } => Some(*index),
        }
    }

    pub(crate) fn surface(index: usize, action: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Surface {
            index,
            action,
            source,
        }
    }
}
