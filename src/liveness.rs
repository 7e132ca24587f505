// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Polls the media elements of a page until the call shows live video.
//!
//! The negotiation between the participants is invisible from the outside, the
//! only thing the harness can observe is the state of the `video` elements.
//! Every poll tick takes a fresh [`MediaElementObservation`] inside the page
//! and checks it against a [`ConvergencePredicate`].

use std::{collections::BTreeSet, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::{interval, timeout_at, Instant, Interval, MissedTickBehavior};

use crate::{session::Session, Error, Result};

/// Collects the state of all `video` elements in DOM order
pub const OBSERVE_MEDIA_SCRIPT: &str = r#"({
    elements: Array.from(document.querySelectorAll('video')).map((video) => ({
        currentTime: video.currentTime,
        paused: video.paused,
        ended: video.ended,
        readyState: video.readyState,
    })),
})"#;

/// `HTMLMediaElement.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl TryFrom<u8> for ReadyState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::HaveNothing),
            1 => Ok(Self::HaveMetadata),
            2 => Ok(Self::HaveCurrentData),
            3 => Ok(Self::HaveFutureData),
            4 => Ok(Self::HaveEnoughData),
            _ => Err(format!("invalid readyState {value}")),
        }
    }
}

impl From<ReadyState> for u8 {
    fn from(value: ReadyState) -> Self {
        value as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaElementState {
    pub current_time: f64,
    pub paused: bool,
    pub ended: bool,
    pub ready_state: ReadyState,
}

impl MediaElementState {
    #[must_use]
    pub fn has_current_time(&self) -> bool {
        self.current_time > 0.0
    }
}

/// Snapshot of the `video` elements of one page, the local preview first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaElementObservation {
    pub elements: Vec<MediaElementState>,
}

impl MediaElementObservation {
    #[must_use]
    pub fn count(&self) -> usize {
        self.elements.len()
    }
}

impl fmt::Display for MediaElementObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} video element(s)", self.count())?;

        for (index, element) in self.elements.iter().enumerate() {
            let state = if element.ended {
                "ended"
            } else if element.paused {
                "paused"
            } else {
                "playing"
            };

            write!(
                f,
                "{} #{index} {state} at {:.2}s, {:?}",
                if index == 0 { ":" } else { ";" },
                element.current_time,
                element.ready_state
            )?;
        }

        Ok(())
    }
}

/// What an element must show to count as live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackCriterion {
    /// Enough data buffered to keep playing and not paused
    Ready,
    /// Playback has started and not ended. Weaker than [`Self::Ready`], it
    /// does not care whether the element keeps up.
    Started,
    /// Started, unpaused and with future data buffered
    #[default]
    Playing,
}

impl PlaybackCriterion {
    #[must_use]
    pub fn is_satisfied_by(self, element: &MediaElementState) -> bool {
        let ready = element.ready_state >= ReadyState::HaveFutureData && !element.paused;
        let started = element.has_current_time() && !element.ended;

        match self {
            Self::Ready => ready,
            Self::Started => started,
            Self::Playing => ready && started,
        }
    }
}

impl fmt::Display for PlaybackCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Started => "started",
            Self::Playing => "playing",
        })
    }
}

/// The steady state a page has to reach for the call to count as live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergencePredicate {
    pub expected_minimum_elements: usize,
    /// Elements which are not checked against the criterion, e.g. a hidden
    /// preview. They still count towards the minimum.
    pub excluded_indices: BTreeSet<usize>,
    pub criterion: PlaybackCriterion,
}

impl ConvergencePredicate {
    #[must_use]
    pub fn new(expected_minimum_elements: usize, criterion: PlaybackCriterion) -> Self {
        Self {
            expected_minimum_elements,
            excluded_indices: BTreeSet::new(),
            criterion,
        }
    }

    #[must_use]
    pub fn excluding(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.excluded_indices.extend(indices);
        self
    }

    #[must_use]
    pub fn holds(&self, observation: &MediaElementObservation) -> bool {
        observation.count() >= self.expected_minimum_elements
            && observation
                .elements
                .iter()
                .enumerate()
                .filter(|(index, _)| !self.excluded_indices.contains(index))
                .all(|(_, element)| self.criterion.is_satisfied_by(element))
    }
}

impl fmt::Display for ConvergencePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at least {} video element(s) {}",
            self.expected_minimum_elements, self.criterion
        )?;

        if !self.excluded_indices.is_empty() {
            write!(f, " (excluding {:?})", self.excluded_indices)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Tick source of the poll loops, a zero period is a configuration error
fn poll_ticks(period: Duration) -> Result<Interval> {
    if period.is_zero() {
        return Err(Error::Configuration(
            "liveness poll interval must be greater than zero".to_string(),
        ));
    }

    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    Ok(ticks)
}

/// Poll the session until `predicate` holds.
///
/// Returns the first observation that satisfies the predicate. The deadline
/// covers the whole loop, a page that stops answering does not extend it.
pub async fn wait_for_liveness(
    session: &Session,
    predicate: &ConvergencePredicate,
    policy: &PollPolicy,
) -> Result<MediaElementObservation> {
    let index = session.index();
    let mut ticks = poll_ticks(policy.interval)?;
    let deadline = Instant::now() + policy.timeout;
    let mut last = MediaElementObservation::default();

    log::info!("Participant {index}: waiting up to {:?} for {predicate}", policy.timeout);

    let poll = async {
        loop {
            ticks.tick().await;

            let observation = match session.surface().observe_media().await {
                Ok(observation) => observation,
                Err(source) => {
                    return Err(Error::Surface {
                        index,
                        action: "observe media elements",
                        source,
                    })
                }
            };

            log::debug!("Participant {index}: {observation}");

            if predicate.holds(&observation) {
                return Ok(observation);
            }

            last = observation;
        }
    };

    let outcome = timeout_at(deadline, poll).await;

    match outcome {
        Ok(result) => {
            if result.is_ok() {
                log::info!("Participant {index}: media is live");
            }
            result
        }
        Err(_) => Err(Error::LivenessTimeout {
            index,
            predicate: predicate.to_string(),
            timeout: policy.timeout,
            last,
        }),
    }
}

/// Keep polling for `grace` after convergence and fail if the predicate stops
/// holding in between.
pub async fn verify_stable(
    session: &Session,
    predicate: &ConvergencePredicate,
    grace: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let index = session.index();
    let mut ticks = poll_ticks(poll_interval)?;
    let deadline = Instant::now() + grace;

    loop {
        ticks.tick().await;

        if Instant::now() >= deadline {
            return Ok(());
        }

        let observation = session
            .surface()
            .observe_media()
            .await
            .map_err(Error::surface(index, "observe media elements"))?;

        if !predicate.holds(&observation) {
            return Err(Error::LivenessRegression {
                index,
                predicate: predicate.to_string(),
                last: observation,
            });
        }
    }
}
