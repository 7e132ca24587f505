// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

pub(crate) use crate::common::{
    hidden_element, logger::init_logger, participant, playing_after, playing_element,
    stuck_loading, Action, Behavior, FakeProvisioner,
};
pub(crate) use opentalk_media_harness::{
    liveness::{
        wait_for_liveness, ConvergencePredicate, MediaElementObservation, PlaybackCriterion,
        PollPolicy,
    },
    participant::Role,
    scenario::{Scenario, ScenarioRunner},
    session::Provisioner,
    settings::{LivenessSettings, UiSettings},
    Error,
};
pub(crate) use std::{sync::Arc, time::Duration};
pub(crate) use tokio::time::Instant;
pub(crate) use url::Url;

pub(crate) const TEST_URL: &str = "http://localhost:3000";

pub(crate) fn runner(provisioner: FakeProvisioner) -> ScenarioRunner<FakeProvisioner> {
    ScenarioRunner::new(provisioner, Url::parse(TEST_URL).unwrap())
}
