// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! One parameterized routine for every call size.
//!
//! A [`Scenario`] lists its participants and the predicate every page has to
//! reach. [`ScenarioRunner::run`] provisions all sessions, joins them in the
//! declared order, waits for all of them to show live media and releases the
//! sessions again, whatever happened before.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::PathBuf,
};

use futures::future::{join_all, try_join_all};
use url::Url;
use uuid::Uuid;

use crate::{
    http,
    join::{join, room_url},
    liveness::{
        verify_stable, wait_for_liveness, ConvergencePredicate, MediaElementObservation,
    },
    participant::ParticipantSpec,
    session::{Provisioner, Session},
    settings::{LivenessSettings, ScenarioSettings, UiSettings},
    sources::SourceRegistry,
    Error, Result,
};

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub room: String,
    /// Joined in this order
    pub participants: Vec<ParticipantSpec>,
    pub predicate: ConvergencePredicate,
}

impl Scenario {
    /// Resolve the scenario settings against the registry.
    ///
    /// Fails before anything is launched if a participant has no usable
    /// source, or if two participants would share an index or a source.
    pub fn from_settings(settings: &ScenarioSettings, registry: &SourceRegistry) -> Result<Self> {
        let mut participants = Vec::with_capacity(settings.participants.len());

        for participant in &settings.participants {
            let source = registry.validate(participant.index)?;

            participants.push(ParticipantSpec {
                index: participant.index,
                display_name: participant
                    .display_name
                    .clone()
                    .unwrap_or_else(|| format!("User {}", participant.index + 1)),
                source: source.to_path_buf(),
                role: participant.role,
                window: participant.window,
            });
        }

        let predicate =
            ConvergencePredicate::new(settings.expected_elements, settings.criterion)
                .excluding(settings.excluded_elements.iter().copied());

        let scenario = Self {
            name: settings.name.clone(),
            room: settings.room.clone(),
            participants,
            predicate,
        };
        scenario.check()?;

        Ok(scenario)
    }

    /// Every participant needs its own index and its own source
    pub fn check(&self) -> Result<()> {
        if self.participants.is_empty() {
            return Err(Error::Configuration(format!(
                "scenario '{}' has no participants",
                self.name
            )));
        }

        let mut indices = BTreeSet::new();
        let mut sources = BTreeMap::new();

        for participant in &self.participants {
            if !indices.insert(participant.index) {
                return Err(Error::Configuration(format!(
                    "scenario '{}' lists participant {} twice",
                    self.name, participant.index
                )));
            }

            if let Some(other) = sources.insert(&participant.source, participant.index) {
                return Err(Error::Configuration(format!(
                    "participants {other} and {} of scenario '{}' share the source {}",
                    participant.index,
                    self.name,
                    participant.source.display()
                )));
            }
        }

        Ok(())
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    /// Converged observation per participant index, in join order
    pub participants: Vec<(usize, MediaElementObservation)>,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scenario '{}' passed", self.name)?;

        for (index, observation) in &self.participants {
            write!(f, "\n  participant {index}: {observation}")?;
        }

        Ok(())
    }
}

/// Owns every session of a run until it is released
#[derive(Debug, Default)]
pub struct SessionPool {
    sessions: Vec<Session>,
}

impl SessionPool {
    pub fn push(&mut self, session: Session) {
        self.sessions.push(session);
    }

    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Release all sessions.
    ///
    /// Failing releases are logged and do not stop the others. Returns the
    /// number of sessions which failed to release cleanly.
    pub async fn release_all(self) -> usize {
        let results = join_all(self.sessions.into_iter().map(|session| async move {
            let index = session.index();
            (index, session.release().await)
        }))
        .await;

        let mut failed = 0;
        for (index, result) in results {
            if let Err(e) = result {
                log::error!("Failed to release session of participant {index}: {e:?}");
                failed += 1;
            }
        }

        failed
    }

    async fn capture_screenshots(&self, dir: PathBuf) {
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            log::warn!("Failed to create artifact directory {}: {e}", dir.display());
            return;
        }

        for session in &self.sessions {
            let path = dir.join(format!("participant-{}.png", session.index()));

            match session.surface().screenshot(&path).await {
                Ok(()) => log::info!("Saved screenshot {}", path.display()),
                Err(e) => log::warn!(
                    "Failed to save screenshot of participant {}: {e:?}",
                    session.index()
                ),
            }
        }
    }
}

pub struct ScenarioRunner<P> {
    provisioner: P,
    base_url: Url,
    ui: UiSettings,
    liveness: LivenessSettings,
    check_reachable: bool,
    artifacts_dir: Option<PathBuf>,
}

impl<P: Provisioner> ScenarioRunner<P> {
    pub fn new(provisioner: P, base_url: Url) -> Self {
        Self {
            provisioner,
            base_url,
            ui: UiSettings::default(),
            liveness: LivenessSettings::default(),
            check_reachable: false,
            artifacts_dir: None,
        }
    }

    #[must_use]
    pub fn with_ui(mut self, ui: UiSettings) -> Self {
        self.ui = ui;
        self
    }

    #[must_use]
    pub fn with_liveness(mut self, liveness: LivenessSettings) -> Self {
        self.liveness = liveness;
        self
    }

    #[must_use]
    pub fn with_reachability_check(mut self, check_reachable: bool) -> Self {
        self.check_reachable = check_reachable;
        self
    }

    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.artifacts_dir = dir;
        self
    }

    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        log::info!(
            "Run scenario '{}' with {} participants in room '{}'",
            scenario.name,
            scenario.participants.len(),
            scenario.room
        );

        scenario.check()?;
        self.liveness.validate()?;
        let room_url = room_url(&self.base_url, &scenario.room)?;

        if self.check_reachable {
            http::check_reachable(&self.base_url).await?;
        }

        let mut pool = SessionPool::default();
        let result = self.drive(scenario, &room_url, &mut pool).await;

        if result.is_err() {
            if let Some(dir) = &self.artifacts_dir {
                let dir = dir.join(format!("{}-{}", scenario.name, Uuid::new_v4()));
                pool.capture_screenshots(dir).await;
            }
        }

        let held = pool.len();
        let failed = pool.release_all().await;
        log::debug!("Released {held} sessions, {failed} of them uncleanly");

        result
    }

    async fn drive(
        &self,
        scenario: &Scenario,
        room_url: &Url,
        pool: &mut SessionPool,
    ) -> Result<ScenarioReport> {
        let provisioned = join_all(
            scenario
                .participants
                .iter()
                .map(|participant| self.provisioner.provision(participant)),
        )
        .await;

        // Keep every session that came up, so it gets released with the others
        let mut provisioning_error = None;
        for result in provisioned {
            match result {
                Ok(session) => pool.push(session),
                Err(e) => {
                    log::warn!("{e}");
                    provisioning_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = provisioning_error {
            return Err(e);
        }

        for session in pool.sessions() {
            join(session, room_url, &self.ui).await?;
        }

        let policy = self.liveness.poll_policy();
        let observations = try_join_all(
            pool.sessions()
                .iter()
                .map(|session| wait_for_liveness(session, &scenario.predicate, &policy)),
        )
        .await?;

        if let Some(grace) = self.liveness.stability_window {
            try_join_all(pool.sessions().iter().map(|session| {
                verify_stable(session, &scenario.predicate, grace, policy.interval)
            }))
            .await?;
        }

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            participants: pool
                .sessions()
                .iter()
                .map(Session::index)
                .zip(observations)
                .collect(),
        })
    }
}
