// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use std::{path::Path, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::{liveness::MediaElementObservation, participant::ParticipantSpec};

/// The page through which the harness drives and observes one participant
#[async_trait]
pub trait Surface: Send + Sync {
    async fn goto(&self, url: &Url) -> Result<()>;

    /// Wait until an element matching `selector` exists.
    ///
    /// Returns `false` if it did not show up within `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn observe_media(&self) -> Result<MediaElementObservation>;

    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Shut down the environment behind the page. Called exactly once.
    async fn close(&mut self) -> Result<()>;
}

/// Creates one isolated environment per participant
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, participant: &ParticipantSpec) -> crate::Result<Session>;
}

/// An isolated environment bound to a single participant
pub struct Session {
    participant: ParticipantSpec,
    surface: Box<dyn Surface>,
}

impl Session {
    pub fn new(participant: ParticipantSpec, surface: Box<dyn Surface>) -> Self {
        Self {
            participant,
            surface,
        }
    }

    #[must_use]
    pub fn participant(&self) -> &ParticipantSpec {
        &self.participant
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.participant.index
    }

    #[must_use]
    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    pub async fn release(mut self) -> Result<()> {
        log::debug!("Release session of participant {}", self.index());
        self.surface.close().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("participant", &self.participant)
            .finish_non_exhaustive()
    }
}
