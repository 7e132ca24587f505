// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Scripted sessions that stand in for chromium.
//!
//! A [`FakeProvisioner`] hands out [`FakeSurface`]s whose DOM consists of a
//! fixed set of selectors and whose media elements follow a script indexed by
//! the poll count. Everything the harness does ends up in the [`Ledger`].

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use opentalk_media_harness::{
    liveness::{MediaElementObservation, MediaElementState, ReadyState},
    participant::ParticipantSpec,
    session::{Provisioner, Session, Surface},
    settings::UiSettings,
    Error,
};
use parking_lot::Mutex;
use url::Url;

pub(crate) mod logger;

#[allow(unused_imports, dead_code)]
pub(crate) mod prelude;

pub(crate) type Script = Arc<dyn Fn(usize) -> MediaElementObservation + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Goto(String),
    WaitFor(String),
    Type(String, String),
    Click(String),
    Screenshot,
}

/// Everything that happened to the fake sessions
#[derive(Default)]
pub(crate) struct Ledger {
    live: AtomicUsize,
    provisioned: AtomicUsize,
    released: AtomicUsize,
    actions: Mutex<Vec<(usize, Action)>>,
}

impl Ledger {
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn provisioned(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn actions(&self) -> Vec<(usize, Action)> {
        self.actions.lock().clone()
    }

    pub(crate) fn actions_of(&self, index: usize) -> Vec<Action> {
        self.actions
            .lock()
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, action)| action.clone())
            .collect()
    }

    fn record(&self, index: usize, action: Action) {
        self.actions.lock().push((index, action));
    }
}

/// How the page of one participant behaves
#[derive(Clone)]
pub(crate) struct Behavior {
    pub(crate) selectors: BTreeSet<String>,
    pub(crate) script: Script,
    pub(crate) fail_provision: bool,
    pub(crate) fail_release: bool,
}

impl Behavior {
    /// A join dialog without the share modal, media follows `script`
    pub(crate) fn joiner(script: Script) -> Self {
        let ui = UiSettings::default();

        Self {
            selectors: BTreeSet::from([ui.name_input, ui.confirm]),
            script,
            fail_provision: false,
            fail_release: false,
        }
    }

    /// A join dialog followed by the share-link prompt
    pub(crate) fn initiator(script: Script) -> Self {
        let mut behavior = Self::joiner(script);
        behavior
            .selectors
            .insert(UiSettings::default().dismiss_share_modal);
        behavior
    }

    pub(crate) fn without(mut self, selector: &str) -> Self {
        self.selectors.remove(selector);
        self
    }
}

#[derive(Clone)]
pub(crate) struct FakeProvisioner {
    ledger: Arc<Ledger>,
    behaviors: BTreeMap<usize, Behavior>,
}

impl FakeProvisioner {
    pub(crate) fn new() -> (Self, Arc<Ledger>) {
        let ledger = Arc::new(Ledger::default());

        (
            Self {
                ledger: ledger.clone(),
                behaviors: BTreeMap::new(),
            },
            ledger,
        )
    }

    pub(crate) fn with(mut self, index: usize, behavior: Behavior) -> Self {
        self.behaviors.insert(index, behavior);
        self
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn provision(&self, participant: &ParticipantSpec) -> opentalk_media_harness::Result<Session> {
        let index = participant.index;
        let behavior = self
            .behaviors
            .get(&index)
            .cloned()
            .unwrap_or_else(|| Behavior::joiner(playing_after(2, 0)));

        // Launching takes a moment, other participants come up meanwhile
        tokio::time::sleep(Duration::from_millis(10 * (index as u64 + 1))).await;

        if behavior.fail_provision {
            return Err(Error::Provisioning {
                index,
                source: anyhow::anyhow!("out of resources"),
            });
        }

        self.ledger.provisioned.fetch_add(1, Ordering::SeqCst);
        self.ledger.live.fetch_add(1, Ordering::SeqCst);

        Ok(Session::new(
            participant.clone(),
            Box::new(FakeSurface {
                index,
                behavior,
                ledger: self.ledger.clone(),
                polls: AtomicUsize::new(0),
                closed: false,
            }),
        ))
    }
}

pub(crate) struct FakeSurface {
    index: usize,
    behavior: Behavior,
    ledger: Arc<Ledger>,
    polls: AtomicUsize,
    closed: bool,
}

#[async_trait]
impl Surface for FakeSurface {
    async fn goto(&self, url: &Url) -> Result<()> {
        self.ledger.record(self.index, Action::Goto(url.to_string()));
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        self.ledger
            .record(self.index, Action::WaitFor(selector.to_string()));

        if self.behavior.selectors.contains(selector) {
            Ok(true)
        } else {
            tokio::time::sleep(timeout).await;
            Ok(false)
        }
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        self.ledger.record(
            self.index,
            Action::Type(selector.to_string(), text.to_string()),
        );
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.ledger
            .record(self.index, Action::Click(selector.to_string()));
        Ok(())
    }

    async fn observe_media(&self) -> Result<MediaElementObservation> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        Ok((self.behavior.script)(poll))
    }

    async fn screenshot(&self, _path: &Path) -> Result<()> {
        self.ledger.record(self.index, Action::Screenshot);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            bail!("participant {} released twice", self.index);
        }
        self.closed = true;

        self.ledger.live.fetch_sub(1, Ordering::SeqCst);
        self.ledger.released.fetch_add(1, Ordering::SeqCst);

        if self.behavior.fail_release {
            bail!("browser of participant {} did not exit", self.index);
        }

        Ok(())
    }
}

pub(crate) fn playing_element() -> MediaElementState {
    MediaElementState {
        current_time: 1.5,
        paused: false,
        ended: false,
        ready_state: ReadyState::HaveEnoughData,
    }
}

pub(crate) fn hidden_element() -> MediaElementState {
    MediaElementState {
        current_time: 0.0,
        paused: true,
        ended: false,
        ready_state: ReadyState::HaveNothing,
    }
}

pub(crate) fn loading_element() -> MediaElementState {
    MediaElementState {
        current_time: 0.0,
        paused: false,
        ended: false,
        ready_state: ReadyState::HaveMetadata,
    }
}

/// Only the local preview until poll `after`, then `count` playing elements
pub(crate) fn playing_after(count: usize, after: usize) -> Script {
    Arc::new(move |poll| {
        if poll < after {
            MediaElementObservation {
                elements: vec![playing_element()],
            }
        } else {
            MediaElementObservation {
                elements: vec![playing_element(); count],
            }
        }
    })
}

/// The remote video never gets past its metadata
pub(crate) fn stuck_loading() -> Script {
    Arc::new(|_| MediaElementObservation {
        elements: vec![playing_element(), loading_element()],
    })
}

pub(crate) fn participant(index: usize) -> ParticipantSpec {
    ParticipantSpec::new(
        index,
        format!("User {}", index + 1),
        format!("/videos/test{}.y4m", index + 1),
    )
}
