// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use std::path::PathBuf;

use serde::Deserialize;

/// Role a participant plays when entering the room
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Opens the room. The application greets it with a share-link prompt.
    Initiator,
    #[default]
    Joiner,
}

/// Optional UI steps that only some roles go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    DismissShareModal,
}

impl Role {
    #[must_use]
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::Initiator => &[Capability::DismissShareModal],
            Role::Joiner => &[],
        }
    }

    #[must_use]
    pub fn has_capability(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Window placement, only visible when the browser runs with a head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A single simulated user of the call.
///
/// Created once per scenario and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantSpec {
    pub index: usize,
    pub display_name: String,
    /// Video file the browser uses as its camera
    pub source: PathBuf,
    pub role: Role,
    pub window: Option<WindowGeometry>,
}

impl ParticipantSpec {
    pub fn new(index: usize, display_name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            index,
            display_name: display_name.into(),
            source: source.into(),
            role: Role::Joiner,
            window: None,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: WindowGeometry) -> Self {
        self.window = Some(window);
        self
    }
}
