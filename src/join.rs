// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use std::fmt;

use url::Url;

use crate::{participant::Capability, session::Session, settings::UiSettings, Error, Result};

/// Controls of the join dialog the harness relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    NameInput,
    Confirm,
    DismissShareModal,
}

impl Control {
    fn selector(self, ui: &UiSettings) -> &str {
        match self {
            Control::NameInput => &ui.name_input,
            Control::Confirm => &ui.confirm,
            Control::DismissShareModal => &ui.dismiss_share_modal,
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Control::NameInput => "display name input",
            Control::Confirm => "confirm",
            Control::DismissShareModal => "share modal dismiss",
        })
    }
}

/// `<base>/join/<room>`
pub fn room_url(base: &Url, room: &str) -> Result<Url> {
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|()| Error::Configuration(format!("{base} cannot be used as base url")))?
        .pop_if_empty()
        .push("join")
        .push(room);

    Ok(url)
}

/// Submit the join request of the session's participant.
///
/// Returns once the request is submitted, which says nothing about media yet.
pub async fn join(session: &Session, room_url: &Url, ui: &UiSettings) -> Result<()> {
    let participant = session.participant();
    let index = participant.index;
    let surface = session.surface();

    log::info!(
        "Participant {index} joins {room_url} as '{}' ({:?})",
        participant.display_name,
        participant.role
    );

    surface
        .goto(room_url)
        .await
        .map_err(Error::surface(index, "navigate to the room"))?;

    let name_input = require_control(session, Control::NameInput, ui).await?;
    surface
        .type_into(name_input, &participant.display_name)
        .await
        .map_err(Error::surface(index, "enter the display name"))?;

    let confirm = require_control(session, Control::Confirm, ui).await?;
    surface
        .click(confirm)
        .await
        .map_err(Error::surface(index, "confirm the join dialog"))?;

    if participant
        .role
        .has_capability(Capability::DismissShareModal)
    {
        let dismiss = require_control(session, Control::DismissShareModal, ui).await?;
        surface
            .click(dismiss)
            .await
            .map_err(Error::surface(index, "dismiss the share modal"))?;
    }

    log::debug!("Participant {index} submitted the join request");

    Ok(())
}

async fn require_control<'a>(
    session: &Session,
    control: Control,
    ui: &'a UiSettings,
) -> Result<&'a str> {
    let index = session.index();
    let selector = control.selector(ui);

    let found = session
        .surface()
        .wait_for_selector(selector, ui.control_timeout)
        .await
        .map_err(Error::surface(index, "look up a join dialog control"))?;

    if found {
        Ok(selector)
    } else {
        Err(Error::UiContract {
            index,
            control,
            selector: selector.to_string(),
            waited: ui.control_timeout,
        })
    }
}
