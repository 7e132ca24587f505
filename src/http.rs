// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! HTTP calls made by the harness itself, outside of the browsers

use std::time::Duration;

use url::Url;

use crate::{Error, Result};

const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// Make sure the application under test answers before any browser is launched.
///
/// Any response below 500 counts, the root page of the application may well
/// redirect or require a room id.
pub async fn check_reachable(base_url: &Url) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(PREFLIGHT_TIMEOUT)
        .build()
        .map_err(|e| Error::Configuration(format!("failed to create http client: {e}")))?;

    let response = client.get(base_url.clone()).send().await.map_err(|e| {
        Error::Configuration(format!("application under test at {base_url} is not reachable: {e}"))
    })?;

    let status = response.status();
    if status.is_server_error() {
        return Err(Error::Configuration(format!(
            "application under test at {base_url} answered with {status}"
        )));
    }

    log::debug!("{base_url} answered with {status}");

    Ok(())
}
