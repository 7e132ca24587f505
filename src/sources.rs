// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Registry of the prerecorded videos that stand in for the participants' cameras

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use crate::{settings::SourceSettings, Error, Result};

/// File types chromium's fake capture device is able to play
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["y4m", "mjpeg"];

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<usize, PathBuf>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the `[[sources]]` settings. Relative paths are
    /// resolved against `base_dir`, usually the directory of the config file.
    pub fn from_settings(sources: &[SourceSettings], base_dir: &Path) -> Result<Self> {
        let mut registry = Self::new();

        for source in sources {
            registry.register(source.index, base_dir.join(&source.path))?;
        }

        Ok(registry)
    }

    pub fn register(&mut self, index: usize, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();

        if let Some(existing) = self.sources.get(&index) {
            return Err(Error::Configuration(format!(
                "participant {index} has two synthetic sources: {} and {}",
                existing.display(),
                path.display()
            )));
        }

        self.sources.insert(index, path);
        Ok(())
    }

    pub fn lookup(&self, index: usize) -> Result<&Path> {
        self.sources
            .get(&index)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no synthetic source registered for participant {index}"
                ))
            })
    }

    /// Look up the source and make sure the browser will be able to use it
    pub fn validate(&self, index: usize) -> Result<&Path> {
        let path = self.lookup(index)?;

        let accepted = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map_or(false, |extension| {
                ACCEPTED_EXTENSIONS
                    .iter()
                    .any(|accepted| extension.eq_ignore_ascii_case(accepted))
            });

        if !accepted {
            return Err(Error::Configuration(format!(
                "synthetic source {} of participant {index} is not one of {}",
                path.display(),
                ACCEPTED_EXTENSIONS.join(", ")
            )));
        }

        File::open(path).map_err(|e| {
            Error::Configuration(format!(
                "synthetic source {} of participant {index} is not readable: {e}",
                path.display()
            ))
        })?;

        Ok(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
