// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use std::sync::Arc;

use env_logger::{Builder, Env, Logger};
use log::{Level, Log, Metadata, Record};
use parking_lot::Mutex;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Forwards to env_logger and keeps every error record.
///
/// Installs itself as the global logger, so only one test per binary can use it.
pub(crate) struct ErrorRecorder {
    parent: Logger,
    errors: Arc<Mutex<Vec<String>>>,
}

impl ErrorRecorder {
    pub(crate) fn init() -> Arc<Mutex<Vec<String>>> {
        let errors = Arc::new(Mutex::new(Vec::new()));

        let logger = Builder::from_env(Env::default()).is_test(true).build();
        let max_level = logger.filter().max(log::LevelFilter::Error);
        let recorder = ErrorRecorder {
            parent: logger,
            errors: errors.clone(),
        };

        log::set_boxed_logger(Box::new(recorder)).expect("unable to set error recorder");
        log::set_max_level(max_level);

        errors
    }
}

impl Log for ErrorRecorder {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() == Level::Error || self.parent.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.parent.log(record);
        if record.level() == Level::Error {
            self.errors.lock().push(record.args().to_string());
        }
    }

    fn flush(&self) {
        self.parent.flush();
    }
}
