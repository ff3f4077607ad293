//
// Copyright (c) 2025 rustmailer.com (https://rustmailer.com)
//
// This file is part of the Onebox Email Triage Project
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::path::Path;

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::modules::settings::cli::SETTINGS;

/// Installs the global subscriber. The returned guard must live as long as
/// the process when file logging is enabled, otherwise buffered lines are lost.
pub fn initialize_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tantivy=warn", SETTINGS.onebox_log_level)));

    let (writer, guard) = if SETTINGS.onebox_log_to_file {
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("onebox")
            .filename_suffix("log")
            .max_log_files(SETTINGS.onebox_max_server_log_files)
            .build(log_dir)
        {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (Some(writer), Some(guard))
            }
            Err(e) => {
                eprintln!("Failed to create log file appender in {:?}: {}", log_dir, e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let layer = match (writer, SETTINGS.onebox_json_logs) {
        (Some(writer), true) => fmt::layer().json().with_writer(writer).boxed(),
        (Some(writer), false) => fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        (None, true) => fmt::layer().json().boxed(),
        (None, false) => fmt::layer().with_ansi(SETTINGS.onebox_ansi_logs).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .init();
    guard
}
