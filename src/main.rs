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

use std::sync::Arc;

use mimalloc::MiMalloc;
use modules::{
    account::load_accounts,
    common::signal::SignalManager,
    context::OneboxContext,
    error::OneboxResult,
    imap::session::ImapConnector,
    indexer::manager::EmailIndex,
    logger,
    rest::start_http_server,
    settings::{cli::SETTINGS, dir::DataDirManager},
};
use tracing::{error, info};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static LOGO: &str = r#"
                  _
  ___  _ __   ___| |__   _____  __
 / _ \| '_ \ / _ \ '_ \ / _ \ \/ /
| (_) | | | |  __/ |_) | (_) >  <
 \___/|_| |_|\___|_.__/ \___/_/\_\
"#;

#[cfg(not(test))]
#[tokio::main]
async fn main() -> OneboxResult<()> {
    let dirs = DataDirManager::new(&SETTINGS.onebox_root_dir);
    if let Err(error) = dirs.initialize() {
        eprintln!("{:?}", error);
        return Err(error);
    }
    let _log_guard = logger::initialize_logging(&dirs.log_dir);
    info!("{}", LOGO);
    info!("Starting onebox");
    info!("Version:  {}", env!("CARGO_PKG_VERSION"));

    if let Err(error) = run(dirs).await {
        error!("{:?}", error);
        eprintln!("{:?}", error);
        return Err(error);
    }
    Ok(())
}

async fn run(dirs: DataDirManager) -> OneboxResult<()> {
    let accounts = load_accounts(SETTINGS.onebox_accounts_file.as_deref())?;

    let index = Arc::new(EmailIndex::open(&dirs.index_dir)?);
    let context = OneboxContext::new(&SETTINGS, index.clone())?;

    let signals = SignalManager::new();
    signals.listen();
    let workers = context.spawn_workers(accounts, Arc::new(ImapConnector), &signals);

    let served = start_http_server(context.service.clone(), signals.clone()).await;
    // a failed server must not leave the workers running
    signals.trigger();
    for result in futures::future::join_all(workers).await {
        if let Err(e) = result {
            error!("Mailbox worker task panicked: {}", e);
        }
    }
    index.close().await?;
    info!("Email index closed, goodbye");
    served
}
