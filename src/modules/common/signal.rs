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

use tokio::sync::broadcast;
use tracing::info;

/// Process-wide shutdown notification.
///
/// Created once in `main` and cloned into every component that holds a
/// long-lived connection. Subscribers receive a single `()` when SIGINT or
/// SIGTERM arrives, or when [`SignalManager::trigger`] is called.
#[derive(Clone)]
pub struct SignalManager {
    sender: broadcast::Sender<()>,
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalManager {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }

    /// Spawns the OS signal listener. The returned manager fires once on
    /// the first signal.
    pub fn listen(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            info!("Shutdown signal received, stopping workers and HTTP server");
            manager.trigger();
        });
    }

    /// Resolves once shutdown has been requested. Subscribes eagerly so a
    /// signal fired before the first poll is not missed.
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut receiver = self.subscribe();
        async move {
            let _ = receiver.recv().await;
        }
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = term.recv() => {},
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let manager = SignalManager::new();
        let mut a = manager.subscribe();
        let mut b = manager.clone().subscribe();
        manager.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
