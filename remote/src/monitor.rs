//! Background network reachability monitor.

use std::time::Duration;

use fxcache_engine::ConnectivityProbe;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RemoteConfig;

/// Tracks reachability of the rate API by periodically opening a TCP
/// connection to it.
///
/// Starts out reachable; an unknown status is treated as reachable.
pub struct NetworkMonitor {
    status: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    /// Spawn the reachability loop. Must be called from within a tokio runtime.
    pub fn start(config: &RemoteConfig) -> Self {
        let (status, _) = watch::channel(true);

        let task = tokio::spawn(monitor_loop(
            status.clone(),
            config.probe_addr.clone(),
            config.probe_interval,
            config.probe_timeout,
        ));

        info!(addr = %config.probe_addr, "Network monitor started");
        Self { status, task }
    }

    /// Receive every reachability change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Stop probing. The last observed status is kept.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConnectivityProbe for NetworkMonitor {
    fn is_reachable(&self) -> bool {
        *self.status.borrow()
    }
}

async fn monitor_loop(
    status: watch::Sender<bool>,
    addr: String,
    interval: Duration,
    timeout: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let reachable = check(&addr, timeout).await;
        if !publish(&status, reachable) {
            debug!(addr = %addr, reachable, "Network status unchanged");
        } else if reachable {
            info!(addr = %addr, "Network reachable");
        } else {
            warn!(addr = %addr, "Network unreachable");
        }
    }
}

/// Store `reachable`, waking subscribers only when it differs from the last
/// observed status. Returns whether it changed.
fn publish(status: &watch::Sender<bool>, reachable: bool) -> bool {
    status.send_if_modified(|current| {
        let changed = *current != reachable;
        *current = reachable;
        changed
    })
}

async fn check(addr: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn config(addr: String) -> RemoteConfig {
        RemoteConfig {
            probe_addr: addr,
            probe_interval: Duration::from_millis(20),
            probe_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let monitor = NetworkMonitor::start(&config(addr));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(monitor.is_reachable());
        monitor.stop();
    }

    #[tokio::test]
    async fn test_closed_port_turns_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let monitor = NetworkMonitor::start(&config(addr));
        let mut changes = monitor.subscribe();

        tokio::time::timeout(Duration::from_secs(2), changes.changed())
            .await
            .unwrap()
            .unwrap();

        assert!(!*changes.borrow());
        assert!(!monitor.is_reachable());
    }

    #[tokio::test]
    async fn test_steady_status_does_not_notify() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let monitor = NetworkMonitor::start(&config(addr));
        let mut changes = monitor.subscribe();

        // Several ticks pass while the listener stays up.
        let woke = tokio::time::timeout(Duration::from_millis(150), changes.changed()).await;

        assert!(woke.is_err());
        assert!(monitor.is_reachable());
        monitor.stop();
    }

    #[test]
    fn test_publish_reports_changes_only() {
        let (status, mut rx) = watch::channel(true);

        assert!(!publish(&status, true));
        assert!(!rx.has_changed().unwrap());

        assert!(publish(&status, false));
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());

        assert!(!publish(&status, false));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_starts_reachable() {
        let monitor = NetworkMonitor::start(&config("127.0.0.1:9".to_string()));
        assert!(monitor.is_reachable());
    }
}
