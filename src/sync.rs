use crate::compare;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::inventory::{HttpInventory, InventorySource};
use crate::reload::{CommandController, ServiceController};
use crate::reservations;
use crate::store::ConfigStore;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Whether the file on disk matches what the inventory last returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    /// The last successful fetch matched the file on disk
    #[default]
    Stable,
    /// A difference was detected and has not been written yet
    Updating,
}

/// Values carried from one cycle to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Number of cycles run so far
    pub cycles: u64,
    /// Fetch failures since the last successful fetch
    pub consecutive_fetch_failures: u32,
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The export matched the file on disk; nothing written, nothing reloaded
    Unchanged,
    /// The file was replaced and the daemon reloaded
    Updated { reservations: usize },
    /// The export could not be fetched or was unusable; file untouched
    FetchFailed,
    /// The current file could not be read; nothing written, no reload
    ReadFailed,
    /// The new file could not be written; file untouched, no reload
    WriteFailed,
    /// The file was replaced but the reload failed; the new file stays
    ReloadFailed { reservations: usize },
}

/// The poll, compare, replace and reload loop.
pub struct Syncer<S, C> {
    source: S,
    store: ConfigStore,
    controller: C,
    poll_interval: Duration,
    jitter: Duration,
}

impl Syncer<HttpInventory, CommandController> {
    /// Build the production loop from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = HttpInventory::from_config(config)?;
        let store = ConfigStore::for_target(config.target_path());
        let controller = CommandController::from_config(config);

        Ok(Self::new(source, store, controller)
            .with_interval(config.poll_interval(), config.jitter()))
    }
}

impl<S, C> Syncer<S, C>
where
    S: InventorySource,
    C: ServiceController,
{
    #[must_use]
    pub fn new(source: S, store: ConfigStore, controller: C) -> Self {
        Self {
            source,
            store,
            controller,
            poll_interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
            jitter: Duration::ZERO,
        }
    }

    /// Set the sleep between cycles and the upper bound of the random delay added to it.
    #[must_use]
    pub fn with_interval(mut self, poll_interval: Duration, jitter: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Run cycles until `cancel` fires. Cycle errors never end the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            target_file = %self.store.target().display(),
            interval_secs = self.poll_interval.as_secs(),
            "Starting DHCP reservation sync"
        );

        let mut status = SyncStatus::default();
        while !cancel.is_cancelled() {
            let (next, _) = self.run_cycle(status).await;
            status = next;

            let delay = self.next_delay();
            debug!(delay_ms = delay.as_millis(), "Sleeping until next cycle");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!(cycles = status.cycles, "DHCP reservation sync stopped");
    }

    /// Run one fetch, compare, replace and reload cycle.
    ///
    /// Takes the status left by the previous cycle and returns the next one.
    pub async fn run_cycle(&self, previous: SyncStatus) -> (SyncStatus, CycleOutcome) {
        let mut status = SyncStatus {
            cycles: previous.cycles + 1,
            ..previous
        };
        info!(cycle = status.cycles, "Starting sync cycle");

        let text = match self.fetch_export().await {
            Ok(text) => {
                status.consecutive_fetch_failures = 0;
                text
            }
            Err(e) => {
                status.consecutive_fetch_failures += 1;
                error!(
                    consecutive_failures = status.consecutive_fetch_failures,
                    "Fetch failed, keeping current configuration: {e}"
                );
                return (status, CycleOutcome::FetchFailed);
            }
        };
        let count = reservations::count(&text);

        let current = match self.store.read_current() {
            Ok(current) => current,
            Err(e) => {
                error!(
                    path = %self.store.target().display(),
                    "Cannot read current configuration, skipping this cycle: {e}"
                );
                return (status, CycleOutcome::ReadFailed);
            }
        };

        if current.as_deref() == Some(text.as_bytes()) {
            info!(
                reservations = count,
                "No changes detected in DHCP configuration, skipping reload"
            );
            status.state = SyncState::Stable;
            return (status, CycleOutcome::Unchanged);
        }

        status.state = SyncState::Updating;
        self.log_change(current.as_deref(), &text);

        if let Err(e) = self.store.replace(text.as_bytes()) {
            error!(
                path = %self.store.target().display(),
                "Failed to write DHCP configuration, daemon keeps the previous file: {e}"
            );
            return (status, CycleOutcome::WriteFailed);
        }
        info!(
            path = %self.store.target().display(),
            reservations = count,
            "Updated DHCP configuration"
        );

        // the new file stays in place whatever the reload does
        status.state = SyncState::Stable;
        match self.controller.reload().await {
            Ok(()) => {
                info!(reservations = count, "DHCP configuration changed and service reloaded");
                (status, CycleOutcome::Updated { reservations: count })
            }
            Err(e) => {
                error!("DHCP service reload failed, new configuration left in place: {e}");
                (status, CycleOutcome::ReloadFailed { reservations: count })
            }
        }
    }

    /// Fetch the export and reject bodies without any reservation.
    async fn fetch_export(&self) -> Result<String> {
        let text = self.source.fetch().await?;
        if reservations::count(&text) == 0 {
            return Err(SyncError::NoReservations);
        }
        Ok(text)
    }

    fn log_change(&self, current: Option<&[u8]>, new: &str) {
        let Some(current) = current else {
            info!(
                path = %self.store.target().display(),
                "Configuration file absent, creating it"
            );
            return;
        };

        let previous = String::from_utf8_lossy(current);
        let comparison = compare::compare_text(&previous, new);
        if comparison.is_identical() {
            info!("Configuration text changed without reservation changes");
        } else {
            info!(
                added = comparison.missing_in_first.len(),
                removed = comparison.missing_in_second.len(),
                ip_changes = comparison.ip_mismatches.len(),
                mac_changes = comparison.mac_mismatches.len(),
                "Change detected in DHCP reservations"
            );
        }
        for m in &comparison.mac_mismatches {
            warn!(
                ip = %m.ip,
                old_mac = %m.first,
                new_mac = %m.second,
                "Address moved to another MAC"
            );
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.poll_interval;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.poll_interval.saturating_add(Duration::from_millis(extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Never;

    #[async_trait]
    impl InventorySource for Never {
        async fn fetch(&self) -> Result<String> {
            Err(SyncError::NoReservations)
        }
    }

    #[async_trait]
    impl ServiceController for Never {
        async fn reload(&self) -> Result<()> {
            Ok(())
        }
    }

    fn syncer(jitter: Duration) -> Syncer<Never, Never> {
        Syncer::new(Never, ConfigStore::new("/tmp", "/tmp/hosts.conf"), Never)
            .with_interval(Duration::from_secs(30), jitter)
    }

    #[test]
    fn test_next_delay_without_jitter() {
        assert_eq!(syncer(Duration::ZERO).next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_next_delay_saturates_on_huge_interval() {
        let s = Syncer::new(Never, ConfigStore::new("/tmp", "/tmp/hosts.conf"), Never)
            .with_interval(Duration::from_secs(u64::MAX), Duration::from_secs(5));
        // would overflow with plain addition
        assert!(s.next_delay() >= Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_next_delay_with_jitter_stays_in_bounds() {
        let s = syncer(Duration::from_secs(5));
        for _ in 0..50 {
            let delay = s.next_delay();
            assert!(delay >= Duration::from_secs(30));
            assert!(delay <= Duration::from_secs(35));
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_counts_up_and_keeps_state() {
        let s = syncer(Duration::ZERO);
        let start = SyncStatus {
            state: SyncState::Updating,
            cycles: 4,
            consecutive_fetch_failures: 2,
        };

        let (status, outcome) = s.run_cycle(start).await;

        assert_eq!(outcome, CycleOutcome::FetchFailed);
        assert_eq!(status.cycles, 5);
        assert_eq!(status.consecutive_fetch_failures, 3);
        assert_eq!(status.state, SyncState::Updating);
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let s = syncer(Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();
        // returns immediately instead of sleeping 30 seconds
        tokio::time::timeout(Duration::from_secs(5), s.run(cancel))
            .await
            .unwrap();
    }
}
