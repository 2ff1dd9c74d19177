//! Timer-driven background passes over the entry store.
//!
//! The [`Scheduler`] owns its lifecycle explicitly: it is constructed
//! with the store and notifier as dependencies, `start` spawns one task
//! per pass, `stop` aborts them. Pass bodies live in [`passes`] as free
//! functions taking the clock as a parameter, so tests drive them
//! directly with fixed timestamps.

pub mod passes;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use pastport_db::Database;
use pastport_notify::Notifier;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Unlock detection cadence.
    pub unlock_interval: Duration,
    /// Look-ahead reminder cadence.
    pub lookahead_interval: Duration,
    /// Notification cleanup cadence.
    pub cleanup_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            unlock_interval: Duration::from_secs(3600),
            lookahead_interval: Duration::from_secs(86_400),
            cleanup_interval: Duration::from_secs(86_400),
        }
    }
}

pub struct Scheduler {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
    config: SchedulerConfig,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(db: Arc<Database>, notifier: Arc<Notifier>, config: SchedulerConfig) -> Self {
        Self {
            db,
            notifier,
            config,
            handles: Vec::new(),
        }
    }

    /// Spawn the three pass loops. The passes run on independent
    /// schedules and operate on disjoint predicates, so they need no
    /// coordination with each other.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }

        info!(
            "Scheduler starting (unlock every {:?}, look-ahead every {:?}, cleanup every {:?})",
            self.config.unlock_interval, self.config.lookahead_interval, self.config.cleanup_interval
        );

        let db = self.db.clone();
        let notifier = self.notifier.clone();
        let every = self.config.unlock_interval;
        self.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match passes::run_unlock_pass(&db, &notifier, Utc::now()).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Unlock pass: transitioned {} entries", count);
                        }
                    }
                    Err(e) => warn!("Unlock pass error: {}", e),
                }
            }
        }));

        let db = self.db.clone();
        let notifier = self.notifier.clone();
        let every = self.config.lookahead_interval;
        self.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match passes::run_lookahead_pass(&db, &notifier, Utc::now()).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Look-ahead pass: sent {} reminders", count);
                        }
                    }
                    Err(e) => warn!("Look-ahead pass error: {}", e),
                }
            }
        }));

        let db = self.db.clone();
        let every = self.config.cleanup_interval;
        self.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match passes::run_cleanup_pass(&db, Utc::now()).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Cleanup pass: pruned {} expired notifications", count);
                        }
                    }
                    Err(e) => warn!("Cleanup pass error: {}", e),
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
