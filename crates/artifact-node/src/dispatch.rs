//! Dispatch bridge: session inbound stream to mailbox
//!
//! Runs as a task owned by the artifact. Each stanza is filtered, decoded and
//! enqueued exactly once. The loop ends when the session's inbound stream
//! ends or the task is cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use artifact_core::{Codec, Jid, MessageFilter, Session, Stanza};

use crate::mailbox::Mailbox;

/// What happened to a single inbound stanza
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Decoded and enqueued
    Delivered,
    /// Rejected by the filter
    Filtered,
    /// Matched the filter but could not be decoded
    Undecodable,
}

/// Counters kept by the bridge
#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    filtered: AtomicU64,
    undecodable: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub delivered: u64,
    pub filtered: u64,
    pub undecodable: u64,
}

impl DispatchStats {
    fn record(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Delivered => &self.delivered,
            DispatchOutcome::Filtered => &self.filtered,
            DispatchOutcome::Undecodable => &self.undecodable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            undecodable: self.undecodable.load(Ordering::Relaxed),
        }
    }
}

/// Routes inbound stanzas into a mailbox
pub struct DispatchBridge {
    identity: Jid,
    filter: MessageFilter,
    codec: Arc<dyn Codec>,
    mailbox: Arc<Mailbox>,
    stats: Arc<DispatchStats>,
}

impl DispatchBridge {
    pub fn new(
        identity: Jid,
        filter: MessageFilter,
        codec: Arc<dyn Codec>,
        mailbox: Arc<Mailbox>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            identity,
            filter,
            codec,
            mailbox,
            stats,
        }
    }

    /// Filter, decode and enqueue one stanza
    pub fn handle(&self, stanza: Stanza) -> DispatchOutcome {
        let outcome = if !self.filter.matches(&stanza, &self.identity) {
            debug!(
                identity = %self.identity,
                kind = %stanza.kind,
                to = %stanza.to,
                "Dropping stanza rejected by filter"
            );
            DispatchOutcome::Filtered
        } else {
            match self.codec.decode(&stanza) {
                Ok(message) => {
                    debug!(identity = %self.identity, from = ?message.sender, "Message received");
                    self.mailbox.enqueue(message);
                    DispatchOutcome::Delivered
                }
                Err(e) => {
                    warn!(identity = %self.identity, error = %e, "Dropping undecodable stanza");
                    DispatchOutcome::Undecodable
                }
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Drain `session` until its inbound stream ends
    pub async fn run(self, session: Arc<dyn Session>) {
        debug!(identity = %self.identity, "Dispatch bridge started");
        while let Some(stanza) = session.recv().await {
            self.handle(stanza);
        }
        info!(identity = %self.identity, "Inbound stream ended");
    }
}
