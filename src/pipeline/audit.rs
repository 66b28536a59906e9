//! Durable decision audit trail and cycle bookkeeping for status displays.

use crate::error::StoreError;
use crate::store::{StateStore, get_record, update_record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const AUDIT_KEY: &str = "audit_events";
const STATUS_KEY: &str = "cycle_status";
const MAX_EVENTS: usize = 50;
const DETAIL_MAX_CHARS: usize = 80;

/// One terminal decision, appended at every cycle exit point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: i64,
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuditTrail {
    events: Vec<AuditEvent>,
}

/// Bounded durable audit log, oldest events evicted past 50.
pub struct AuditLog {
    store: Arc<dyn StateStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, kind: &str, detail: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let event = AuditEvent {
            ts: now.timestamp_millis(),
            kind: kind.to_string(),
            detail: detail.chars().take(DETAIL_MAX_CHARS).collect(),
        };
        update_record(self.store.as_ref(), AUDIT_KEY, |mut trail: AuditTrail| {
            trail.events.push(event);
            let overflow = trail.events.len().saturating_sub(MAX_EVENTS);
            trail.events.drain(..overflow);
            trail
        })
    }

    /// Most recent events first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let trail: AuditTrail = get_record(self.store.as_ref(), AUDIT_KEY).unwrap_or_default();
        trail.events.into_iter().rev().take(limit).collect()
    }
}

// ─── Cycle bookkeeping ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StatusRecord {
    last_action_message: String,
    last_action_time: i64,
    actions_today_count: u32,
    actions_today_date: String,
    errors_count: u32,
}

/// Status snapshot surfaced by the `status` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeStatus {
    pub last_action_message: String,
    pub last_action_time: i64,
    pub actions_today: u32,
    pub errors: u32,
}

/// Last-action message, per-day action counter, and error counter. The daily
/// counter is keyed by UTC date and resets implicitly when the date changes.
pub struct CycleJournal {
    store: Arc<dyn StateStore>,
}

impl CycleJournal {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn record_cycle(&self, message: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let today = utc_date(now);
        let message = message.to_string();
        update_record(
            self.store.as_ref(),
            STATUS_KEY,
            |mut status: StatusRecord| {
                status.actions_today_count = if status.actions_today_date == today {
                    status.actions_today_count + 1
                } else {
                    1
                };
                status.actions_today_date = today;
                status.last_action_message = message;
                status.last_action_time = now.timestamp_millis();
                status
            },
        )
    }

    /// Update only the last-action message, without counting a cycle.
    pub fn update_last_action(&self, message: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let message = message.to_string();
        update_record(
            self.store.as_ref(),
            STATUS_KEY,
            |mut status: StatusRecord| {
                status.last_action_message = message;
                status.last_action_time = now.timestamp_millis();
                status
            },
        )
    }

    pub fn increment_errors(&self) -> Result<(), StoreError> {
        update_record(
            self.store.as_ref(),
            STATUS_KEY,
            |mut status: StatusRecord| {
                status.errors_count += 1;
                status
            },
        )
    }

    pub fn home_status(&self, now: DateTime<Utc>) -> HomeStatus {
        let status: StatusRecord = get_record(self.store.as_ref(), STATUS_KEY).unwrap_or_default();
        let actions_today = if status.actions_today_date == utc_date(now) {
            status.actions_today_count
        } else {
            0
        };
        HomeStatus {
            last_action_message: status.last_action_message,
            last_action_time: status.last_action_time,
            actions_today,
            errors: status.errors_count,
        }
    }
}

fn utc_date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}
