//! Campaign runner: fans one notification kind out over a cohort of users.
//!
//! Each member is evaluated and dispatched independently: a failure, an
//! error, or a panic for one member becomes that member's failed entry and
//! never stops the rest. Results come back in cohort order.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt, stream};

use taskping_core::DataStore;
use taskping_core::error::Result;
use taskping_core::types::{CampaignEntry, CampaignResult, DispatchResult, NotificationKind, Payload, User, UserRole};

use crate::dispatch::DispatchUnit;

pub const ERR_USER_NOT_FOUND: &str = "user not found";
pub const SKIP_NOTHING_TO_SEND: &str = "nothing to send";

/// Who a campaign targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cohort {
    Everyone,
    Role(UserRole),
    /// Explicit ids, in the given order. Unknown ids produce failed entries.
    Users(Vec<String>),
}

enum Member {
    Found(User),
    Unresolved { id: String, reason: String },
}

/// Runs campaigns with bounded concurrency.
pub struct CampaignRunner {
    store: Arc<dyn DataStore>,
    dispatcher: Arc<DispatchUnit>,
    concurrency: usize,
}

impl CampaignRunner {
    pub fn new(store: Arc<dyn DataStore>, dispatcher: Arc<DispatchUnit>, concurrency: usize) -> Self {
        Self {
            store,
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Evaluate `payload_fn` for every member of `cohort` and dispatch the result.
    ///
    /// `payload_fn` returning `Ok(None)` skips the member; `Err`, a payload of
    /// another kind, or a panic records a failure. Only a failure to resolve
    /// the cohort itself is returned as `Err`.
    pub async fn run<F, Fut>(&self, cohort: Cohort, kind: NotificationKind, payload_fn: F) -> Result<CampaignResult>
    where
        F: Fn(User) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Option<Payload>>> + Send,
    {
        let members = self.resolve(&cohort).await?;
        tracing::info!("📣 Campaign '{kind}' starting for {} recipient(s)", members.len());

        let payload_fn = &payload_fn;
        let entries: Vec<CampaignEntry> = stream::iter(members)
            .map(|member| self.run_member(member, kind, payload_fn))
            .buffered(self.concurrency)
            .collect()
            .await;

        let result = CampaignResult::new(entries);
        tracing::info!(
            "📊 Campaign '{kind}' done: {} delivered, {} failed, {} skipped",
            result.delivered(),
            result.failed(),
            result.skipped()
        );
        Ok(result)
    }

    async fn resolve(&self, cohort: &Cohort) -> Result<Vec<Member>> {
        match cohort {
            Cohort::Everyone => Ok(self.store.list_users(None).await?.into_iter().map(Member::Found).collect()),
            Cohort::Role(role) => Ok(self
                .store
                .list_users(Some(*role))
                .await?
                .into_iter()
                .map(Member::Found)
                .collect()),
            Cohort::Users(ids) => {
                let mut members = Vec::with_capacity(ids.len());
                for id in ids {
                    let member = match self.store.get_user(id).await {
                        Ok(Some(user)) => Member::Found(user),
                        Ok(None) => Member::Unresolved {
                            id: id.clone(),
                            reason: ERR_USER_NOT_FOUND.to_string(),
                        },
                        Err(e) => Member::Unresolved {
                            id: id.clone(),
                            reason: e.to_string(),
                        },
                    };
                    members.push(member);
                }
                Ok(members)
            }
        }
    }

    async fn run_member<F, Fut>(&self, member: Member, kind: NotificationKind, payload_fn: &F) -> CampaignEntry
    where
        F: Fn(User) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Option<Payload>>> + Send,
    {
        let user = match member {
            Member::Found(user) => user,
            Member::Unresolved { id, reason } => {
                tracing::warn!("⚠️ Campaign '{kind}': {id}: {reason}");
                return CampaignEntry {
                    result: DispatchResult::failed(&id, reason),
                    user_id: id,
                };
            }
        };

        if let Err(rejected) = self.dispatcher.check_recipient(&user) {
            return CampaignEntry {
                result: self.dispatcher.reject(&user, kind, rejected),
                user_id: user.id,
            };
        }

        let user_id = user.id.clone();
        let attempt = AssertUnwindSafe(async {
            match payload_fn(user.clone()).await {
                Ok(Some(payload)) if payload.kind() != kind => DispatchResult::failed(
                    &user.id,
                    format!("payload kind '{}' does not match campaign kind '{kind}'", payload.kind()),
                ),
                Ok(Some(payload)) => self.dispatcher.dispatch(&user, &payload).await,
                Ok(None) => DispatchResult::skipped(&user.id, SKIP_NOTHING_TO_SEND),
                Err(e) => {
                    tracing::warn!("⚠️ Campaign '{kind}': could not prepare message for {}: {e}", user.id);
                    DispatchResult::failed(&user.id, e.to_string())
                }
            }
        })
        .catch_unwind()
        .await;

        let result = attempt.unwrap_or_else(|_| {
            tracing::error!("💥 Campaign '{kind}': panic while handling {user_id}");
            DispatchResult::failed(&user_id, "internal error while preparing notification")
        });
        CampaignEntry { user_id, result }
    }
}
