//! GraphQL subscriptions for real-time updates (§6 External Interfaces).
//!
//! Subscriptions allow clients to receive push updates over WebSocket.

use std::sync::Arc;

use async_graphql::{Context, Subscription};
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::services::logging::LogEvent;
use crate::services::notifications::JobNotificationFabric;

use super::types::{JobNotification, LogEntry};

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Subscribe to job-progress updates, optionally narrowed to a single library section.
    async fn job_notifications<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        library_section_id: Option<i64>,
    ) -> impl Stream<Item = JobNotification> + 'ctx {
        let fabric = ctx.data_unchecked::<JobNotificationFabric>();
        let receiver = fabric.subscribe();

        BroadcastStream::new(receiver).filter_map(move |result| {
            result.ok().and_then(|snapshot| {
                if library_section_id.is_some_and(|id| id != snapshot.library_section_id) {
                    None
                } else {
                    Some(JobNotification::from(snapshot))
                }
            })
        })
    }

    /// Subscribe to metadata refreshes, optionally narrowed to a single item's uuid.
    async fn metadata_item_updated<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        uuid: Option<Uuid>,
    ) -> impl Stream<Item = Uuid> + 'ctx {
        let updates = ctx.data_unchecked::<broadcast::Sender<Uuid>>();
        let receiver = updates.subscribe();

        BroadcastStream::new(receiver)
            .filter_map(move |result| result.ok())
            .filter(move |updated| uuid.is_none_or(|wanted| wanted == *updated))
    }

    /// Subscribe to application log lines, mirroring the level/target fan-out recorded by the
    /// database logging layer.
    async fn logs<'ctx>(&self, ctx: &Context<'ctx>) -> impl Stream<Item = LogEntry> + 'ctx {
        let sender = ctx.data_unchecked::<broadcast::Sender<LogEvent>>();
        let receiver = sender.subscribe();

        BroadcastStream::new(receiver).filter_map(|result| result.ok().map(LogEntry::from))
    }
}
