//! Notification fan-out.
//!
//! Writes hand a [`ContentEvent`] to the [`NotificationDispatcher`], which
//! queues it for a background worker and returns immediately. The worker
//! resolves recipients and delivers through the [`NotificationSink`]; every
//! delivery is independent and failures are only logged and counted.

use crate::clients::{Notification, NotificationSink};
use crate::db::SubscriptionStore;
use crate::metrics::NOTIFICATION_DELIVERY_TOTAL;
use crate::models::{Actor, ContentItem, SubscriptionTarget};
use crate::services::feed::truncate_chars;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub const TOPIC_FEEDBACK: &str = "interactive.feedback";
pub const TOPIC_SUBSCRIPTION: &str = "interactive.subscription";

#[derive(Debug, Clone)]
pub enum ContentEvent {
    Replied {
        actor: Actor,
        parent: ContentItem,
        reply: ContentItem,
    },
    Reacted {
        actor: Actor,
        item: ContentItem,
        symbol: String,
    },
    Published {
        actor: Actor,
        item: ContentItem,
    },
}

impl ContentEvent {
    fn label(&self) -> &'static str {
        match self {
            ContentEvent::Replied { .. } => "replied",
            ContentEvent::Reacted { .. } => "reacted",
            ContentEvent::Published { .. } => "published",
        }
    }
}

/// Handle used by the write paths. Cloning shares the same worker.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<ContentEvent>,
}

impl NotificationDispatcher {
    /// Starts the background worker. The worker exits once every dispatcher
    /// clone has been dropped.
    pub fn spawn(fanout: NotificationFanout) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ContentEvent>();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                fanout.handle(event).await;
            }
            debug!("notification worker stopped");
        });
        (Self { tx }, handle)
    }

    /// Never blocks and never fails the caller.
    pub fn dispatch(&self, event: ContentEvent) {
        let label = event.label();
        if self.tx.send(event).is_err() {
            warn!(event = label, "notification worker is gone, dropping event");
            NOTIFICATION_DELIVERY_TOTAL
                .with_label_values(&[label, "dropped"])
                .inc();
        }
    }
}

/// Recipient resolution and delivery for a single event.
pub struct NotificationFanout {
    sink: Arc<dyn NotificationSink>,
    subscriptions: Arc<dyn SubscriptionStore>,
    preview_length: usize,
}

impl NotificationFanout {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        subscriptions: Arc<dyn SubscriptionStore>,
        preview_length: usize,
    ) -> Self {
        Self {
            sink,
            subscriptions,
            preview_length,
        }
    }

    pub async fn handle(&self, event: ContentEvent) {
        let label = event.label();
        match event {
            ContentEvent::Replied {
                actor,
                parent,
                reply,
            } => {
                if parent.author_id == actor.id {
                    return;
                }
                let noun = kind_noun(&parent);
                let notification = Notification {
                    topic: TOPIC_FEEDBACK.to_string(),
                    subject: format!("{} got replied", capitalize(noun)),
                    subtitle: Some(format!("{} replied you", actor.nick)),
                    body: format!("{} ({}) replied your {}.", actor.nick, actor.name, noun),
                    links: content_links(&reply),
                };
                self.deliver_one(label, parent.author_id, &notification)
                    .await;
            }
            ContentEvent::Reacted {
                actor,
                item,
                symbol,
            } => {
                if item.author_id == actor.id {
                    return;
                }
                let noun = kind_noun(&item);
                let notification = Notification {
                    topic: TOPIC_FEEDBACK.to_string(),
                    subject: format!("{} got reacted", capitalize(noun)),
                    subtitle: None,
                    body: format!(
                        "{} ({}) reacted your {} a {}.",
                        actor.nick, actor.name, noun, symbol
                    ),
                    links: content_links(&item),
                };
                self.deliver_one(label, item.author_id, &notification).await;
            }
            ContentEvent::Published { actor, item } => {
                self.fan_out_to_subscribers(label, &actor, &item).await;
            }
        }
    }

    /// Author followers first, then followers of each tag, category and the
    /// realm. An account is notified at most once per item and never for its
    /// own item.
    async fn fan_out_to_subscribers(&self, label: &str, actor: &Actor, item: &ContentItem) {
        let mut notified: HashSet<Uuid> = HashSet::new();
        notified.insert(actor.id);
        let noun = kind_noun(item);
        let body = self.preview(item);

        let mut groups: Vec<(SubscriptionTarget, String)> = vec![(
            SubscriptionTarget::Account(item.author_id),
            format!("New {} from {} ({})", noun, actor.nick, actor.name),
        )];
        for tag in &item.tags {
            groups.push((
                SubscriptionTarget::Tag(tag.id),
                format!("New {} in {} by {} ({})", noun, tag.name, actor.nick, actor.name),
            ));
        }
        for category in &item.categories {
            groups.push((
                SubscriptionTarget::Category(category.id),
                format!(
                    "New {} in {} by {} ({})",
                    noun, category.name, actor.nick, actor.name
                ),
            ));
        }
        if let Some(realm_id) = item.realm_id {
            let area = item.area_alias.clone().unwrap_or_else(|| realm_id.to_string());
            groups.push((
                SubscriptionTarget::Realm(realm_id),
                format!("New {} in {} by {} ({})", noun, area, actor.nick, actor.name),
            ));
        }

        for (target, subject) in groups {
            let followers = match self.subscriptions.followers_of(&[target]).await {
                Ok(followers) => followers,
                Err(err) => {
                    warn!(
                        item_id = %item.id,
                        target = ?target,
                        error = %err,
                        "failed to resolve subscribers"
                    );
                    NOTIFICATION_DELIVERY_TOTAL
                        .with_label_values(&[label, "failed"])
                        .inc();
                    continue;
                }
            };
            let recipients: Vec<Uuid> = followers
                .into_iter()
                .filter(|id| notified.insert(*id))
                .collect();
            if recipients.is_empty() {
                continue;
            }

            let notification = Notification {
                topic: TOPIC_SUBSCRIPTION.to_string(),
                subject,
                subtitle: Some("From your subscription".to_string()),
                body: body.clone(),
                links: content_links(item),
            };
            self.deliver_batch(label, &recipients, &notification).await;
        }
    }

    async fn deliver_one(&self, label: &str, account_id: Uuid, notification: &Notification) {
        match self.sink.notify(account_id, notification).await {
            Ok(()) => {
                NOTIFICATION_DELIVERY_TOTAL
                    .with_label_values(&[label, "sent"])
                    .inc();
            }
            Err(err) => {
                warn!(%account_id, event = label, error = %err, "notification delivery failed");
                NOTIFICATION_DELIVERY_TOTAL
                    .with_label_values(&[label, "failed"])
                    .inc();
            }
        }
    }

    async fn deliver_batch(&self, label: &str, account_ids: &[Uuid], notification: &Notification) {
        match self.sink.notify_batch(account_ids, notification).await {
            Ok(()) => {
                NOTIFICATION_DELIVERY_TOTAL
                    .with_label_values(&[label, "sent"])
                    .inc_by(account_ids.len() as u64);
            }
            Err(err) => {
                warn!(
                    recipients = account_ids.len(),
                    event = label,
                    error = %err,
                    "batch notification delivery failed"
                );
                NOTIFICATION_DELIVERY_TOTAL
                    .with_label_values(&[label, "failed"])
                    .inc_by(account_ids.len() as u64);
            }
        }
    }

    /// Optional title line followed by a shortened content preview.
    fn preview(&self, item: &ContentItem) -> String {
        let content = item.content().unwrap_or_default();
        let content = truncate_chars(content, self.preview_length)
            .map(|cut| format!("{}...", cut))
            .unwrap_or_else(|| content.to_string());
        match item.title() {
            Some(title) if !title.is_empty() => format!("{}\n{}", title, content),
            _ => content,
        }
    }
}

fn kind_noun(item: &ContentItem) -> &'static str {
    item.kind.as_str()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn content_links(item: &ContentItem) -> HashMap<String, String> {
    HashMap::from([
        ("content_kind".to_string(), item.kind.as_str().to_string()),
        ("content_id".to_string(), item.id.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_item, ContentKind};

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("post"), "Post");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn links_point_at_item() {
        let item = sample_item(ContentKind::Article, Uuid::new_v4());
        let links = content_links(&item);
        assert_eq!(links["content_kind"], "article");
        assert_eq!(links["content_id"], item.id.to_string());
    }
}
