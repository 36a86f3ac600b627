//! Deferred task queues
//!
//! Two independent durable queues share the claim/retry pattern: download
//! tasks (one per meeting, claimed when their execute time passes) and
//! game-night notifications (claimed and delivered as whole batches).

mod dispatch;
mod notify;
mod store;
mod worker;

pub use dispatch::{
    DeliveryError, DispatchError, Dispatcher, HttpDispatcher, HttpNotificationSender,
    NotificationSender,
};
pub use notify::{NotificationStore, NotificationTask, NotifyStatus};
pub use store::{DownloadTask, QueueError, TaskStatus, TaskStore};
pub use worker::{DownloadQueueWorker, NotificationWorker};
