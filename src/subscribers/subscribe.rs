//! # Core subscriber trait
//!
//! `Subscribe` is the extension point the UI layer (or any other collaborator) uses to
//! observe child lifecycle and crash telemetry events. Each subscriber is driven by a
//! dedicated worker loop fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, IPC to a renderer, capture of crash records);
//!   they do **not** block the publisher nor other subscribers.
//! - Each subscriber declares its queue capacity via [`Subscribe::queue_capacity`].
//!   If the queue overflows, events for that subscriber are dropped and a
//!   `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use launchvisor::{Event, EventKind, Subscribe};
//!
//! struct RendererBridge;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for RendererBridge {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ChildExited {
//!             // forward `game-exit` to the window...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "renderer-bridge" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
