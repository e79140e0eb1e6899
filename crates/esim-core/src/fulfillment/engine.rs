//! Fulfillment engine
//!
//! Drives a [`Fulfiller`] from a stream of webhook deliveries and reports
//! progress as [`FulfillmentEvent`]s.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ webhook stream   │─── BillingEvent ───┐
//! └──────────────────┘                    │
//!                                         ▼
//!                               ┌───────────────────┐
//!                               │ FulfillmentEngine │
//!                               └───────────────────┘
//!                                         │
//!            ┌────────────────────────────┼────────────────────────────┐
//!            ▼                            ▼                            ▼
//!   ┌─────────────────┐         ┌──────────────────┐         ┌─────────────────┐
//!   │ FulfillmentStore│         │   EsimGateway    │         │     Events      │
//!   │ (claim, commit) │         │   (provision)    │         │    (notify)     │
//!   └─────────────────┘         └──────────────────┘         └─────────────────┘
//! ```
//!
//! Deliveries are handled one at a time. A failing delivery is logged and
//! reported; the engine keeps running.

use crate::error::Result;
use crate::fulfillment::{BillingEvent, Fulfiller, FulfillmentReport, LineState};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the FulfillmentEngine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FulfillmentEvent {
    /// Engine started
    Started,

    /// Delivery received
    DeliveryReceived { event_id: String, event_type: String },

    /// Line item billed and provisioned (or a plan update)
    LineFulfilled { event_id: String, line_item_id: String },

    /// Line item billed, vendor side pending reconciliation
    LineNeedsReconciliation {
        event_id: String,
        line_item_id: String,
        code: String,
    },

    /// Line item already handled by an earlier delivery
    LineDuplicate { event_id: String, line_item_id: String },

    /// Line item price not in the catalog
    LineSkipped { event_id: String, line_item_id: String },

    /// No user could be resolved for the delivery
    UserUnresolved { event_id: String },

    /// Delivery failed before completion
    DeliveryFailed { event_id: String, error: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// Counters of one engine run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineSummary {
    /// Deliveries handled (including ignored ones)
    pub processed: usize,
    /// Deliveries that returned an error
    pub failed: usize,
    /// Lines left awaiting reconciliation
    pub needs_reconciliation: usize,
}

/// Webhook fulfillment engine
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When the consumer falls behind,
/// events are dropped with a warning instead of growing memory.
pub struct FulfillmentEngine {
    fulfiller: Fulfiller,
    event_tx: mpsc::Sender<FulfillmentEvent>,
}

impl FulfillmentEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        fulfiller: Fulfiller,
        event_channel_capacity: usize,
    ) -> (Self, mpsc::Receiver<FulfillmentEvent>) {
        let (tx, rx) = mpsc::channel(event_channel_capacity.max(1));
        (
            Self {
                fulfiller,
                event_tx: tx,
            },
            rx,
        )
    }

    /// Run until the delivery stream ends or Ctrl-C is received
    pub async fn run<S>(&self, deliveries: S) -> Result<EngineSummary>
    where
        S: Stream<Item = BillingEvent> + Unpin,
    {
        self.run_with_shutdown(deliveries, None).await
    }

    /// Run until the delivery stream ends or a shutdown signal is received
    ///
    /// # Parameters
    ///
    /// - `deliveries`: Webhook deliveries, handled in order
    /// - `shutdown_rx`: Shutdown signal; Ctrl-C is used when `None`
    pub async fn run_with_shutdown<S>(
        &self,
        mut deliveries: S,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<EngineSummary>
    where
        S: Stream<Item = BillingEvent> + Unpin,
    {
        self.emit_event(FulfillmentEvent::Started);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        let mut summary = EngineSummary::default();
        let reason = loop {
            tokio::select! {
                next = deliveries.next() => {
                    let Some(delivery) = next else {
                        break "Delivery stream ended";
                    };
                    self.handle_delivery(&delivery, &mut summary).await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break "Shutdown signal";
                }
            }
        };

        info!(
            processed = summary.processed,
            failed = summary.failed,
            needs_reconciliation = summary.needs_reconciliation,
            "Fulfillment engine stopped"
        );
        self.emit_event(FulfillmentEvent::Stopped {
            reason: reason.to_string(),
        });

        Ok(summary)
    }

    async fn handle_delivery(&self, delivery: &BillingEvent, summary: &mut EngineSummary) {
        summary.processed += 1;
        self.emit_event(FulfillmentEvent::DeliveryReceived {
            event_id: delivery.id.clone(),
            event_type: delivery.event_type.clone(),
        });

        match self.fulfiller.handle_event(delivery).await {
            Ok(report) => self.emit_report(&report, summary),
            Err(e) => {
                summary.failed += 1;
                error!(
                    event_id = %delivery.id,
                    code = %e.code(),
                    error = %e,
                    "Failed to fulfill delivery"
                );
                self.emit_event(FulfillmentEvent::DeliveryFailed {
                    event_id: delivery.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit_report(&self, report: &FulfillmentReport, summary: &mut EngineSummary) {
        match report {
            FulfillmentReport::Ignored { .. } => {}
            FulfillmentReport::Unresolved { event_id, .. } => {
                self.emit_event(FulfillmentEvent::UserUnresolved {
                    event_id: event_id.clone(),
                });
            }
            FulfillmentReport::Fulfilled {
                event_id, lines, ..
            } => {
                for line in lines {
                    let event_id = event_id.clone();
                    let line_item_id = line.line_item_id.clone();
                    let event = match &line.state {
                        LineState::PlanUpdated { .. } | LineState::Provisioned { .. } => {
                            FulfillmentEvent::LineFulfilled {
                                event_id,
                                line_item_id,
                            }
                        }
                        LineState::NeedsReconciliation { code, .. } => {
                            summary.needs_reconciliation += 1;
                            FulfillmentEvent::LineNeedsReconciliation {
                                event_id,
                                line_item_id,
                                code: code.clone(),
                            }
                        }
                        LineState::Duplicate => FulfillmentEvent::LineDuplicate {
                            event_id,
                            line_item_id,
                        },
                        LineState::UnknownPrice => FulfillmentEvent::LineSkipped {
                            event_id,
                            line_item_id,
                        },
                    };
                    self.emit_event(event);
                }
            }
        }
    }

    /// Emit an engine event, dropping it with a warning when the channel is full
    fn emit_event(&self, event: FulfillmentEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider increasing the event channel capacity."
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, discarding event");
            }
        }
    }
}
