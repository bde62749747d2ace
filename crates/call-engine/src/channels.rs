//! The engine's communication endpoints
//!
//! Buffering is the caller's decision: every channel is created outside the
//! engine and handed to it. A full error channel makes the reporting step
//! wait; errors are never dropped to relieve pressure.

use sigflow_sip_core::Message;
use tokio::sync::mpsc;

use crate::error::EngineError;

/// Inbound, egress and error channels used by an [`Engine`](crate::Engine)
#[derive(Debug)]
pub struct ChannelMap {
    /// Decoded messages waiting for dispatch
    pub inbound_tx: mpsc::Sender<Message>,
    pub inbound_rx: mpsc::Receiver<Message>,
    /// Messages re-emitted by steps
    pub egress: mpsc::Sender<Message>,
    pub errors: mpsc::Sender<EngineError>,
}

impl ChannelMap {
    pub fn new(
        inbound_tx: mpsc::Sender<Message>,
        inbound_rx: mpsc::Receiver<Message>,
        egress: mpsc::Sender<Message>,
        errors: mpsc::Sender<EngineError>,
    ) -> Self {
        Self {
            inbound_tx,
            inbound_rx,
            egress,
            errors,
        }
    }

    /// Bounded channels with the given capacities (at least one each).
    ///
    /// Returns the map together with the egress and error receivers.
    pub fn bounded(
        inbound: usize,
        egress: usize,
        errors: usize,
    ) -> (Self, mpsc::Receiver<Message>, mpsc::Receiver<EngineError>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound.max(1));
        let (egress_tx, egress_rx) = mpsc::channel(egress.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(errors.max(1));
        (
            Self::new(inbound_tx, inbound_rx, egress_tx, errors_tx),
            egress_rx,
            errors_rx,
        )
    }
}
