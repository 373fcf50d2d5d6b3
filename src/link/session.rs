// Link session: connection state machine around the transmission gate
//
//   Disconnected --Connect--> Connecting --ok--> Connected
//        ^                        |                  |
//        +--------fail------------+                  |
//        +------Disconnect / link lost---------------+
//
// Opening the link runs as a spawned task; its result is picked up by `poll`
// on the next loop iteration, so a slow open never stalls the frame loop.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::gate::{LinkLost, SendOutcome, TransmissionGate};
use super::{Connector, LinkError};
use crate::config::GateConfig;
use crate::messages::LinkRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

type PendingConnect<C> = oneshot::Receiver<Result<<C as Connector>::Link, LinkError>>;

pub struct LinkSession<C: Connector> {
    connector: Arc<C>,
    state: LinkState,
    gate: TransmissionGate<C::Link>,
    pending: Option<PendingConnect<C>>,
    lost_rx: mpsc::UnboundedReceiver<LinkLost>,
}

impl<C: Connector> LinkSession<C> {
    pub fn new(connector: C, gate_config: GateConfig) -> Self {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        Self {
            connector: Arc::new(connector),
            state: LinkState::Disconnected,
            gate: TransmissionGate::new(gate_config, lost_tx),
            pending: None,
            lost_rx,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn gate(&self) -> &TransmissionGate<C::Link> {
        &self.gate
    }

    /// Handle an operator request
    pub fn request(&mut self, request: LinkRequest) {
        match request {
            LinkRequest::Connect => {
                if self.state != LinkState::Disconnected {
                    debug!("Connect ignored, link is {:?}", self.state);
                    return;
                }
                info!("Connecting to {}", self.connector.target());
                self.state = LinkState::Connecting;

                let (tx, rx) = oneshot::channel();
                let connect = self.connector.connect();
                tokio::spawn(async move {
                    // Receiver is dropped if the connect was cancelled
                    let _ = tx.send(connect.await);
                });
                self.pending = Some(rx);
            }
            LinkRequest::Disconnect => {
                if self.state != LinkState::Disconnected {
                    info!("Disconnecting from {}", self.connector.target());
                }
                self.disconnect();
            }
        }
    }

    fn disconnect(&mut self) {
        self.pending = None;
        self.gate.disconnect();
        self.state = LinkState::Disconnected;
    }

    /// Pick up connect results and link-loss notices. Call once per frame.
    pub fn poll(&mut self) {
        if let Some(mut rx) = self.pending.take() {
            match rx.try_recv() {
                Ok(Ok(link)) => {
                    info!("Link connected: {}", self.connector.target());
                    self.gate.connect(link);
                    self.state = LinkState::Connected;
                }
                Ok(Err(e)) => {
                    warn!("Link connection failed: {}", e);
                    self.state = LinkState::Disconnected;
                }
                Err(oneshot::error::TryRecvError::Empty) => {
                    self.pending = Some(rx);
                }
                Err(oneshot::error::TryRecvError::Closed) => {
                    warn!("Link connection task ended without a result");
                    self.state = LinkState::Disconnected;
                }
            }
        }

        while let Ok(lost) = self.lost_rx.try_recv() {
            // Notices from an earlier connection are stale
            if self.state == LinkState::Connected && lost.epoch == self.gate.epoch() {
                warn!("Link lost: {}", lost.error);
                self.disconnect();
            }
        }
    }

    /// Offer a frame to the gate
    pub fn send(&mut self, frame: &str) -> SendOutcome {
        self.gate.send(frame)
    }
}
