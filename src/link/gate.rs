// Transmission gate
//
// The link is half-duplex and cannot take overlapping writes, and the firmware
// chokes on floods. The gate sits between the control loop and the transport:
// - at most one write is outstanding at any instant (both modes)
// - throttled mode also spaces dispatches by `send_interval`
// - dropped frames are not errors; the next loop iteration sends a fresh one
//
// The in-flight flag is set synchronously in `send` before the write is spawned
// and cleared by a drop guard owned by the write task, so every exit path
// (success, error, timeout, panic, abort) releases it.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{LinkError, Transport};
use crate::config::{GateConfig, GateMode};

/// What happened to a frame handed to [`TransmissionGate::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// No link; nothing to do
    NotConnected,
    /// Too soon after the previous dispatch
    Throttled,
    /// A previous write is still outstanding
    Busy,
    /// Write spawned
    Dispatched,
}

/// Link lost during a write, tagged with the connection epoch it happened in
#[derive(Debug)]
pub struct LinkLost {
    pub epoch: u64,
    pub error: LinkError,
}

#[derive(Debug, Default)]
struct InFlight {
    busy: bool,
    epoch: u64,
}

/// Clears the busy flag when dropped, unless the gate was reset since
struct InFlightGuard {
    slot: Arc<Mutex<InFlight>>,
    epoch: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.epoch == self.epoch {
            slot.busy = false;
        }
    }
}

fn lock(slot: &Mutex<InFlight>) -> MutexGuard<'_, InFlight> {
    // The critical sections never panic, but don't let poisoning wedge the gate
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct TransmissionGate<T: Transport> {
    config: GateConfig,
    link: Option<Arc<T>>,
    in_flight: Arc<Mutex<InFlight>>,
    last_send: Option<Instant>,
    lost_tx: UnboundedSender<LinkLost>,
}

impl<T: Transport> TransmissionGate<T> {
    /// Create a disconnected gate. Link-loss notices are sent on `lost_tx`.
    pub fn new(config: GateConfig, lost_tx: UnboundedSender<LinkLost>) -> Self {
        Self {
            config,
            link: None,
            in_flight: Arc::new(Mutex::new(InFlight::default())),
            last_send: None,
            lost_tx,
        }
    }

    /// Attach a freshly opened link, starting from clean state
    pub fn connect(&mut self, link: T) {
        self.reset();
        self.link = Some(Arc::new(link));
    }

    /// Drop the link and clear all state. An outstanding write keeps running
    /// detached but can no longer affect this gate.
    pub fn disconnect(&mut self) {
        self.reset();
        self.link = None;
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.in_flight).busy
    }

    /// Connection epoch; bumped on every connect and disconnect
    pub fn epoch(&self) -> u64 {
        lock(&self.in_flight).epoch
    }

    fn reset(&mut self) {
        let mut slot = lock(&self.in_flight);
        slot.epoch = slot.epoch.wrapping_add(1);
        slot.busy = false;
        self.last_send = None;
    }

    /// Offer a frame for transmission. Never blocks and never fails.
    pub fn send(&mut self, frame: &str) -> SendOutcome {
        let Some(link) = &self.link else {
            return SendOutcome::NotConnected;
        };

        let now = Instant::now();
        if self.config.mode == GateMode::Throttled {
            if let Some(last) = self.last_send {
                if now.duration_since(last) < self.config.send_interval {
                    return SendOutcome::Throttled;
                }
            }
        }

        let guard = {
            let mut slot = lock(&self.in_flight);
            if slot.busy {
                return SendOutcome::Busy;
            }
            slot.busy = true;
            InFlightGuard {
                slot: Arc::clone(&self.in_flight),
                epoch: slot.epoch,
            }
        };
        self.last_send = Some(now);

        let mut bytes = Vec::with_capacity(frame.len() + 2);
        bytes.extend_from_slice(frame.as_bytes());
        bytes.extend_from_slice(self.config.line_ending.as_str().as_bytes());

        debug!("TX {}", frame);
        let write = link.write(bytes);
        let write_timeout = self.config.write_timeout;
        let lost_tx = self.lost_tx.clone();

        tokio::spawn(async move {
            let guard = guard;
            let result = match write_timeout {
                Some(limit) => match tokio::time::timeout(limit, write).await {
                    Ok(result) => result,
                    Err(_) => Err(LinkError::Timeout(limit)),
                },
                None => write.await,
            };

            if let Err(error) = result {
                warn!("TX error: {}", error);
                if error.is_disconnect() {
                    // Receiver is gone only when the session is being torn down
                    let _ = lost_tx.send(LinkLost {
                        epoch: guard.epoch,
                        error,
                    });
                }
            }
            drop(guard);
        });

        SendOutcome::Dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::link::testing::{settle, MockBehavior, MockLink};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn gate(mode: GateMode) -> (TransmissionGate<MockLink>, mpsc::UnboundedReceiver<LinkLost>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = GateConfig {
            mode,
            ..GateConfig::default()
        };
        (TransmissionGate::new(config, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_connected_is_noop() {
        let (mut gate, _rx) = gate(GateMode::Throttled);
        assert_eq!(gate.send("LF000RF000"), SendOutcome::NotConnected);
        assert!(!gate.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_appends_line_ending() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = GateConfig {
            line_ending: LineEnding::CrLf,
            ..GateConfig::default()
        };
        let mut gate = TransmissionGate::new(config, tx);
        let link = MockLink::new(MockBehavior::Succeed);
        gate.connect(link.clone());

        assert_eq!(gate.send("LF007RB255"), SendOutcome::Dispatched);
        assert_eq!(link.writes(), vec![b"LF007RB255\r\n".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_burst_writes_once() {
        let (mut gate, _rx) = gate(GateMode::Throttled);
        let link = MockLink::new(MockBehavior::Succeed);
        gate.connect(link.clone());

        assert_eq!(gate.send("LF001RF001"), SendOutcome::Dispatched);
        settle().await;
        for _ in 0..10 {
            tokio::time::advance(Duration::from_millis(5)).await;
            assert_eq!(gate.send("LF002RF002"), SendOutcome::Throttled);
        }
        assert_eq!(link.write_count(), 1);

        // 50ms elapsed so far; the interval is 80ms
        tokio::time::advance(Duration::from_millis(30)).await;
        assert_eq!(gate.send("LF003RF003"), SendOutcome::Dispatched);
        assert_eq!(link.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_mode_still_single_in_flight() {
        let (mut gate, _rx) = gate(GateMode::Throttled);
        let link = MockLink::new(MockBehavior::Hang);
        gate.connect(link.clone());

        assert_eq!(gate.send("LF001RF001"), SendOutcome::Dispatched);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(gate.send("LF002RF002"), SendOutcome::Busy);
        assert_eq!(link.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exclusive_drops_while_in_flight() {
        let (mut gate, _rx) = gate(GateMode::Exclusive);
        let link = MockLink::new(MockBehavior::Hold);
        gate.connect(link.clone());

        assert_eq!(gate.send("LF001RF001"), SendOutcome::Dispatched);
        for _ in 0..5 {
            assert_eq!(gate.send("LF002RF002"), SendOutcome::Busy);
        }
        assert_eq!(link.write_count(), 1);
        assert!(gate.is_busy());

        link.release();
        settle().await;
        assert!(!gate.is_busy());
        assert_eq!(gate.send("LF003RF003"), SendOutcome::Dispatched);
        assert_eq!(link.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_releases_flag() {
        let (mut gate, mut rx) = gate(GateMode::Exclusive);
        let link = MockLink::new(MockBehavior::FailIo);
        gate.connect(link.clone());

        assert_eq!(gate.send("LF001RF001"), SendOutcome::Dispatched);
        settle().await;
        assert!(!gate.is_busy());
        // A plain IO failure does not report the link as lost
        assert!(rx.try_recv().is_err());
        assert_eq!(gate.send("LF001RF001"), SendOutcome::Dispatched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_failure_reports_lost() {
        let (mut gate, mut rx) = gate(GateMode::Exclusive);
        gate.connect(MockLink::new(MockBehavior::FailDisconnected));
        let epoch = gate.epoch();

        gate.send("LF001RF001");
        settle().await;
        let lost = rx.try_recv().unwrap();
        assert_eq!(lost.epoch, epoch);
        assert!(lost.error.is_disconnect());
        assert!(!gate.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_send_clears_flag() {
        let (mut gate, _rx) = gate(GateMode::Exclusive);
        let stalled = MockLink::new(MockBehavior::Hold);
        gate.connect(stalled.clone());
        assert_eq!(gate.send("LF001RF001"), SendOutcome::Dispatched);
        assert!(gate.is_busy());

        gate.disconnect();
        assert!(!gate.is_busy());
        assert!(!gate.is_connected());

        // Reconnect starts clean; the old write finishing must not release the new one
        let fresh = MockLink::new(MockBehavior::Hold);
        gate.connect(fresh.clone());
        assert_eq!(gate.send("LF002RF002"), SendOutcome::Dispatched);
        stalled.release();
        settle().await;
        assert!(gate.is_busy());
        assert_eq!(gate.send("LF003RF003"), SendOutcome::Busy);
        assert_eq!(fresh.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resets_throttle() {
        let (mut gate, _rx) = gate(GateMode::Throttled);
        let link = MockLink::new(MockBehavior::Succeed);
        gate.connect(link.clone());
        gate.send("LF001RF001");
        settle().await;

        gate.disconnect();
        gate.connect(link.clone());
        assert_eq!(gate.send("LF002RF002"), SendOutcome::Dispatched);
        assert_eq!(link.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_releases_stalled_write() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = GateConfig {
            mode: GateMode::Exclusive,
            write_timeout: Some(Duration::from_millis(200)),
            ..GateConfig::default()
        };
        let mut gate = TransmissionGate::new(config, tx);
        gate.connect(MockLink::new(MockBehavior::Hang));

        gate.send("LF001RF001");
        settle().await;
        assert!(gate.is_busy());

        tokio::time::sleep(Duration::from_millis(250)).await;
        settle().await;
        assert!(!gate.is_busy());
    }
}
