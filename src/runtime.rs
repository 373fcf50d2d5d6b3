// Frame-driven control loop
// Each tick: latest detection -> channel assignment -> frame -> transmission gate.
// Transmission is spawned by the gate, so a slow or stalled write never delays
// the next tick.

use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

// local imports
use crate::config::{Config, DETECTION_TIMEOUT, TOPIC_DETECTIONS, TOPIC_LINK_CMD, TOPIC_STATUS};
use crate::control::{encode, ChannelAssignment, HandAssigner, SignalMapper};
use crate::link::{Connector, LinkSession, SerialConnector};
use crate::messages::{DetectionFrame, DetectorHealth, FrameReport, LinkRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No detection has arrived yet; nothing is sent
    Idle,
    /// Producing one frame per tick
    Running,
}

pub struct ControlLoop<C: Connector> {
    state: LoopState,
    assigner: HandAssigner,
    session: LinkSession<C>,
    latest: Option<DetectionFrame>,
    detection_received_at: Instant,
    detection_timeout: Duration,
    health: DetectorHealth,
    last_timestamp: Option<u64>,
    assignment: ChannelAssignment,
}

impl<C: Connector> ControlLoop<C> {
    pub fn new(assigner: HandAssigner, session: LinkSession<C>) -> Self {
        Self {
            state: LoopState::Idle,
            assigner,
            session,
            latest: None,
            detection_received_at: Instant::now(),
            detection_timeout: DETECTION_TIMEOUT,
            health: DetectorHealth::Stale, // Start stale until first detection
            last_timestamp: None,
            assignment: ChannelAssignment::default(),
        }
    }

    /// Override how long the loop trusts the last detection
    pub fn with_detection_timeout(mut self, timeout: Duration) -> Self {
        self.detection_timeout = timeout;
        self
    }

    pub fn health(&self) -> DetectorHealth {
        self.health
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &LinkSession<C> {
        &self.session
    }

    /// Store the newest detector output
    pub fn on_detection(&mut self, frame: DetectionFrame) {
        if self.state == LoopState::Idle {
            info!("Detector online, control loop running");
            self.state = LoopState::Running;
        }
        self.latest = Some(frame);
        self.detection_received_at = Instant::now();
    }

    pub fn on_link_request(&mut self, request: LinkRequest) {
        info!("Link request: {:?}", request);
        self.session.request(request);
    }

    /// Run one iteration. Returns None while idle.
    pub fn tick(&mut self) -> Option<FrameReport> {
        self.session.poll();

        if self.state == LoopState::Idle {
            return None;
        }

        let detection_age = self.detection_received_at.elapsed();
        if detection_age > self.detection_timeout {
            // Watchdog triggered - detector went quiet, stop both motors
            if self.health != DetectorHealth::Stale {
                warn!("Detection stale ({:?} old), stopping motors", detection_age);
            }
            self.health = DetectorHealth::Stale;
            self.assignment = ChannelAssignment::default();
            // Force a fresh assignment once detections resume
            self.last_timestamp = None;
        } else if let Some(frame) = &self.latest {
            if self.health != DetectorHealth::Ok {
                info!("Detections flowing");
            }
            self.health = DetectorHealth::Ok;
            // Only re-run assignment when the detector produced a new frame
            if self.last_timestamp != Some(frame.timestamp_ms) {
                self.assignment = self.assigner.assign(&frame.hands);
                self.last_timestamp = Some(frame.timestamp_ms);
            }
        }

        let left = self.assignment.left;
        let right = self.assignment.right;
        let packet = encode(left, right);
        let outcome = self.session.send(&packet);

        Some(FrameReport {
            left,
            right,
            packet,
            outcome,
            link: self.session.state(),
            detector: self.health,
            hands: self.assignment.indicators.clone(),
        })
    }
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_detections = session.declare_subscriber(TOPIC_DETECTIONS).await?;
    let sub_link = session.declare_subscriber(TOPIC_LINK_CMD).await?;
    let pub_status = session.declare_publisher(TOPIC_STATUS).await?;

    let assigner = HandAssigner::new(SignalMapper::new(config.deadzone));
    let link = LinkSession::new(SerialConnector::from_config(&config.link), config.gate);
    let mut control =
        ControlLoop::new(assigner, link).with_detection_timeout(config.detection_timeout);

    if config.link.auto_connect {
        control.on_link_request(LinkRequest::Connect);
    }

    let mut tick = interval(config.frame_period());
    // Never run iterations back to back to catch up
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Control loop ready: {}Hz, {}ms detection watchdog, gate {:?} ({}ms), deadzone {:.2}..{:.2}",
        config.loop_hz,
        config.detection_timeout.as_millis(),
        config.gate.mode,
        config.gate.send_interval.as_millis(),
        config.deadzone.low(),
        config.deadzone.high()
    );
    info!("Subscribed to: {}, {}", TOPIC_DETECTIONS, TOPIC_LINK_CMD);
    info!("Publishing to: {}", TOPIC_STATUS);

    let mut last_packet = String::new();

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }

        // 1. Drain pending detections (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_detections.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DetectionFrame>(&payload) {
                Ok(frame) => control.on_detection(frame),
                Err(e) => warn!("Failed to parse detection: {}", e),
            }
        }

        // 2. Link requests
        while let Ok(Some(sample)) = sub_link.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<LinkRequest>(&payload) {
                Ok(request) => control.on_link_request(request),
                Err(e) => warn!("Failed to parse link request: {}", e),
            }
        }

        // 3. Assign, encode, offer to the gate
        let Some(report) = control.tick() else {
            continue;
        };
        if report.packet != last_packet {
            debug!(
                "L={:?} R={:?} packet={} ({:?})",
                report.left, report.right, report.packet, report.outcome
            );
            last_packet.clone_from(&report.packet);
        }

        // 4. Publish operator feedback
        match serde_json::to_string(&report) {
            Ok(json) => {
                if let Err(e) = pub_status.put(json).await {
                    warn!("Failed to publish status: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode status: {}", e),
        }
    }

    control.on_link_request(LinkRequest::Disconnect);
    // Let the runtime flush anything already handed to the port
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
