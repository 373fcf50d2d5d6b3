// Keyboard hand simulator: stands in for the hand detector
//
// W/S move the left hand up/down, I/K the right hand, 1/2 toggle each hand,
// C/V connect/disconnect the link, Q quits.
//
// Usage: cargo run --example hand_sim
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use handbot_teleop::config::{TOPIC_DETECTIONS, TOPIC_LINK_CMD};
use handbot_teleop::messages::{DetectionFrame, HandPosition, LinkRequest};
use std::time::Duration;
use tracing::info;

const STEP: f64 = 0.05; // normalized units per key press
const FRAME_MS: u64 = 33; // ~30 fps video

// Visual x of each simulated hand. The detector reports non-mirrored x.
const LEFT_VISUAL_X: f64 = 0.25;
const RIGHT_VISUAL_X: f64 = 0.75;

struct SimHand {
    visible: bool,
    visual_x: f64,
    y: f64,
}

impl SimHand {
    fn new(visual_x: f64) -> Self {
        Self {
            visible: true,
            visual_x,
            y: 0.5,
        }
    }

    fn nudge(&mut self, dy: f64) {
        self.y = (self.y + dy).clamp(0.0, 1.0);
    }

    fn position(&self) -> Option<HandPosition> {
        self.visible.then(|| HandPosition {
            x: 1.0 - self.visual_x,
            y: self.y,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_detections = session.declare_publisher(TOPIC_DETECTIONS).await?;
    let pub_link = session.declare_publisher(TOPIC_LINK_CMD).await?;

    info!("Controls: W/S=left hand, I/K=right hand, 1/2=toggle hands, C/V=connect/disconnect, Q=quit");

    enable_raw_mode()?;
    let result = run_sim(&pub_detections, &pub_link).await;
    disable_raw_mode()?;

    result
}

async fn run_sim(
    pub_detections: &zenoh::pubsub::Publisher<'_>,
    pub_link: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut left = SimHand::new(LEFT_VISUAL_X);
    let mut right = SimHand::new(RIGHT_VISUAL_X);
    // Frame counter doubles as the video timestamp; it never repeats
    let mut frame_index: u64 = 0;

    loop {
        if event::poll(Duration::from_millis(FRAME_MS))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // y grows downward: "up" is a smaller y
                    KeyCode::Char('w') if pressed => left.nudge(-STEP),
                    KeyCode::Char('s') if pressed => left.nudge(STEP),
                    KeyCode::Char('i') if pressed => right.nudge(-STEP),
                    KeyCode::Char('k') if pressed => right.nudge(STEP),

                    KeyCode::Char('1') if pressed => left.visible = !left.visible,
                    KeyCode::Char('2') if pressed => right.visible = !right.visible,

                    KeyCode::Char('c') if pressed => {
                        publish_request(pub_link, LinkRequest::Connect).await?
                    }
                    KeyCode::Char('v') if pressed => {
                        publish_request(pub_link, LinkRequest::Disconnect).await?
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        frame_index += 1;
        let frame = DetectionFrame {
            timestamp_ms: frame_index * FRAME_MS,
            hands: [left.position(), right.position()]
                .into_iter()
                .flatten()
                .collect(),
        };
        pub_detections.put(serde_json::to_string(&frame)?).await?;
    }

    Ok(())
}

async fn publish_request(
    publisher: &zenoh::pubsub::Publisher<'_>,
    request: LinkRequest,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Link request: {:?}", request);
    publisher.put(serde_json::to_string(&request)?).await?;
    Ok(())
}
