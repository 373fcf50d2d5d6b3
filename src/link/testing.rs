// In-memory link doubles for tests

use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use super::{Connector, LinkError, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockBehavior {
    /// Complete immediately
    Succeed,
    /// Complete once `release` is called
    Hold,
    /// Never complete
    Hang,
    /// Fail with a non-fatal IO error
    FailIo,
    /// Fail as if the peer went away
    FailDisconnected,
}

/// Records every write. Writes are logged when started, not when finished.
#[derive(Clone)]
pub(crate) struct MockLink {
    behavior: MockBehavior,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    permits: Arc<Semaphore>,
}

impl MockLink {
    pub(crate) fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            writes: Arc::new(Mutex::new(Vec::new())),
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Let one held write complete
    pub(crate) fn release(&self) {
        self.permits.add_permits(1);
    }
}

impl Transport for MockLink {
    fn write(
        &self,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), LinkError>> + Send + 'static {
        self.writes.lock().unwrap().push(bytes);
        let behavior = self.behavior;
        let permits = Arc::clone(&self.permits);

        async move {
            match behavior {
                MockBehavior::Succeed => Ok(()),
                MockBehavior::Hold => match permits.acquire_owned().await {
                    Ok(permit) => {
                        permit.forget();
                        Ok(())
                    }
                    Err(_) => Err(LinkError::Disconnected),
                },
                MockBehavior::Hang => std::future::pending().await,
                MockBehavior::FailIo => {
                    Err(LinkError::Io(std::io::ErrorKind::WouldBlock.into()))
                }
                MockBehavior::FailDisconnected => Err(LinkError::Disconnected),
            }
        }
    }
}

/// Hands out clones of one [`MockLink`], or fails every attempt
pub(crate) struct MockConnector {
    pub(crate) link: MockLink,
    pub(crate) fail: bool,
}

impl MockConnector {
    pub(crate) fn new(link: MockLink) -> Self {
        Self { link, fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self {
            link: MockLink::new(MockBehavior::Succeed),
            fail: true,
        }
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    fn connect(&self) -> impl Future<Output = Result<MockLink, LinkError>> + Send + 'static {
        let result = if self.fail {
            Err(LinkError::Io(std::io::ErrorKind::NotFound.into()))
        } else {
            Ok(self.link.clone())
        };
        async move { result }
    }

    fn target(&self) -> String {
        "mock".to_string()
    }
}

/// Give spawned tasks a chance to run to their next suspension point
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
