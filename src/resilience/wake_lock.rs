use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use async_io::block_on;
use tracing::{debug, warn};
use zbus::{Connection, proxy};

use crate::error::WakeLockError;

const APP_NAME: &str = "cadenza";
const REASON: &str = "Playing audio";

/// Keeps the display (and with it the audio session) from idling.
pub trait WakeLock: Send {
    fn acquire(&mut self);
    fn release(&mut self);
}

pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&mut self) {}
    fn release(&mut self) {}
}

#[proxy(
    interface = "org.freedesktop.ScreenSaver",
    default_service = "org.freedesktop.ScreenSaver",
    default_path = "/org/freedesktop/ScreenSaver"
)]
trait ScreenSaver {
    fn inhibit(&self, application_name: &str, reason_for_inhibit: &str) -> zbus::Result<u32>;

    fn un_inhibit(&self, cookie: u32) -> zbus::Result<()>;
}

enum Request {
    Acquire,
    Release,
}

/// `org.freedesktop.ScreenSaver` inhibition, driven from a helper thread so
/// bus round-trips never stall the UI.
pub struct ScreenSaverInhibitor {
    tx: Option<Sender<Request>>,
}

impl ScreenSaverInhibitor {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<Request>();
        let spawned = thread::Builder::new()
            .name("cadenza-wake-lock".into())
            .spawn(move || block_on(serve(rx)));
        match spawned {
            Ok(_) => Self { tx: Some(tx) },
            Err(e) => {
                warn!(error = %e, "failed to spawn wake lock thread");
                Self { tx: None }
            }
        }
    }

    fn send(&self, req: Request) {
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(req).is_ok());
        if !sent {
            debug!(error = %WakeLockError::Disconnected, "wake lock request dropped");
        }
    }
}

impl WakeLock for ScreenSaverInhibitor {
    fn acquire(&mut self) {
        self.send(Request::Acquire);
    }

    fn release(&mut self) {
        self.send(Request::Release);
    }
}

async fn connect() -> Result<ScreenSaverProxy<'static>, WakeLockError> {
    let connection = Connection::session().await?;
    Ok(ScreenSaverProxy::new(&connection).await?)
}

async fn serve(rx: Receiver<Request>) {
    let proxy = match connect().await {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(error = %e, "screen saver inhibition unavailable");
            None
        }
    };
    let mut cookie: Option<u32> = None;

    // Ends when the inhibitor is dropped.
    while let Ok(req) = rx.recv() {
        let Some(proxy) = proxy.as_ref() else {
            continue;
        };
        match req {
            Request::Acquire if cookie.is_none() => match proxy.inhibit(APP_NAME, REASON).await {
                Ok(c) => {
                    debug!(cookie = c, "screen saver inhibited");
                    cookie = Some(c);
                }
                Err(e) => warn!(error = %e, "screen saver inhibit failed"),
            },
            Request::Release => {
                if let Some(c) = cookie.take() {
                    if let Err(e) = proxy.un_inhibit(c).await {
                        warn!(error = %e, "screen saver uninhibit failed");
                    }
                }
            }
            Request::Acquire => {}
        }
    }

    if let (Some(proxy), Some(c)) = (proxy.as_ref(), cookie) {
        let _ = proxy.un_inhibit(c).await;
    }
}
