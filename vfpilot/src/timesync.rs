//! # Guest clock synchronization
//!
//! A guest that sleeps with its host comes back with a stale clock. After
//! every host wake-up, [`TimeSyncer`] asks the guest agent to set its clock
//! to the host time over a vsock channel:
//!
//! ```text
//! -> {"execute": "guest-set-time", "arguments": {"time": 1700000000000000000}}
//! <- {"return": {}}
//! ```
//!
//! The channel is opened on first use and reused afterwards. The watcher
//! started with [`TimeSyncer::spawn`] logs failed attempts and keeps
//! waiting for the next wake-up; it ends when the event channel closes or
//! [`TimeSyncHandle::stop`] is called.
use std::fmt;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::backend::VsockConnect;

/// Reply timeout applied unless configured otherwise
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

const SYNC_REPLY: &str = "{\"return\": {}}\n";

/// Longest reply line read from the guest agent
const MAX_REPLY_LEN: u64 = 4096;

#[derive(thiserror::Error, Debug)]
pub enum TimeSyncError {
    #[error("time sync is not configured: no vsock device or port is 0")]
    InvalidState,
    #[error("Could not connect to guest vsock port {port}, reason: {source}")]
    Connect {
        port: u32,
        #[source]
        source: io::Error,
    },
    #[error("time sync transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("unexpected reply from guest agent: {0:?}")]
    Protocol(String),
    #[error("guest agent did not reply within {0:?}")]
    Timeout(Duration),
    #[error("time sync task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Host power notifications driving the watcher
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepEvent {
    Asleep,
    Awake,
}

fn guest_set_time_command(time_ns: i64) -> String {
    format!(
        "{{\"execute\": \"guest-set-time\", \"arguments\": {{\"time\": {}}}}}\n",
        time_ns
    )
}

fn host_time_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

pub struct TimeSyncer<C: VsockConnect> {
    connector: Option<C>,
    port: u32,
    conn: Option<BufReader<C::Stream>>,
    reply_timeout: Option<Duration>,
}

impl<C: VsockConnect> fmt::Debug for TimeSyncer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSyncer")
            .field("port", &self.port)
            .field("configured", &self.connector.is_some())
            .field("connected", &self.conn.is_some())
            .field("reply_timeout", &self.reply_timeout)
            .finish()
    }
}

impl<C: VsockConnect> TimeSyncer<C> {
    /// `connector` is `None` when the machine has no socket device. Such a
    /// syncer, or one on port 0, fails every operation with
    /// [`TimeSyncError::InvalidState`].
    pub fn new(connector: Option<C>, port: u32) -> Self {
        TimeSyncer {
            connector,
            port,
            conn: None,
            reply_timeout: Some(DEFAULT_REPLY_TIMEOUT),
        }
    }

    /// `None` waits for the guest reply forever
    pub fn with_reply_timeout(mut self, reply_timeout: Option<Duration>) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn connection(&mut self) -> Result<&mut BufReader<C::Stream>, TimeSyncError> {
        let port = self.port;
        let connector = match &self.connector {
            Some(connector) if port != 0 => connector,
            _ => return Err(TimeSyncError::InvalidState),
        };
        if self.conn.is_none() {
            let stream = connector
                .connect(port)
                .await
                .map_err(|source| TimeSyncError::Connect { port, source })?;
            debug!("Connected to guest agent on vsock port {}", port);
            self.conn = Some(BufReader::new(stream));
        }
        self.conn.as_mut().ok_or(TimeSyncError::InvalidState)
    }

    /// Sets the guest clock to the current host time.
    pub async fn sync_guest_time(&mut self) -> Result<(), TimeSyncError> {
        self.set_guest_time(host_time_ns()).await
    }

    /// Sets the guest clock to `time_ns` nanoseconds since the Unix epoch.
    ///
    /// A transport failure or a timeout drops the channel, the next call
    /// reconnects. An unexpected reply keeps it.
    #[instrument(skip(self), fields(port = self.port))]
    pub async fn set_guest_time(&mut self, time_ns: i64) -> Result<(), TimeSyncError> {
        let reply_timeout = self.reply_timeout;
        let result = self.round_trip(&guest_set_time_command(time_ns), reply_timeout).await;
        match &result {
            Err(TimeSyncError::Transport(_)) | Err(TimeSyncError::Timeout(_)) => {
                self.close();
            }
            _ => {}
        }
        let reply = result?;
        if reply != SYNC_REPLY {
            return Err(TimeSyncError::Protocol(reply.trim_end().to_string()));
        }
        debug!("Guest time set to {}", time_ns);
        Ok(())
    }

    async fn round_trip(
        &mut self,
        command: &str,
        reply_timeout: Option<Duration>,
    ) -> Result<String, TimeSyncError> {
        let conn = self.connection().await?;
        trace!("Sending {}", command.trim_end());
        conn.get_mut().write_all(command.as_bytes()).await?;
        conn.get_mut().flush().await?;

        let mut reply = String::new();
        let mut line = conn.take(MAX_REPLY_LEN);
        let read = match reply_timeout {
            Some(limit) => tokio::time::timeout(limit, line.read_line(&mut reply))
                .await
                .map_err(|_| TimeSyncError::Timeout(limit))??,
            None => line.read_line(&mut reply).await?,
        };
        if read == 0 {
            return Err(TimeSyncError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "guest agent closed the channel",
            )));
        }
        // the rest of the line is still queued, the channel is out of step
        if read as u64 == MAX_REPLY_LEN && !reply.ends_with('\n') {
            return Err(TimeSyncError::Transport(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("guest agent reply is longer than {MAX_REPLY_LEN} bytes"),
            )));
        }
        Ok(reply)
    }

    /// Closes the channel. Calling it on a closed or never opened channel
    /// does nothing.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!("Closed guest agent channel on vsock port {}", self.port);
        }
    }

    /// Syncs the guest clock on every [`SleepEvent::Awake`] until `events`
    /// closes or `shutdown` fires, then hands the syncer back.
    pub async fn watch_wakeups(
        mut self,
        mut events: mpsc::UnboundedReceiver<SleepEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Self {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Time sync watcher stopped");
                    break;
                }
                event = events.recv() => match event {
                    Some(SleepEvent::Awake) => match self.sync_guest_time().await {
                        Ok(()) => info!("Synchronized guest time after host wake-up"),
                        Err(e) => warn!("Could not synchronize guest time: {}", e),
                    },
                    Some(SleepEvent::Asleep) => trace!("Host going to sleep"),
                    None => {
                        debug!("Sleep notifications closed, time sync watcher exiting");
                        break;
                    }
                },
            }
        }
        self
    }
}

impl<C: VsockConnect> TimeSyncer<C> {
    /// Runs [`TimeSyncer::watch_wakeups`] on the current tokio runtime.
    ///
    /// Dropping the returned handle stops the watcher as well.
    pub fn spawn(self, events: mpsc::UnboundedReceiver<SleepEvent>) -> TimeSyncHandle<C> {
        let (stop, shutdown) = oneshot::channel();
        let task = tokio::spawn(self.watch_wakeups(events, shutdown));
        TimeSyncHandle { stop, task }
    }
}

/// Running watcher started by [`TimeSyncer::spawn`]
pub struct TimeSyncHandle<C: VsockConnect> {
    stop: oneshot::Sender<()>,
    task: JoinHandle<TimeSyncer<C>>,
}

impl<C: VsockConnect> fmt::Debug for TimeSyncHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSyncHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl<C: VsockConnect> TimeSyncHandle<C> {
    /// Stops the watcher and returns the syncer so its channel can be closed.
    pub async fn stop(self) -> Result<TimeSyncer<C>, TimeSyncError> {
        // The watcher may already be gone because its event channel closed.
        let _ = self.stop.send(());
        Ok(self.task.await?)
    }
}
