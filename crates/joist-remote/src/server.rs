use std::sync::Arc;

use joist_build_model::BuildModel;
use joist_debug::{BuildDebugTracker, DebugListener, ResumeMode, SuspendReason};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::config::DebugServerConfig;
use crate::protocol::{self, Command};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tracker listener that forwards lifecycle notifications to the connected
/// debugger client as protocol lines.
///
/// Sends never block: the channel is unbounded, and events raised before a
/// client attaches are buffered until the server drains them.
pub struct RemoteListener {
    events: mpsc::UnboundedSender<String>,
}

/// Create the listener half handed to the tracker plus the receiving half
/// handed to [`DebugServer::serve`].
pub fn event_channel() -> (RemoteListener, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RemoteListener { events: tx }, rx)
}

impl DebugListener for RemoteListener {
    fn build_started(&self) {
        let _ = self.events.send(protocol::BUILD_STARTED.to_string());
    }

    fn suspended(&self, reason: SuspendReason) {
        let _ = self.events.send(protocol::suspended_message(&reason));
    }

    fn resumed(&self, mode: ResumeMode) {
        let _ = self.events.send(protocol::resumed_message(mode));
    }

    fn build_finished(&self) {
        let _ = self.events.send(protocol::TERMINATED.to_string());
    }
}

/// Serves one debugger client over TCP, translating its commands into
/// tracker operations and pushing tracker events back.
pub struct DebugServer<M> {
    tracker: Arc<BuildDebugTracker<M>>,
    config: DebugServerConfig,
}

impl<M: BuildModel + 'static> DebugServer<M> {
    pub fn new(tracker: Arc<BuildDebugTracker<M>>, config: DebugServerConfig) -> Self {
        Self { tracker, config }
    }

    /// Accept a single debugger client and serve it until it disconnects or
    /// the connection fails.
    pub async fn serve(
        self,
        listener: TcpListener,
        events: mpsc::UnboundedReceiver<String>,
    ) -> Result<(), ServerError> {
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "debugger client connected");
        self.serve_stream(stream, events).await
    }

    async fn serve_stream(
        &self,
        stream: TcpStream,
        mut events: mpsc::UnboundedReceiver<String>,
    ) -> Result<(), ServerError> {
        let (read_half, mut write_half) = stream.into_split();

        // Tracker events and command replies share one outbound queue so
        // the client sees a single ordered message stream.
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        let forward = {
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    if out_tx.send(event).is_err() {
                        break;
                    }
                }
            })
        };

        let writer = tokio::spawn(async move {
            while let Some(line) = out_rx.recv().await {
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if write_half.write_all(b"\n").await.is_err() {
                    break;
                }
                if write_half.flush().await.is_err() {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(read_half).lines();
        let result = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match Command::parse(line) {
                        Ok(command) => self.dispatch(command, &out_tx),
                        Err(err) => {
                            tracing::warn!(%err, "rejected debugger command");
                            let _ = out_tx.send(format!("{} {err}", protocol::ERROR));
                        }
                    }
                }
                Ok(None) => break Ok(()),
                Err(err) => break Err(ServerError::Io(err)),
            }
        };

        tracing::info!("debugger client disconnected");
        forward.abort();
        drop(out_tx);
        let _ = writer.await;
        result
    }

    fn dispatch(&self, command: Command, out: &mpsc::UnboundedSender<String>) {
        match command {
            Command::Resume => self.tracker.resume(),
            Command::Suspend => self.tracker.suspend(),
            Command::StepOver => self.tracker.step_over(),
            Command::StepInto => self.tracker.step_into(),
            Command::Stack => {
                let _ = out.send(self.tracker.marshal_stack());
            }
            Command::Properties => {
                let message = self
                    .tracker
                    .marshal_properties(self.config.escape_line_breaks);
                // Nothing changed since the last delta: nothing to send.
                if !message.is_empty() {
                    let _ = out.send(message);
                }
            }
            Command::AddBreakpoint { file, line } => self.tracker.add_breakpoint(&file, line),
            Command::RemoveBreakpoint { file, line } => {
                self.tracker.remove_breakpoint(&file, line);
            }
            Command::TargetBreakpoints { enabled } => {
                self.tracker.set_target_breakpoints_enabled(enabled);
            }
        }
    }
}
