use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionId};
use crate::error::{DEFAULT_MAX_MESSAGE_CHARS, EngineError};
use crate::notification::{Notification, Outbox, SignalKind};
use crate::state::{EngineStats, MatchState};

/// Outbound queue for one connection; the transport drains it
pub type Mailbox = mpsc::Sender<Notification>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Longest accepted chat message, in Unicode scalar values
    pub max_message_chars: usize,
    /// Capacity of the engine's command inbox
    pub command_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            command_buffer: 256,
        }
    }
}

/// Commands that can be sent to the engine actor
#[derive(Debug)]
pub enum EngineCommand {
    Connect {
        id: ConnectionId,
        mailbox: Mailbox,
        respond_to: oneshot::Sender<Result<(), EngineError>>,
    },
    Join {
        id: ConnectionId,
        respond_to: oneshot::Sender<bool>,
    },
    Skip {
        id: ConnectionId,
        respond_to: oneshot::Sender<()>,
    },
    Disconnect {
        id: ConnectionId,
        respond_to: oneshot::Sender<()>,
    },
    Message {
        id: ConnectionId,
        text: String,
        respond_to: oneshot::Sender<()>,
    },
    Typing {
        id: ConnectionId,
        typing: bool,
        respond_to: oneshot::Sender<()>,
    },
    Signal {
        id: ConnectionId,
        kind: SignalKind,
        payload: serde_json::Value,
        respond_to: oneshot::Sender<()>,
    },
    GetConnection {
        id: ConnectionId,
        respond_to: oneshot::Sender<Option<Connection>>,
    },
    GetStats {
        respond_to: oneshot::Sender<EngineStats>,
    },
    CheckInvariants {
        respond_to: oneshot::Sender<Result<(), String>>,
    },
}

/// Handle to communicate with the engine actor
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| EngineError::EngineGone)?;
        rx.await.map_err(|_| EngineError::NoResponse)
    }

    /// Register a new connection and the mailbox its notifications go to
    pub async fn connect(&self, id: ConnectionId, mailbox: Mailbox) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::Connect {
            id,
            mailbox,
            respond_to,
        })
        .await?
    }

    /// Enter matchmaking. Returns whether a pairing occurred.
    pub async fn join(&self, id: ConnectionId) -> Result<bool, EngineError> {
        self.request(|respond_to| EngineCommand::Join { id, respond_to })
            .await
    }

    pub async fn skip(&self, id: ConnectionId) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::Skip { id, respond_to })
            .await
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::Disconnect { id, respond_to })
            .await
    }

    pub async fn send_message(&self, id: ConnectionId, text: String) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::Message {
            id,
            text,
            respond_to,
        })
        .await
    }

    pub async fn typing(&self, id: ConnectionId, typing: bool) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::Typing {
            id,
            typing,
            respond_to,
        })
        .await
    }

    pub async fn signal(
        &self,
        id: ConnectionId,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::Signal {
            id,
            kind,
            payload,
            respond_to,
        })
        .await
    }

    pub async fn connection(&self, id: ConnectionId) -> Result<Option<Connection>, EngineError> {
        self.request(|respond_to| EngineCommand::GetConnection { id, respond_to })
            .await
    }

    pub async fn stats(&self) -> Result<EngineStats, EngineError> {
        self.request(|respond_to| EngineCommand::GetStats { respond_to })
            .await
    }

    pub async fn check_invariants(&self) -> Result<Result<(), String>, EngineError> {
        self.request(|respond_to| EngineCommand::CheckInvariants { respond_to })
            .await
    }
}

/// The actor that owns all matchmaking state.
///
/// Commands are processed one at a time. Each command runs a single
/// `MatchState` transaction, then the resulting notifications are handed
/// to the recipients' mailboxes with `try_send`, so a slow or vanished
/// client never stalls the engine.
pub struct PairingEngine {
    state: MatchState,
    mailboxes: HashMap<ConnectionId, Mailbox>,
    receiver: mpsc::Receiver<EngineCommand>,
    notifications_dropped: u64,
}

impl PairingEngine {
    /// Spawn the engine on the current tokio runtime and return its handle
    pub fn spawn(config: EngineConfig) -> EngineHandle {
        let (sender, receiver) = mpsc::channel(config.command_buffer.max(1));
        let engine = PairingEngine {
            state: MatchState::new(config.max_message_chars),
            mailboxes: HashMap::new(),
            receiver,
            notifications_dropped: 0,
        };

        tokio::spawn(async move {
            engine.run().await;
        });

        EngineHandle { sender }
    }

    async fn run(mut self) {
        debug!("Pairing engine started");
        while let Some(cmd) = self.receiver.recv().await {
            self.handle(cmd);
        }
        debug!("Pairing engine stopped");
    }

    fn handle(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Connect {
                id,
                mailbox,
                respond_to,
            } => {
                let result = if self.state.connect(id) {
                    self.mailboxes.insert(id, mailbox);
                    Ok(())
                } else {
                    Err(EngineError::DuplicateConnection(id))
                };
                let _ = respond_to.send(result);
            }

            EngineCommand::Join { id, respond_to } => {
                let (paired, outbox) = self.state.request_pair(id);
                self.deliver(outbox);
                let _ = respond_to.send(paired);
            }

            EngineCommand::Skip { id, respond_to } => {
                let outbox = self.state.skip(id);
                self.deliver(outbox);
                let _ = respond_to.send(());
            }

            EngineCommand::Disconnect { id, respond_to } => {
                let outbox = self.state.disconnect(id);
                self.mailboxes.remove(&id);
                self.deliver(outbox);
                let _ = respond_to.send(());
            }

            EngineCommand::Message {
                id,
                text,
                respond_to,
            } => {
                let outbox = self.state.forward_message(id, &text);
                self.deliver(outbox);
                let _ = respond_to.send(());
            }

            EngineCommand::Typing {
                id,
                typing,
                respond_to,
            } => {
                let outbox = self.state.typing(id, typing);
                self.deliver(outbox);
                let _ = respond_to.send(());
            }

            EngineCommand::Signal {
                id,
                kind,
                payload,
                respond_to,
            } => {
                let outbox = self.state.forward_signal(id, kind, payload);
                self.deliver(outbox);
                let _ = respond_to.send(());
            }

            EngineCommand::GetConnection { id, respond_to } => {
                let _ = respond_to.send(self.state.connection(&id).cloned());
            }

            EngineCommand::GetStats { respond_to } => {
                let mut stats = self.state.stats();
                stats.notifications_dropped = self.notifications_dropped;
                let _ = respond_to.send(stats);
            }

            EngineCommand::CheckInvariants { respond_to } => {
                let _ = respond_to.send(self.state.check_invariants());
            }
        }
    }

    /// Hand committed notifications to their recipients' mailboxes
    fn deliver(&mut self, outbox: Outbox) {
        for (to, notification) in outbox {
            let Some(mailbox) = self.mailboxes.get(&to) else {
                self.notifications_dropped += 1;
                debug!(conn_id = %to, "No mailbox for notification, dropping");
                continue;
            };
            if let Err(e) = mailbox.try_send(notification) {
                self.notifications_dropped += 1;
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!(conn_id = %to, "Mailbox full, dropping notification")
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        debug!(conn_id = %to, "Mailbox closed, dropping notification")
                    }
                }
            }
        }
    }
}
