use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use pool_shared::protocol::{ClientMsg, ServerMsg, PROTOCOL_VERSION as CLIENT_PROTOCOL_VERSION};
use pool_shared::vec2::Vec2;
use pool_shared::BallKey;
use url::Url;

#[derive(Debug, Clone)]
pub enum NetEvent {
    Connected,
    Disconnected,
    Message(ServerMsg),
    ProtocolMismatch { server: u32, client: u32 },
    /// The server refused the upgrade (unknown room, wrong secret, room full).
    /// Not retried.
    Rejected { status: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Rejected,
}

type NativeCmdSender = tokio::sync::mpsc::UnboundedSender<ClientMsg>;

/// Room connection running on its own thread. Messages arrive through
/// `poll_events`; commands are fire-and-forget.
pub struct ServerConnection {
    pub state: ConnectionState,
    event_rx: Receiver<NetEvent>,
    cmd_tx: NativeCmdSender,
}

impl ServerConnection {
    pub fn new(url: Url) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<NetEvent>();
        let cmd_tx = spawn_native_network_thread(url, event_tx);
        Self {
            state: ConnectionState::Connecting,
            event_rx,
            cmd_tx,
        }
    }

    pub fn poll_events(&mut self) -> Vec<NetEvent> {
        let mut out = Vec::new();
        while let Ok(evt) = self.event_rx.try_recv() {
            match &evt {
                NetEvent::Connected => self.state = ConnectionState::Connected,
                NetEvent::Disconnected if self.state != ConnectionState::Rejected => {
                    self.state = ConnectionState::Disconnected
                }
                NetEvent::Rejected { .. } | NetEvent::ProtocolMismatch { .. } => {
                    self.state = ConnectionState::Rejected
                }
                _ => {}
            }
            out.push(evt);
        }
        out
    }

    pub fn send_cue_shot(&self, ball: BallKey, shot: Vec2) {
        self.send(ClientMsg::CueShot { ball, shot });
    }

    pub fn send_place_cue_ball(&self, position: Vec2) {
        self.send(ClientMsg::PlaceCueBall {
            x: position.x,
            y: position.y,
        });
    }

    pub fn request_sync(&self) {
        self.send(ClientMsg::RequestSync);
    }

    pub fn send(&self, msg: ClientMsg) {
        let _ = self.cmd_tx.send(msg);
    }
}

/// Refusals that will not change by retrying.
fn is_permanent_rejection(status: u16) -> bool {
    matches!(status, 400 | 403 | 404 | 409)
}

fn spawn_native_network_thread(url: Url, event_tx: Sender<NetEvent>) -> NativeCmdSender {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::{self, Message};

    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<ClientMsg>();

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_io()
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("failed to build network runtime: {}", e);
                let _ = event_tx.send(NetEvent::Disconnected);
                return;
            }
        };

        rt.block_on(async move {
            let mut reconnect_delay = Duration::from_millis(1000);
            let max_delay = Duration::from_millis(30_000);

            loop {
                let _ = event_tx.send(NetEvent::Disconnected);

                let connect = tokio_tungstenite::connect_async(url.as_str()).await;

                let (ws_stream, _) = match connect {
                    Ok(x) => x,
                    Err(tungstenite::Error::Http(response))
                        if is_permanent_rejection(response.status().as_u16()) =>
                    {
                        let status = response.status().as_u16();
                        tracing::warn!("server refused connection with status {}", status);
                        let _ = event_tx.send(NetEvent::Rejected { status });
                        return;
                    }
                    Err(e) => {
                        tracing::debug!("connect failed: {}", e);
                        tokio::time::sleep(reconnect_delay).await;
                        reconnect_delay = (reconnect_delay.mul_f32(1.5)).min(max_delay);
                        continue;
                    }
                };

                reconnect_delay = Duration::from_millis(1000);
                let _ = event_tx.send(NetEvent::Connected);

                let (mut write, mut read) = ws_stream.split();

                loop {
                    tokio::select! {
                        biased;

                        Some(cmd) = cmd_rx.recv() => {
                            if let Ok(text) = serde_json::to_string(&cmd) {
                                if write.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(txt))) => {
                                    match serde_json::from_str::<ServerMsg>(&txt) {
                                        Ok(server_msg) => {
                                            if let ServerMsg::Welcome(welcome) = &server_msg {
                                                if welcome.protocol_version != CLIENT_PROTOCOL_VERSION {
                                                    let _ = event_tx.send(NetEvent::ProtocolMismatch {
                                                        server: welcome.protocol_version,
                                                        client: CLIENT_PROTOCOL_VERSION,
                                                    });
                                                    let _ = write.close().await;
                                                    return;
                                                }
                                            }
                                            let _ = event_tx.send(NetEvent::Message(server_msg));
                                        }
                                        Err(e) => tracing::warn!("unparseable server message: {}", e),
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(_)) => {
                                    break;
                                }
                                None => {
                                    break;
                                }
                            }
                        }
                    }
                }

                let _ = event_tx.send(NetEvent::Disconnected);
                tokio::time::sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay.mul_f32(1.5)).min(max_delay);
            }
        });
    });

    cmd_tx
}
