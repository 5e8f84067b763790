//! Companion app link over a Unix domain socket
//!
//! The Bluetooth serial link is bridged onto this socket. One app session is
//! served at a time: the device greets with an `init` status frame, then
//! acknowledges every inbound frame and pushes an `init` frame whenever the
//! device status changes.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::action::{ActionToken, Source};
use crate::dispatch::{Dispatcher, StatusReceiver, Submission};

use super::protocol::{FrameDecoder, InboundToken, ProtocolError, StatusFrame};

const READ_CHUNK: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    #[error("failed to bind companion socket {path:?}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("companion link i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("dispatcher has stopped")]
    DispatcherClosed,
}

/// Accept loop for companion sessions
pub struct CompanionServer {
    socket_path: PathBuf,
    listener: UnixListener,
    dispatcher: Dispatcher,
    status: StatusReceiver,
}

impl CompanionServer {
    /// Bind the socket, replacing a stale one
    pub fn bind(
        socket_path: &Path,
        dispatcher: Dispatcher,
        status: StatusReceiver,
    ) -> Result<Self, CompanionError> {
        let bind_err = |source| CompanionError::Bind {
            path: socket_path.to_owned(),
            source,
        };

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(bind_err)?;
        }
        if socket_path.exists() {
            std::fs::remove_file(socket_path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(socket_path).map_err(bind_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .map_err(bind_err)?;
        }

        info!(?socket_path, "companion socket listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            dispatcher,
            status,
        })
    }

    /// Serve sessions one after another until the dispatcher goes away
    pub async fn run(&self) -> Result<(), CompanionError> {
        loop {
            let stream = match self.listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    error!(?e, "accept error");
                    continue;
                }
            };

            info!("companion connected");
            match serve_session(stream, &self.dispatcher, self.status.clone()).await {
                Ok(()) => info!("companion disconnected"),
                Err(CompanionError::DispatcherClosed) => return Err(CompanionError::DispatcherClosed),
                Err(e) => warn!(error = %e, "companion session ended"),
            }
        }
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }
        info!("companion server stopped");
    }
}

/// Run one session until EOF, a transport error or a malformed frame
pub(crate) async fn serve_session<S>(
    stream: S,
    dispatcher: &Dispatcher,
    mut status: StatusReceiver,
) -> Result<(), CompanionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut decoder = FrameDecoder::default();
    let mut chunk = [0u8; READ_CHUNK];

    let greeting = StatusFrame::init(&status.borrow_and_update());
    send_frame(&mut writer, &greeting).await?;

    loop {
        while let Some(token) = decoder.next_frame()? {
            let ack = accept_token(&token, dispatcher, &status)?;
            send_frame(&mut writer, &ack).await?;
        }

        tokio::select! {
            read = reader.read(&mut chunk) => {
                let n = read?;
                if n == 0 {
                    if decoder.pending() > 0 {
                        debug!(pending = decoder.pending(), "discarding partial frame at eof");
                    }
                    return Ok(());
                }
                decoder.push(&chunk[..n]);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Err(CompanionError::DispatcherClosed);
                }
                let push = StatusFrame::init(&status.borrow_and_update());
                send_frame(&mut writer, &push).await?;
            }
        }
    }
}

fn accept_token(
    token: &InboundToken,
    dispatcher: &Dispatcher,
    status: &StatusReceiver,
) -> Result<StatusFrame, CompanionError> {
    debug!(ticket = token.ticket, kind = %token.kind, "companion frame");

    match token.action() {
        Ok(action) => {
            if dispatcher.submit(ActionToken::new(action, Source::Companion)) == Submission::Closed {
                return Err(CompanionError::DispatcherClosed);
            }
        }
        Err(e) => warn!(ticket = token.ticket, error = %e, "ignoring companion action"),
    }

    // the app correlates by ticket, so every frame gets an answer
    Ok(StatusFrame::ack(token, &status.borrow()))
}

async fn send_frame<W>(writer: &mut W, frame: &StatusFrame) -> Result<(), CompanionError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()?).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::broadcast;
    use tokio_test::io::Builder;

    use super::*;
    use crate::action::Action;
    use crate::dispatch::fakes::RecordingSink;
    use crate::dispatch::{status_channel, DeviceStatus, StatusSender};

    fn setup() -> (Dispatcher, RecordingSink, StatusSender, StatusReceiver) {
        let recorder = RecordingSink::default();
        let (bus, _) = broadcast::channel(16);
        let (dispatcher, _worker) = Dispatcher::spawn(recorder.clone(), 8, bus).unwrap();
        let (tx, rx) = status_channel(DeviceStatus::new(Duration::from_secs(30)));
        (dispatcher, recorder, tx, rx)
    }

    async fn wait_for(recorder: &RecordingSink, count: usize) -> Vec<Action> {
        for _ in 0..200 {
            let seen = recorder.actions();
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("dispatcher did not receive {count} tokens");
    }

    const INIT: &[u8] = br#"{"ticket":-1,"type":"init","args":["default","false","default"]}"#;

    #[tokio::test]
    async fn test_session_acks_each_frame() {
        let (dispatcher, recorder, _status_tx, status) = setup();

        let stream = Builder::new()
            .write(INIT)
            .read(br#"{"ticket": 3, "type": "refresh"}{"ticket": 4, "type": "mus"#)
            .write(br#"{"ticket":3,"type":"refresh","args":["default","false","default"]}"#)
            .read(br#"ic_next"}"#)
            .write(br#"{"ticket":4,"type":"music_next","args":["default","false","default"]}"#)
            .build();

        serve_session(stream, &dispatcher, status).await.unwrap();

        let seen = wait_for(&recorder, 2).await;
        assert_eq!(seen, vec![Action::Refresh, Action::MusicNext { message: None }]);
    }

    #[tokio::test]
    async fn test_unknown_action_is_acked_not_dispatched() {
        let (dispatcher, recorder, _status_tx, status) = setup();

        let stream = Builder::new()
            .write(INIT)
            .read(br#"{"ticket": 9, "type": "teleport"}"#)
            .write(br#"{"ticket":9,"type":"teleport","args":["default","false","default"]}"#)
            .build();

        serve_session(stream, &dispatcher, status).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_frame_ends_session() {
        let (dispatcher, _recorder, _status_tx, status) = setup();

        let stream = Builder::new().write(INIT).read(b"garbage").build();

        let result = serve_session(stream, &dispatcher, status).await;
        assert!(matches!(result, Err(CompanionError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_status_change_is_pushed() {
        let (dispatcher, _recorder, status_tx, status) = setup();
        let (client, server) = tokio::io::duplex(4096);
        let (mut client_rx, client_tx) = tokio::io::split(client);

        let session = tokio::spawn(async move {
            serve_session(server, &dispatcher, status).await
        });

        let mut greeting = vec![0u8; INIT.len()];
        client_rx.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, INIT);

        status_tx.send_modify(|s| {
            s.title = "Naima".into();
            s.playing = true;
            s.volume = Some(60);
        });

        let expected = br#"{"ticket":-1,"type":"init","args":["Naima","true","60"]}"#;
        let mut pushed = vec![0u8; expected.len()];
        client_rx.read_exact(&mut pushed).await.unwrap();
        assert_eq!(pushed, expected);

        drop(client_tx);
        drop(client_rx);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_server_replaces_stale_socket_and_accepts_again() {
        use std::os::unix::fs::PermissionsExt;
        use tokio::net::UnixStream;

        let (dispatcher, _recorder, _status_tx, status) = setup();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run").join("companion.sock");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"left over").unwrap();

        let server = CompanionServer::bind(&path, dispatcher, status).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let serving = tokio::spawn(async move { server.run().await });

        for _ in 0..2 {
            let mut client = UnixStream::connect(&path).await.unwrap();
            let mut greeting = vec![0u8; INIT.len()];
            tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut greeting))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(greeting, INIT);
        }

        serving.abort();
    }
}
