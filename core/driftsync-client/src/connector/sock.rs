//! The socket connector.
//!
//! One TCP connection carries everything: requests and their responses,
//! payload chunks, and server-initiated push notifications. A reader
//! task owns the read half and routes incoming frames — pushes to the
//! `wait()` channel, everything else to the in-flight request. Requests
//! hold a single lock for their whole exchange; the apply role is the
//! only requester, so one in-flight request is the steady state.
//!
//! With a shared key configured, file payloads travel as
//! `ciphertext || signature` produced by the crypto engine's streams;
//! a download whose signature fails verification fails the transfer.

use crate::connector::wire::{self, Frame, RawFrame, CHUNK_SIZE};
use crate::connector::{Connector, ConnectorError, ConnectorResult};
use async_trait::async_trait;
use driftsync_crypto::{Crypt, CryptStream, BLOCK_SIZE, HASH_SIZE};
use driftsync_types::{FileData, Metadata};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Client side of the DriftSync socket protocol.
pub struct SockConnector {
    requests: Mutex<RequestChannel>,
    pushes: Mutex<mpsc::Receiver<(String, FileData)>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    crypt: Option<Crypt>,
}

/// Write half plus the channels the reader task routes into. Guarded by
/// one lock so a request and its response cannot interleave with
/// another request.
struct RequestChannel {
    write: Option<OwnedWriteHalf>,
    resp: mpsc::Receiver<Frame>,
    data: mpsc::Receiver<Vec<u8>>,
}

impl RequestChannel {
    async fn send(&mut self, frame: &Frame) -> ConnectorResult<()> {
        let write = self.write.as_mut().ok_or(ConnectorError::Closed)?;
        wire::write_control(write, frame).await
    }

    async fn send_data(&mut self, chunk: &[u8]) -> ConnectorResult<()> {
        let write = self.write.as_mut().ok_or(ConnectorError::Closed)?;
        wire::write_data(write, chunk).await
    }

    async fn recv(&mut self) -> ConnectorResult<Frame> {
        self.resp.recv().await.ok_or(ConnectorError::Closed)
    }

    async fn recv_data(&mut self) -> ConnectorResult<Vec<u8>> {
        self.data.recv().await.ok_or(ConnectorError::Closed)
    }

    async fn request(&mut self, frame: &Frame) -> ConnectorResult<Frame> {
        self.send(frame).await?;
        self.recv().await
    }
}

impl SockConnector {
    /// Connects and authenticates. With `key` present, file payloads are
    /// encrypted and signed end to end.
    pub async fn connect(
        host: &str,
        port: u16,
        user: &str,
        pass: &str,
        key: Option<&str>,
    ) -> ConnectorResult<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        let (mut read, write) = stream.into_split();

        let (resp_tx, resp_rx) = mpsc::channel(8);
        let (data_tx, data_rx) = mpsc::channel(64);
        let (push_tx, push_rx) = mpsc::channel(256);

        let reader = tokio::spawn(async move {
            loop {
                match wire::read_frame(&mut read).await {
                    Ok(RawFrame::Control(Frame::Push { path, file_data })) => {
                        if push_tx.send((path, file_data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(RawFrame::Control(frame)) => {
                        if resp_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(RawFrame::Data(chunk)) => {
                        if data_tx.send(chunk).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("connection reader exiting: {e}");
                        break;
                    }
                }
            }
        });

        let conn = Self {
            requests: Mutex::new(RequestChannel {
                write: Some(write),
                resp: resp_rx,
                data: data_rx,
            }),
            pushes: Mutex::new(push_rx),
            reader: StdMutex::new(Some(reader)),
            crypt: key.map(Crypt::new),
        };
        conn.handshake(user, pass).await?;
        Ok(conn)
    }

    async fn handshake(&self, user: &str, pass: &str) -> ConnectorResult<()> {
        let mut ch = self.requests.lock().await;
        let hello = Frame::Hello {
            user: user.to_string(),
            pass: pass.to_string(),
        };
        match ch.request(&hello).await? {
            Frame::HelloOk => Ok(()),
            Frame::Error { message } => Err(ConnectorError::Auth(message)),
            other => Err(unexpected(&other)),
        }
    }
}

#[async_trait]
impl Connector for SockConnector {
    async fn get_metadata(&self) -> ConnectorResult<Metadata> {
        let mut ch = self.requests.lock().await;
        match ch.request(&Frame::GetMetadata).await? {
            Frame::Metadata { metadata } => Ok(metadata),
            Frame::Error { message } => Err(ConnectorError::Server(message)),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_file(
        &self,
        path: &str,
        modified: i64,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ConnectorResult<()> {
        let mut ch = self.requests.lock().await;
        let request = Frame::GetFile {
            path: path.to_string(),
            modified,
        };
        let len = match ch.request(&request).await? {
            Frame::FileStart { len } => len,
            Frame::Error { message } => return Err(ConnectorError::Server(message)),
            other => return Err(unexpected(&other)),
        };

        let mut received = 0u64;
        let mut decrypt = self.crypt.as_ref().map(Crypt::dcstream);
        let mut scratch = vec![0u8; CHUNK_SIZE];
        while received < len {
            let chunk = ch.recv_data().await?;
            received += chunk.len() as u64;
            if received > len {
                return Err(ConnectorError::Protocol("payload overrun".to_string()));
            }
            match decrypt.as_mut() {
                Some(stream) => {
                    stream.write(&chunk)?;
                    drain_to_sink(stream, &mut scratch, sink).await?;
                }
                None => sink.write_all(&chunk).await?,
            }
        }
        if let Some(stream) = decrypt.as_mut() {
            stream.finish()?;
            drain_to_sink(stream, &mut scratch, sink).await?;
        }
        sink.flush().await?;
        Ok(())
    }

    async fn push_file(
        &self,
        path: &str,
        modified: i64,
        source: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
    ) -> ConnectorResult<()> {
        let wire_len = match self.crypt {
            Some(_) => encrypted_len(size),
            None => size,
        };
        let mut ch = self.requests.lock().await;
        ch.send(&Frame::PushFile {
            path: path.to_string(),
            modified,
            len: wire_len,
        })
        .await?;

        let mut encrypt = self.crypt.as_ref().map(Crypt::ecstream);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut scratch = vec![0u8; CHUNK_SIZE + 2 * BLOCK_SIZE + HASH_SIZE];
        let mut consumed = 0u64;
        while consumed < size {
            let want = buf.len().min((size - consumed) as usize);
            let n = source.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(ConnectorError::Protocol(
                    "source ended early during upload".to_string(),
                ));
            }
            consumed += n as u64;
            match encrypt.as_mut() {
                Some(stream) => {
                    stream.write(&buf[..n])?;
                    send_stream(stream, &mut scratch, &mut ch).await?;
                }
                None => ch.send_data(&buf[..n]).await?,
            }
        }
        if let Some(stream) = encrypt.as_mut() {
            stream.finish()?;
            send_stream(stream, &mut scratch, &mut ch).await?;
        }

        match ch.recv().await? {
            Frame::Ack => Ok(()),
            Frame::Error { message } => Err(ConnectorError::Server(message)),
            other => Err(unexpected(&other)),
        }
    }

    async fn delete_file(&self, path: &str, modified: i64) -> ConnectorResult<()> {
        let mut ch = self.requests.lock().await;
        let request = Frame::DeleteFile {
            path: path.to_string(),
            modified,
        };
        match ch.request(&request).await? {
            Frame::Ack => Ok(()),
            Frame::Error { message } => Err(ConnectorError::Server(message)),
            other => Err(unexpected(&other)),
        }
    }

    async fn wait(&self) -> ConnectorResult<(String, FileData)> {
        let mut pushes = self.pushes.lock().await;
        pushes.recv().await.ok_or(ConnectorError::Closed)
    }

    async fn close(&self) {
        // Stop the reader first: its channel senders drop, so an
        // in-flight request stops waiting for a response and releases
        // the request lock instead of holding it against us.
        if let Some(handle) = self.reader.lock().expect("reader lock poisoned").take() {
            handle.abort();
        }
        let mut ch = self.requests.lock().await;
        if let Some(mut write) = ch.write.take() {
            let _ = wire::write_control(&mut write, &Frame::Bye).await;
            let _ = write.shutdown().await;
        }
    }
}

impl Drop for SockConnector {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.reader.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// Wire bytes for an `n`-byte plaintext in keyed mode: IV block, padded
/// data, trailing signature.
fn encrypted_len(n: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    block + (n / block + 1) * block + HASH_SIZE as u64
}

fn unexpected(frame: &Frame) -> ConnectorError {
    ConnectorError::Protocol(format!("unexpected frame: {frame:?}"))
}

async fn drain_to_sink<S: CryptStream>(
    stream: &mut S,
    scratch: &mut [u8],
    sink: &mut (dyn AsyncWrite + Send + Unpin),
) -> ConnectorResult<()> {
    loop {
        let n = stream.read(scratch);
        if n == 0 {
            return Ok(());
        }
        sink.write_all(&scratch[..n]).await?;
    }
}

async fn send_stream<S: CryptStream>(
    stream: &mut S,
    scratch: &mut [u8],
    ch: &mut RequestChannel,
) -> ConnectorResult<()> {
    loop {
        let n = stream.read(scratch);
        if n == 0 {
            return Ok(());
        }
        ch.send_data(&scratch[..n]).await?;
    }
}
