use std::{future::Future, net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    select,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    dispatch,
    protocol::{MAX_COMMAND_BYTES, Rejection},
    store::RecordStore,
};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Serves one record store over TCP, one connection at a time.
///
/// A connection is read until the peer closes it before the next one is
/// accepted. Later clients wait in the listen backlog, so the store never sees
/// two connections at once and needs no locking.
pub struct Worker {
    listener: TcpListener,
    store: RecordStore,
    idle_timeout: Option<Duration>,
}

impl Worker {
    pub fn new(listener: TcpListener, store: RecordStore) -> Self {
        Self {
            listener,
            store,
            idle_timeout: None,
        }
    }

    /// Drops a connection that sends nothing for `idle_timeout`.
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and serves connections until `shutdown` resolves.
    ///
    /// Connection I/O failures only end that connection. A store failure is
    /// returned and stops the worker.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Worker {
            listener,
            mut store,
            idle_timeout,
        } = self;
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = select! {
                _ = &mut shutdown => break,
                accept_result = listener.accept() => match accept_result {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = ?err, "failed to accept connection");
                        continue;
                    }
                },
            };

            info!(peer = %peer, "controller connected");
            select! {
                _ = &mut shutdown => break,
                served = serve_connection(stream, &mut store, idle_timeout) => {
                    match served? {
                        Disconnect::Closed => info!(peer = %peer, "controller disconnected"),
                        Disconnect::IdleTimeout => {
                            warn!(peer = %peer, "closing idle connection")
                        }
                        Disconnect::Io(err) => {
                            warn!(peer = %peer, error = ?err, "connection closed with error")
                        }
                    }
                }
            }
        }

        info!("worker shutting down");
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

/// Why a served connection ended, when the worker itself is still healthy.
#[derive(Debug)]
enum Disconnect {
    Closed,
    IdleTimeout,
    Io(std::io::Error),
}

/// One unit of input read from a controller.
enum Frame {
    Eof,
    Line,
    TooLong,
}

async fn serve_connection(
    stream: TcpStream,
    store: &mut RecordStore,
    idle_timeout: Option<Duration>,
) -> Result<Disconnect> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::with_capacity(MAX_COMMAND_BYTES);

    loop {
        buffer.clear();
        let read = match idle_timeout {
            Some(limit) => match timeout(limit, read_frame(&mut reader, &mut buffer)).await {
                Ok(read) => read,
                Err(_) => return Ok(Disconnect::IdleTimeout),
            },
            None => read_frame(&mut reader, &mut buffer).await,
        };

        let reply = match read {
            Ok(Frame::Eof) => return Ok(Disconnect::Closed),
            Ok(Frame::TooLong) => {
                warn!(limit = MAX_COMMAND_BYTES, "discarded oversized command");
                Rejection::TooLong.reply()
            }
            Ok(Frame::Line) => {
                let line = String::from_utf8_lossy(&buffer);
                let command = line.trim_end_matches(LINE_ENDINGS);
                debug!(command, "received");
                dispatch::handle_line(store, command).with_context(|| {
                    format!("record store failed while executing {command:?}")
                })?
            }
            Err(err) => return Ok(Disconnect::Io(err)),
        };
        debug!(error = reply.is_error(), reply = %reply, "replying");

        if let Err(err) = write_reply(&mut writer, &reply.encode()).await {
            return Ok(Disconnect::Io(err));
        }
    }
}

/// Reads one newline-terminated command into `buffer`, keeping at most
/// [`MAX_COMMAND_BYTES`] of it. An unterminated line at end of stream still
/// counts as a command.
async fn read_frame<R>(reader: &mut R, buffer: &mut Vec<u8>) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_COMMAND_BYTES as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', buffer).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }
    if buffer.len() > MAX_COMMAND_BYTES && buffer.last() != Some(&b'\n') {
        skip_line(reader).await?;
        return Ok(Frame::TooLong);
    }
    Ok(Frame::Line)
}

/// Drops input up to and including the next newline, or to end of stream.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        if let Some(end) = chunk.iter().position(|byte| *byte == b'\n') {
            reader.consume(end + 1);
            return Ok(());
        }
        let len = chunk.len();
        reader.consume(len);
    }
}

async fn write_reply<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
