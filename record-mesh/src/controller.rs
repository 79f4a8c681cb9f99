//! Controller side of the protocol: sessions to a worker and the user-facing
//! command set built on top of them.
//!
//! Every command is validated before any connection is opened, so a usage
//! error never touches the network. A command uses exactly one connection;
//! `readloop` keeps it open across all of its reads.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tokio::{
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::{sleep, timeout},
};
use tracing::{debug, warn};

use crate::{
    config::Endpoint,
    protocol::{Operation, REPLY_BUFFER_SIZE, Reply},
};

/// A validated controller command.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    Write { fields: Vec<String> },
    Read { key: String },
    ReadLoop { key: String, count: u64, interval: Duration },
    Help,
}

impl ControllerCommand {
    /// Validates a command name and its arguments.
    ///
    /// The command name is case-insensitive. Arity and number formats are
    /// checked here; the error text is the usage line shown to the user.
    pub fn parse(command: &str, args: &[String]) -> Result<Self> {
        match command.to_lowercase().as_str() {
            "write" => {
                if args.is_empty() {
                    bail!("usage: write <name>");
                }
                Ok(ControllerCommand::Write {
                    fields: args.to_vec(),
                })
            }
            "read" => match args {
                [key] => Ok(ControllerCommand::Read { key: key.clone() }),
                _ => bail!("usage: read <key>"),
            },
            "readloop" => {
                let [key, count, interval] = args else {
                    bail!("usage: readloop <key> <n> <interval_seconds>");
                };
                let count: u64 = count
                    .parse()
                    .map_err(|_| anyhow!("n must be a non-negative integer, got '{count}'"))?;
                let interval = interval
                    .parse::<f64>()
                    .ok()
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                    .ok_or_else(|| {
                        anyhow!("interval must be a non-negative number of seconds, got '{interval}'")
                    })?;
                Ok(ControllerCommand::ReadLoop {
                    key: key.clone(),
                    count,
                    interval,
                })
            }
            "help" => Ok(ControllerCommand::Help),
            other => bail!("unknown command: {other} (expected write, read, readloop or help)"),
        }
    }
}

/// One open connection to a worker.
pub struct Session {
    stream: TcpStream,
    timeout: Option<Duration>,
}

impl Session {
    pub async fn connect(endpoint: &Endpoint, limit: Option<Duration>) -> Result<Self> {
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = with_limit(limit, connect)
            .await
            .and_then(|connected| Ok(connected?))
            .with_context(|| format!("failed to connect to {endpoint}"))?;
        debug!(%endpoint, "connected");
        Ok(Self {
            stream,
            timeout: limit,
        })
    }

    /// Sends one operation and returns the reply text.
    ///
    /// The reply is whatever a single read of at most [`REPLY_BUFFER_SIZE`]
    /// bytes delivers; longer replies are cut short.
    pub async fn request(&mut self, operation: &Operation) -> Result<String> {
        self.stream
            .write_all(operation.encode().as_bytes())
            .await
            .context("failed to send command")?;

        let mut buffer = vec![0; REPLY_BUFFER_SIZE];
        let read = with_limit(self.timeout, self.stream.read(&mut buffer))
            .await?
            .context("failed to read reply")?;
        if read == 0 {
            bail!("worker closed the connection");
        }
        Ok(Reply::decode(&buffer[..read]))
    }

    pub async fn close(mut self) {
        if let Err(error) = self.stream.shutdown().await {
            warn!(?error, "failed to shutdown connection cleanly");
        }
    }
}

async fn with_limit<F: std::future::Future>(
    limit: Option<Duration>,
    future: F,
) -> Result<F::Output> {
    match limit {
        Some(limit) => timeout(limit, future)
            .await
            .map_err(|_| anyhow!("timed out after {limit:?}")),
        None => Ok(future.await),
    }
}

/// Runs a validated command against `endpoint`, printing replies to `out`.
pub async fn run<W>(
    command: &ControllerCommand,
    endpoint: &Endpoint,
    limit: Option<Duration>,
    out: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut session = Session::connect(endpoint, limit).await?;

    match command {
        ControllerCommand::Write { fields } => {
            let operation = Operation::Write {
                fields: fields.clone(),
            };
            let reply = session.request(&operation).await?;
            write_line(out, &reply).await?;
        }
        ControllerCommand::Read { key } => {
            let reply = session.request(&Operation::Read { key: key.clone() }).await?;
            write_line(out, &reply).await?;
        }
        ControllerCommand::ReadLoop {
            key,
            count,
            interval,
        } => {
            let operation = Operation::Read { key: key.clone() };
            for i in 1..=*count {
                let reply = session.request(&operation).await?;
                write_line(out, &format!("{i}/{count}: {reply}")).await?;
                if i != *count {
                    sleep(*interval).await;
                }
            }
        }
        ControllerCommand::Help => {
            let reply = session.request(&Operation::Help).await?;
            write_line(out, &reply).await?;
        }
    }

    session.close().await;
    Ok(())
}

async fn write_line<W>(out: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_each_command() {
        assert_eq!(
            ControllerCommand::parse("write", &args(&["Jane", "Doe"])).unwrap(),
            ControllerCommand::Write {
                fields: args(&["Jane", "Doe"])
            }
        );
        assert_eq!(
            ControllerCommand::parse("READ", &args(&["count"])).unwrap(),
            ControllerCommand::Read {
                key: "count".into()
            }
        );
        assert_eq!(
            ControllerCommand::parse("readloop", &args(&["all", "3", "0.5"])).unwrap(),
            ControllerCommand::ReadLoop {
                key: "all".into(),
                count: 3,
                interval: Duration::from_millis(500),
            }
        );
        assert_eq!(
            ControllerCommand::parse("help", &[]).unwrap(),
            ControllerCommand::Help
        );
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(ControllerCommand::parse("write", &[]).is_err());
        assert!(ControllerCommand::parse("read", &[]).is_err());
        assert!(ControllerCommand::parse("read", &args(&["count", "all"])).is_err());
        assert!(ControllerCommand::parse("readloop", &args(&["count", "3"])).is_err());
    }

    #[test]
    fn rejects_bad_readloop_numbers() {
        for bad in [
            ["count", "three", "1"],
            ["count", "3", "soon"],
            ["count", "-3", "1"],
            ["count", "3", "-1"],
            ["count", "2.5", "1"],
            ["count", "3", "NaN"],
        ] {
            assert!(
                ControllerCommand::parse("readloop", &args(&bad)).is_err(),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = ControllerCommand::parse("delete", &args(&["1"])).unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    }
}
