use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Send one command to a registered worker and print its reply.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ControllerArgs {
    /// JSON file mapping worker ids to `{"host", "port"}` entries.
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Seconds to wait for a connection or a reply before giving up.
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Id of the worker to contact, as listed in the configuration file.
    pub worker_id: String,

    /// One of: write, read, readloop, help.
    pub command: String,

    /// Arguments for the command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Serve a record store to controllers over TCP.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct WorkerArgs {
    /// Socket address to bind. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:50000")]
    pub listen: SocketAddr,

    /// Record store file, created on first start.
    #[arg(long, default_value = "records.jsonl")]
    pub data: PathBuf,

    /// Close a connection that stays silent for this many seconds.
    #[arg(long)]
    pub idle_timeout: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_collects_trailing_args() {
        let args = ControllerArgs::try_parse_from([
            "controller",
            "worker1",
            "readloop",
            "count",
            "3",
            "-1",
        ])
        .unwrap();
        assert_eq!(args.worker_id, "worker1");
        assert_eq!(args.command, "readloop");
        assert_eq!(args.args, vec!["count", "3", "-1"]);
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert_eq!(args.timeout, None);
    }

    #[test]
    fn controller_requires_worker_and_command() {
        assert!(ControllerArgs::try_parse_from(["controller", "worker1"]).is_err());
    }

    #[test]
    fn worker_defaults() {
        let args = WorkerArgs::try_parse_from(["worker"]).unwrap();
        assert_eq!(args.listen, "0.0.0.0:50000".parse().unwrap());
        assert_eq!(args.data, PathBuf::from("records.jsonl"));
        assert_eq!(args.idle_timeout, None);
    }

    #[test]
    fn timeouts_accept_fractional_seconds() {
        let worker = WorkerArgs::try_parse_from(["worker", "--idle-timeout", "0.25"]).unwrap();
        assert_eq!(worker.idle_timeout, Some(0.25));

        let controller =
            ControllerArgs::try_parse_from(["controller", "--timeout", "1.5", "w1", "help"])
                .unwrap();
        assert_eq!(controller.timeout, Some(1.5));
    }
}
