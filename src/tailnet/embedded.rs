//! Embedded tailnet node.
//!
//! # Responsibilities
//! - Run a private `tailscaled` with its own state directory and socket
//! - Authenticate it with the configured key and hostname
//! - Wait until the node reports `Running`, bounded by the startup timeout
//! - Provide a listener reachable from the tailnet
//!
//! # Design Decisions
//! - The daemon is a child process killed on close or drop
//! - The auth key is handed over through a `0600` file, never argv
//! - In userspace mode the daemon forwards tailnet connections to loopback,
//!   so the listener binds loopback; otherwise it binds the node's address

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

use crate::config::{ListenerConfig, TailnetConfig};
use crate::net::{bind_tcp, ListenerError, ListenerProvider, ServeMode};
use crate::tailnet::local_client::LocalClient;
use crate::tailnet::types::{NetworkClient, NetworkError};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum TailnetError {
    #[error("no auth key configured")]
    MissingAuthKey,

    #[error("failed to prepare state directory {path}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tailnet login failed: {0}")]
    Login(String),

    #[error("tailnet node not running after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// A tailnet node owned by this process.
pub struct EmbeddedTailnet {
    client: Arc<LocalClient>,
    userspace_networking: bool,
    daemon: Mutex<Option<Child>>,
}

impl EmbeddedTailnet {
    /// Start the node and wait for it to come up.
    pub async fn start(
        config: &TailnetConfig,
        network_timeout: Duration,
    ) -> Result<Self, TailnetError> {
        let auth_key = config
            .auth_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(TailnetError::MissingAuthKey)?;

        let state_dir = PathBuf::from(&config.state_dir);
        tokio::fs::create_dir_all(&state_dir)
            .await
            .map_err(|source| TailnetError::StateDir {
                path: state_dir.clone(),
                source,
            })?;
        let socket = state_dir.join("tailscaled.sock");
        let key_file = write_key_file(&state_dir, auth_key).await?;

        let mut command = Command::new(&config.tailscaled_path);
        command
            .args(daemon_args(&state_dir, &socket, config.userspace_networking))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| TailnetError::Spawn {
            binary: config.tailscaled_path.clone(),
            source,
        })?;
        if let Some(out) = child.stdout.take() {
            forward_output(out);
        }
        if let Some(err) = child.stderr.take() {
            forward_output(err);
        }

        tracing::info!(
            hostname = %config.hostname,
            state_dir = %state_dir.display(),
            userspace_networking = config.userspace_networking,
            "Starting embedded tailnet node"
        );

        let node = Self {
            client: Arc::new(LocalClient::new(&socket, network_timeout)),
            userspace_networking: config.userspace_networking,
            daemon: Mutex::new(Some(child)),
        };

        let deadline = Duration::from_secs(config.startup_timeout_secs);
        let brought_up = timeout(deadline, node.bring_up(config, &socket, &key_file)).await;
        let _ = tokio::fs::remove_file(&key_file).await;
        match brought_up {
            Ok(result) => result?,
            Err(_) => return Err(TailnetError::Timeout(deadline)),
        }

        tracing::info!(hostname = %config.hostname, "Embedded tailnet node running");
        Ok(node)
    }

    async fn bring_up(
        &self,
        config: &TailnetConfig,
        socket: &Path,
        key_file: &Path,
    ) -> Result<(), TailnetError> {
        // The socket appears, and answers sensibly, once the daemon has initialized.
        loop {
            match self.client.status().await {
                Ok(_) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "Waiting for tailscaled");
                    sleep(POLL_INTERVAL).await;
                }
            }
        }

        let output = Command::new(&config.tailscale_path)
            .args(up_args(socket, key_file, &config.hostname))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TailnetError::Spawn {
                binary: config.tailscale_path.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(TailnetError::Login(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        loop {
            match self.client.status().await {
                Ok(status) if status.is_running() => return Ok(()),
                Ok(status) => {
                    tracing::debug!(backend_state = %status.backend_state, "Waiting for tailnet node");
                }
                Err(e) => tracing::debug!(error = %e, "Waiting for tailnet node"),
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ListenerProvider for EmbeddedTailnet {
    fn mode(&self) -> ServeMode {
        ServeMode::Embedded
    }

    fn network_client(&self) -> Arc<dyn NetworkClient> {
        self.client.clone()
    }

    async fn listen(&self, config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
        let ip = if self.userspace_networking {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            let status = self.client.status().await?;
            status
                .ipv4()
                .ok_or_else(|| ListenerError::NoAddress(status.backend_state.clone()))?
        };
        bind_tcp(SocketAddr::new(ip, config.port)).await
    }

    async fn close(&self) {
        if let Some(mut child) = self.daemon.lock().await.take() {
            match child.kill().await {
                Ok(()) => tracing::info!("Embedded tailnet node stopped"),
                Err(e) => tracing::warn!(error = %e, "Failed to stop embedded tailnet node"),
            }
        }
    }
}

fn daemon_args(state_dir: &Path, socket: &Path, userspace: bool) -> Vec<String> {
    let mut args = vec![
        format!("--statedir={}", state_dir.display()),
        format!("--socket={}", socket.display()),
        "--port=0".to_string(),
    ];
    if userspace {
        args.push("--tun=userspace-networking".to_string());
    }
    args
}

fn up_args(socket: &Path, key_file: &Path, hostname: &str) -> Vec<String> {
    vec![
        format!("--socket={}", socket.display()),
        "up".to_string(),
        format!("--auth-key=file:{}", key_file.display()),
        format!("--hostname={}", hostname),
    ]
}

async fn write_key_file(state_dir: &Path, auth_key: &str) -> Result<PathBuf, TailnetError> {
    let path = state_dir.join("authkey");
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let to_err = |source| TailnetError::StateDir {
        path: path.clone(),
        source,
    };
    let mut file = options.open(&path).await.map_err(to_err)?;
    tokio::io::AsyncWriteExt::write_all(&mut file, auth_key.as_bytes())
        .await
        .map_err(to_err)?;
    Ok(path)
}

fn forward_output<R>(stream: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(target: "tailscaled", "{}", line);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_uses_private_state_and_socket() {
        let args = daemon_args(Path::new("/var/lib/demo"), Path::new("/var/lib/demo/ts.sock"), true);
        assert_eq!(
            args,
            vec![
                "--statedir=/var/lib/demo",
                "--socket=/var/lib/demo/ts.sock",
                "--port=0",
                "--tun=userspace-networking",
            ]
        );
        assert_eq!(daemon_args(Path::new("/s"), Path::new("/s/x.sock"), false).len(), 3);
    }

    #[test]
    fn auth_key_is_not_on_the_command_line() {
        let args = up_args(Path::new("/s/ts.sock"), Path::new("/s/authkey"), "demo");
        assert!(args.contains(&"--auth-key=file:/s/authkey".to_string()));
        assert!(args.contains(&"--hostname=demo".to_string()));
        assert!(args.iter().all(|a| !a.contains("tskey")));
    }

    #[tokio::test]
    async fn missing_auth_key_fails_fast() {
        let config = TailnetConfig::default();
        let err = EmbeddedTailnet::start(&config, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TailnetError::MissingAuthKey));
    }

    #[tokio::test]
    async fn missing_daemon_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TailnetConfig::default();
        config.auth_key = Some("tskey-auth-test".into());
        config.state_dir = dir.path().to_string_lossy().into_owned();
        config.tailscaled_path = dir.path().join("no-such-tailscaled").to_string_lossy().into_owned();

        let err = EmbeddedTailnet::start(&config, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TailnetError::Spawn { .. }));
    }

    /// Answers each LocalAPI connection with the next body; the last one repeats.
    #[cfg(unix)]
    fn spawn_daemon(path: &Path, bodies: Vec<&'static str>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::UnixListener::bind(path).unwrap();
        tokio::spawn(async move {
            let mut served = 0;
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = bodies[served.min(bodies.len() - 1)];
                served += 1;
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn comes_up_through_logged_out_state() {
        let dir = tempfile::tempdir().unwrap();
        spawn_daemon(
            &dir.path().join("tailscaled.sock"),
            vec![
                "daemon still starting",
                r#"{"BackendState":"NeedsLogin","TailscaleIPs":null,"Self":null}"#,
                r#"{"BackendState":"NeedsLogin","TailscaleIPs":null,"Self":null}"#,
                r#"{"BackendState":"Running","TailscaleIPs":["100.64.0.5"]}"#,
            ],
        );

        let mut config = TailnetConfig::default();
        config.auth_key = Some("tskey-auth-test".into());
        config.state_dir = dir.path().to_string_lossy().into_owned();
        config.tailscaled_path = "true".into();
        config.tailscale_path = "true".into();
        config.startup_timeout_secs = 10;

        let node = EmbeddedTailnet::start(&config, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!dir.path().join("authkey").exists());
        assert!(node.network_client().status().await.unwrap().is_running());
        node.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = write_key_file(dir.path(), "tskey-auth-secret").await.unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "tskey-auth-secret");
    }
}
