//! Opaque process transport.
//!
//! Spawns the analyzer with piped stdin/stdout and watches for termination.
//! The byte stream itself is opaque at this layer - an embedding editor owns
//! the protocol - so the reader task's only job is to observe EOF or an I/O
//! error and report the closure to the supervisor as an event.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use sidekick_types::SupervisorError;

const KILL_TIMEOUT_SECS: u64 = 2;

const READ_BUF_BYTES: usize = 8 * 1024;

/// Event emitted by the transport reader task.
///
/// Each spawn carries a generation number so the supervisor can tell a
/// closure of the current process apart from the queued echo of one it
/// already shut down.
#[derive(Debug)]
pub enum TransportEvent {
    /// The process's stdout reached EOF or failed; the process is dead or
    /// dying.
    Closed {
        generation: u64,
        error: Option<String>,
    },
}

pub(crate) struct Transport {
    child: Child,
    #[allow(dead_code)]
    reader_handle: tokio::task::JoinHandle<()>,
}

impl Transport {
    pub fn spawn(
        binary_path: &Path,
        generation: u64,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, SupervisorError> {
        let spawn_err = |source: std::io::Error| SupervisorError::Spawn {
            path: binary_path.to_path_buf(),
            source,
        };

        let mut child = Command::new(binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err(std::io::Error::other("no stdout pipe from child")))?;

        let reader_handle = tokio::spawn(async move {
            let mut buf = vec![0u8; READ_BUF_BYTES];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => {
                        let _ = event_tx
                            .send(TransportEvent::Closed {
                                generation,
                                error: None,
                            })
                            .await;
                        break;
                    }
                    // Payload bytes are opaque here.
                    Ok(_) => {}
                    Err(e) => {
                        let _ = event_tx
                            .send(TransportEvent::Closed {
                                generation,
                                error: Some(e.to_string()),
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child,
            reader_handle,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the process with a bounded wait. Consumes self.
    pub async fn shutdown(mut self) {
        let _ = self.child.start_kill();
        if tokio::time::timeout(
            Duration::from_secs(KILL_TIMEOUT_SECS),
            self.child.wait(),
        )
        .await
        .is_err()
        {
            tracing::debug!("Analyzer did not exit within the kill timeout");
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::{Transport, TransportEvent};
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("analyzer");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[tokio::test]
    async fn exiting_process_emits_closed_with_its_generation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = script(dir.path(), "exit 0");
        let (event_tx, mut event_rx) = mpsc::channel(4);

        let transport = Transport::spawn(&path, 7, event_tx).expect("spawn");

        let event = event_rx.recv().await.expect("event");
        match event {
            TransportEvent::Closed { generation, error } => {
                assert_eq!(generation, 7);
                assert!(error.is_none());
            }
        }
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn long_running_process_reports_a_pid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = script(dir.path(), "sleep 30");
        let (event_tx, _event_rx) = mpsc::channel(4);

        let transport = Transport::spawn(&path, 1, event_tx).expect("spawn");
        assert!(transport.id().is_some());
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn spawn_of_missing_binary_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (event_tx, _event_rx) = mpsc::channel(4);

        let result = Transport::spawn(&dir.path().join("missing"), 1, event_tx);
        assert!(result.is_err());
    }
}
