//! Running a transcoder and streaming its stdout.

use std::io;
use std::pin::Pin;
use std::process::Stdio;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::io::ReaderStream;

use super::TranscodeError;

/// Live output of a transcoder process.
pub type SegmentStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

type Running = (Child, ReaderStream<ChildStdout>, String);

/// Spawn `argv` and stream its stdout in chunks of up to `buffer_size` bytes.
///
/// stdin and stderr are discarded. The process is killed when the stream is
/// dropped before it ends. A non-zero exit after stdout closes is yielded as
/// the final item.
pub fn spawn_stream(argv: &[String], buffer_size: usize) -> Result<SegmentStream, TranscodeError> {
    let (program, args) = argv.split_first().ok_or(TranscodeError::EmptyCommand)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| TranscodeError::ProcessFailed {
            program: program.clone(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TranscodeError::ProcessFailed {
            program: program.clone(),
            source: io::Error::new(io::ErrorKind::Other, "stdout was not captured"),
        })?;

    tracing::debug!(program = %program, pid = ?child.id(), "Spawned transcoder");

    let reader = ReaderStream::with_capacity(stdout, buffer_size.max(1));
    let initial: Option<Running> = Some((child, reader, program.clone()));

    let stream = futures::stream::unfold(initial, |state| async move {
        let (mut child, mut reader, program) = state?;

        match reader.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), Some((child, reader, program)))),
            Some(Err(e)) => Some((Err(e), None)),
            None => match child.wait().await {
                Ok(status) if status.success() => None,
                Ok(status) => {
                    tracing::warn!(program = %program, %status, "Transcoder exited with failure");
                    Some((
                        Err(io::Error::new(
                            io::ErrorKind::Other,
                            format!("{} exited with {}", program, status),
                        )),
                        None,
                    ))
                }
                Err(e) => Some((Err(e), None)),
            },
        }
    });

    Ok(Box::pin(stream))
}
