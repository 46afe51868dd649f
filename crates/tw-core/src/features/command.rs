//! External motif counter invoked as a subprocess.
//!
//! The tool receives the sample file path (via an `{input}` placeholder, or
//! as the last argument when no placeholder is present) and prints
//! non-negative integer counts separated by whitespace or commas.
//!
//! Execution is bounded: a per-sample timeout escalates SIGTERM → SIGKILL,
//! and captured stdout is capped.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};
use tw_common::{Error, Result};
use tw_config::CommandSpec;

use super::{ExtractParams, FeatureExtractor, MotifKind, SampleInput};

/// Maximum captured stdout/stderr per invocation.
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const SIGTERM_GRACE_MS: u64 = 500;

/// Errors from a single extractor invocation.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("killed by signal")]
    Killed,

    #[error("output exceeded {0} bytes")]
    OutputTruncated(usize),

    #[error("unparseable count {0:?}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractorError {
    /// Attach the sample identity.
    pub fn for_sample(self, sample: &str) -> Error {
        match self {
            ExtractorError::Timeout(d) => Error::ExtractorTimeout {
                sample: sample.to_string(),
                seconds: d.as_secs(),
            },
            other => Error::Extraction {
                sample: sample.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Captured result of one run.
#[derive(Debug)]
struct RunOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<i32>,
    truncated: bool,
}

/// Feature extractor backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    kind: MotifKind,
    spec: CommandSpec,
    timeout: Duration,
}

impl CommandExtractor {
    pub fn new(kind: MotifKind, spec: CommandSpec, timeout: Duration) -> Self {
        CommandExtractor {
            kind,
            spec,
            timeout,
        }
    }

    /// Arguments with placeholders substituted.
    pub fn render_args(&self, input: &str, delta_secs: i64) -> Vec<String> {
        let delta = delta_secs.to_string();
        let mut saw_input = false;
        let mut args: Vec<String> = self
            .spec
            .args
            .iter()
            .map(|a| {
                saw_input |= a.contains("{input}");
                a.replace("{input}", input).replace("{delta}", &delta)
            })
            .collect();
        if !saw_input {
            args.push(input.to_string());
        }
        args
    }

    fn build_command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.spec.program);
        command.args(args);
        command.env_clear();
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }
        command.env("LC_ALL", "C");
        command.env("LANG", "C");
        command
    }

    fn run(&self, args: &[String]) -> std::result::Result<Vec<u64>, ExtractorError> {
        debug!(
            program = %self.spec.program,
            args = ?args,
            timeout_ms = self.timeout.as_millis() as u64,
            "running extractor"
        );

        let mut child = self
            .build_command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExtractorError::SpawnFailed {
                program: self.spec.program.clone(),
                source,
            })?;

        let output = execute_with_timeout(&mut child, self.timeout, MAX_OUTPUT_BYTES)?;
        if output.truncated {
            return Err(ExtractorError::OutputTruncated(MAX_OUTPUT_BYTES));
        }
        match output.exit_code {
            Some(0) => {}
            Some(code) => {
                return Err(ExtractorError::NonZeroExit {
                    code,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
            None => return Err(ExtractorError::Killed),
        }

        parse_counts(&String::from_utf8_lossy(&output.stdout))
    }
}

impl FeatureExtractor for CommandExtractor {
    fn kind(&self) -> MotifKind {
        self.kind
    }

    fn extract(&self, sample: &SampleInput<'_>, params: &ExtractParams) -> Result<Vec<u64>> {
        let args = self.render_args(&sample.path.display().to_string(), params.delta_secs);
        self.run(&args)
            .map_err(|e| e.for_sample(&sample.id.to_string()))
    }
}

/// Parse whitespace- or comma-separated counts.
pub fn parse_counts(text: &str) -> std::result::Result<Vec<u64>, ExtractorError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<u64>().map_err(|_| ExtractorError::Parse(t.to_string())))
        .collect()
}

fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], max: usize, truncated: &mut bool) {
    let space = max.saturating_sub(buf.len());
    if chunk.len() > space {
        *truncated = true;
    }
    buf.extend_from_slice(&chunk[..chunk.len().min(space)]);
}

fn execute_with_timeout(
    child: &mut Child,
    timeout: Duration,
    max_output: usize,
) -> std::result::Result<RunOutput, ExtractorError> {
    let deadline = Instant::now() + timeout;
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let mut truncated = false;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut chunk = vec![0u8; 8192];

    loop {
        if Instant::now() >= deadline {
            warn!(pid = child.id(), "extractor timed out, sending SIGTERM");
            kill_with_grace(child);
            return Err(ExtractorError::Timeout(timeout));
        }

        let polled = poll_stream(
            stdout.as_mut(),
            &mut chunk,
            &mut stdout_buf,
            max_output,
            &mut truncated,
        )
        .and_then(|out_read| {
            poll_stream(
                stderr.as_mut(),
                &mut chunk,
                &mut stderr_buf,
                max_output,
                &mut truncated,
            )
            .map(|err_read| out_read || err_read)
        });
        let did_read = match polled {
            Ok(did_read) => did_read,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "extractor output unreadable, stopping it");
                kill_with_grace(child);
                return Err(ExtractorError::Io(e));
            }
        };

        match child.try_wait()? {
            Some(status) => {
                if let Some(out) = stdout.as_mut() {
                    drain(out, &mut stdout_buf, max_output, &mut truncated)?;
                }
                if let Some(err) = stderr.as_mut() {
                    drain(err, &mut stderr_buf, max_output, &mut truncated)?;
                }
                trace!(exit_code = ?status.code(), "extractor exited");
                return Ok(RunOutput {
                    stdout: stdout_buf,
                    stderr: stderr_buf,
                    exit_code: status.code(),
                    truncated,
                });
            }
            None if !did_read => thread::sleep(Duration::from_millis(10)),
            None => {}
        }
    }
}

/// Append whatever `stream` has ready. `Ok(true)` when bytes arrived.
///
/// An interrupted read counts as an empty one; other errors are returned.
#[cfg(unix)]
fn poll_stream<R: Read + std::os::unix::io::AsRawFd>(
    stream: Option<&mut R>,
    chunk: &mut [u8],
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) -> std::io::Result<bool> {
    let Some(stream) = stream else {
        return Ok(false);
    };
    match try_read_nonblocking(stream, chunk) {
        Ok(n) => {
            append_capped(buf, &chunk[..n], max, truncated);
            Ok(n > 0)
        }
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn poll_stream(
    stream: Option<&mut impl Read>,
    chunk: &mut [u8],
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) -> std::io::Result<bool> {
    let Some(stream) = stream else {
        return Ok(false);
    };
    match try_read_nonblocking(stream, chunk) {
        Ok(n) => {
            append_capped(buf, &chunk[..n], max, truncated);
            Ok(n > 0)
        }
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(false),
        Err(e) => Err(e),
    }
}

/// Drain what is immediately available without waiting on grandchildren.
#[cfg(unix)]
fn drain<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) -> std::io::Result<()> {
    let mut chunk = vec![0u8; 8192];
    while !*truncated {
        match try_read_nonblocking(stream, &mut chunk)? {
            0 => break,
            n => append_capped(buf, &chunk[..n], max, truncated),
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn drain(
    stream: &mut impl Read,
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) -> std::io::Result<()> {
    let mut chunk = vec![0u8; 8192];
    while !*truncated {
        match stream.read(&mut chunk)? {
            0 => break,
            n => append_capped(buf, &chunk[..n], max, truncated),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as i32;
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    debug!(pid, "sent SIGTERM");

    thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));

    match child.try_wait() {
        Ok(Some(_)) => trace!(pid, "extractor exited after SIGTERM"),
        Ok(None) => {
            warn!(pid, "extractor ignored SIGTERM, sending SIGKILL");
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
            let _ = child.wait();
        }
        Err(e) => warn!(pid, error = %e, "failed to check extractor status"),
    }
}

#[cfg(not(unix))]
fn kill_with_grace(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Read without blocking; `Ok(0)` when nothing is available.
#[cfg(unix)]
fn try_read_nonblocking<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let fd = stream.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let was_nonblocking = (flags & libc::O_NONBLOCK) != 0;
    if !was_nonblocking && unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0
    {
        return Err(std::io::Error::last_os_error());
    }

    let result = stream.read(buf);

    if !was_nonblocking {
        unsafe {
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }

    match result {
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
        other => other,
    }
}

#[cfg(not(unix))]
fn try_read_nonblocking<R: Read>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    stream.read(buf)
}
