//! Capturing console output written by test code.
//!
//! Cases write through [`stdout`] and [`stderr`] (or the [`test_println`](crate::test_println)
//! and [`test_eprintln`](crate::test_eprintln) macros). Outside a case these forward to the
//! process's standard streams. While a case is being invoked, the runner holds an
//! [`OutputCapture`] and everything written on the current thread is accumulated into a buffer
//! instead, then attached to the case's result.
//!
//! With [`CaptureMode::Process`], the capture also redirects the process's standard output and
//! standard error file descriptors, so that `println!`, `eprintln!` and child processes are
//! captured too. Redirected output is appended after the output written through this module.
//!
//! Capture is scoped: dropping the `OutputCapture` always restores the previous sink, including
//! when a case panics.

use bytes::{Bytes, BytesMut};
use std::{
    borrow::Cow,
    cell::{Cell, RefCell},
    io::{self, Write as _},
    ops::Range,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::debug;

thread_local! {
    static ACTIVE_CAPTURE: RefCell<Option<TestOutputAccumulator>> = const { RefCell::new(None) };
    static HOLDS_STDIO: Cell<bool> = const { Cell::new(false) };
}

/// Only one capture may redirect the standard file descriptors at a time.
static STDIO_LOCK: Mutex<()> = Mutex::new(());

/// What an [`OutputCapture`] intercepts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CaptureMode {
    /// Only writes made through this module's writers, on the capturing thread.
    Thread,

    /// Writes made through this module's writers, plus everything written to the process's
    /// standard output and standard error file descriptors.
    ///
    /// Process-level captures on different threads take turns. On platforms without file
    /// descriptor redirection, this behaves like [`Thread`](Self::Thread).
    #[default]
    Process,
}

/// The stream a chunk of output was written to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// A single chunk of captured output; this may represent 0 or more lines.
#[derive(Clone, Debug)]
struct OutputChunk {
    range: Range<usize>,
    stream: OutputStream,
}

/// The complete captured output of a case invocation.
#[derive(Clone, Debug, Default)]
pub struct TestOutput {
    /// The raw buffer of combined stdout and stderr, in the order written.
    buf: Bytes,
    chunks: Vec<OutputChunk>,
}

impl TestOutput {
    /// Returns true if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Gets the combined stdout and stderr streams as a lossy UTF-8 string.
    #[inline]
    pub fn lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    /// Gets only the given stream as a lossy UTF-8 string.
    pub fn stream_lossy(&self, stream: OutputStream) -> String {
        let bytes = self
            .chunks
            .iter()
            .filter(|chunk| chunk.stream == stream)
            .fold(BytesMut::new(), |mut acc, chunk| {
                acc.extend_from_slice(&self.buf[chunk.range.clone()]);
                acc
            });
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[derive(Debug)]
struct TestOutputAccumulator {
    buf: BytesMut,
    chunks: Vec<OutputChunk>,
}

impl TestOutputAccumulator {
    fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4 * 1024),
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, stream: OutputStream, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let start = self.buf.len();
        self.buf.extend_from_slice(data);
        // Coalesce adjacent writes to the same stream.
        match self.chunks.last_mut() {
            Some(last) if last.stream == stream && last.range.end == start => {
                last.range.end = self.buf.len();
            }
            _ => self.chunks.push(OutputChunk {
                range: start..self.buf.len(),
                stream,
            }),
        }
    }

    fn freeze(self) -> TestOutput {
        TestOutput {
            buf: self.buf.freeze(),
            chunks: self.chunks,
        }
    }
}

/// An active output capture on the current thread.
///
/// Created with [`OutputCapture::start`] or [`OutputCapture::start_with`]. Call
/// [`finish`](Self::finish) to retrieve the captured output; dropping the capture without
/// finishing discards it. Either way, whatever capture was active before this one is restored.
#[derive(Debug)]
#[must_use = "output is only captured while the OutputCapture is alive"]
pub struct OutputCapture {
    previous: Option<TestOutputAccumulator>,
    stdio: Option<StdioCapture>,
    finished: bool,
}

impl OutputCapture {
    /// Starts capturing output written through this module on the current thread.
    pub fn start() -> Self {
        Self::start_with(CaptureMode::Thread)
    }

    /// Starts capturing output as described by `mode`.
    ///
    /// A process-level capture started while this thread already holds one only captures
    /// thread-local output; the outer capture keeps the redirected streams.
    pub fn start_with(mode: CaptureMode) -> Self {
        let stdio = match mode {
            CaptureMode::Thread => None,
            CaptureMode::Process => StdioCapture::start(),
        };
        let previous =
            ACTIVE_CAPTURE.with(|active| active.replace(Some(TestOutputAccumulator::new())));
        Self {
            previous,
            stdio,
            finished: false,
        }
    }

    /// Stops capturing and returns everything written since the capture started.
    pub fn finish(mut self) -> TestOutput {
        self.finished = true;
        let redirected = self.stdio.take().map(StdioCapture::finish);
        let previous = self.previous.take();
        let captured = ACTIVE_CAPTURE.with(|active| active.replace(previous));

        let mut accumulator = captured.unwrap_or_else(TestOutputAccumulator::new);
        if let Some((stdout, stderr)) = redirected {
            accumulator.push(OutputStream::Stdout, &stdout);
            accumulator.push(OutputStream::Stderr, &stderr);
        }
        accumulator.freeze()
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        if !self.finished {
            let previous = self.previous.take();
            ACTIVE_CAPTURE.with(|active| active.replace(previous));
        }
    }
}

/// The process's standard output and standard error, redirected into pipes.
///
/// Dropping this restores both descriptors before releasing [`STDIO_LOCK`].
#[derive(Debug)]
struct StdioCapture {
    stdout: imp::Redirect,
    stderr: imp::Redirect,
    _lock: StdioLock,
}

impl StdioCapture {
    fn start() -> Option<Self> {
        if HOLDS_STDIO.with(Cell::get) {
            return None;
        }
        let lock = StdioLock::acquire();
        // Anything buffered before the capture belongs to the real stdout.
        let _ = io::stdout().flush();

        let redirected = imp::Redirect::start(imp::STDOUT)
            .and_then(|stdout| Ok((stdout, imp::Redirect::start(imp::STDERR)?)));
        match redirected {
            Ok((stdout, stderr)) => Some(Self {
                stdout,
                stderr,
                _lock: lock,
            }),
            Err(error) => {
                debug!(%error, "not capturing process output");
                None
            }
        }
    }

    fn finish(self) -> (Vec<u8>, Vec<u8>) {
        let Self {
            stdout,
            stderr,
            _lock,
        } = self;
        let _ = io::stdout().flush();
        let read = |redirect: imp::Redirect| {
            redirect.finish().unwrap_or_else(|error| {
                debug!(%error, "failed to read captured process output");
                Vec::new()
            })
        };
        (read(stdout), read(stderr))
    }
}

#[derive(Debug)]
struct StdioLock {
    _guard: MutexGuard<'static, ()>,
}

impl StdioLock {
    fn acquire() -> Self {
        let guard = STDIO_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        HOLDS_STDIO.with(|holds| holds.set(true));
        Self { _guard: guard }
    }
}

impl Drop for StdioLock {
    fn drop(&mut self) {
        HOLDS_STDIO.with(|holds| holds.set(false));
    }
}

#[cfg(unix)]
mod imp {
    use std::{
        fs::File,
        io::{self, Read},
        os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
        thread::JoinHandle,
    };

    pub(super) const STDOUT: RawFd = libc::STDOUT_FILENO;
    pub(super) const STDERR: RawFd = libc::STDERR_FILENO;

    /// One standard descriptor pointed at a pipe, with a thread draining the other end.
    ///
    /// The pipe is drained while the case runs, so a case writing more than the pipe's buffer
    /// never blocks.
    #[derive(Debug)]
    pub(super) struct Redirect {
        target: RawFd,
        // None once the original descriptor has been restored.
        saved: Option<OwnedFd>,
        reader: Option<JoinHandle<io::Result<Vec<u8>>>>,
    }

    impl Redirect {
        pub(super) fn start(target: RawFd) -> io::Result<Self> {
            let mut fds: [RawFd; 2] = [-1; 2];
            cvt(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
            // SAFETY: pipe succeeded, so both descriptors are open and owned by nobody else.
            let (read_end, write_end) =
                unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

            let reader = std::thread::Builder::new()
                .name("conventest-capture".to_owned())
                .spawn(move || {
                    let mut buf = Vec::new();
                    File::from(read_end).read_to_end(&mut buf)?;
                    Ok(buf)
                })?;

            // SAFETY: dup returns a fresh descriptor on success.
            let saved = unsafe { OwnedFd::from_raw_fd(cvt(libc::dup(target))?) };
            cvt(unsafe { libc::dup2(write_end.as_raw_fd(), target) })?;
            // `target` is now the only write end, so the reader sees EOF once it is restored.
            drop(write_end);

            Ok(Self {
                target,
                saved: Some(saved),
                reader: Some(reader),
            })
        }

        /// Restores the original descriptor and returns everything written to the pipe.
        pub(super) fn finish(mut self) -> io::Result<Vec<u8>> {
            self.restore()?;
            match self.reader.take() {
                Some(reader) => reader
                    .join()
                    .map_err(|_| io::Error::other("output capture thread panicked"))?,
                None => Ok(Vec::new()),
            }
        }

        fn restore(&mut self) -> io::Result<()> {
            if let Some(saved) = self.saved.take() {
                cvt(unsafe { libc::dup2(saved.as_raw_fd(), self.target) })?;
            }
            Ok(())
        }
    }

    impl Drop for Redirect {
        fn drop(&mut self) {
            // The reader thread exits on its own once the write end is closed.
            let _ = self.restore();
        }
    }

    fn cvt(res: libc::c_int) -> io::Result<libc::c_int> {
        if res == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;

    pub(super) const STDOUT: u8 = 1;
    pub(super) const STDERR: u8 = 2;

    #[derive(Debug)]
    pub(super) enum Redirect {}

    impl Redirect {
        pub(super) fn start(_target: u8) -> io::Result<Self> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "file descriptor redirection is only supported on Unix",
            ))
        }

        pub(super) fn finish(self) -> io::Result<Vec<u8>> {
            match self {}
        }
    }
}

/// Returns true if output is currently being captured on this thread.
pub fn is_capturing() -> bool {
    ACTIVE_CAPTURE.with(|active| active.borrow().is_some())
}

/// Returns a writer for the current case's standard output.
pub fn stdout() -> TestOutputWriter {
    TestOutputWriter {
        stream: OutputStream::Stdout,
    }
}

/// Returns a writer for the current case's standard error.
pub fn stderr() -> TestOutputWriter {
    TestOutputWriter {
        stream: OutputStream::Stderr,
    }
}

/// Provides [`std::io::Write`] and [`std::fmt::Write`] implementations for one output stream.
///
/// Writes go to the active capture if there is one, and to the process's own stream otherwise.
#[derive(Copy, Clone, Debug)]
pub struct TestOutputWriter {
    stream: OutputStream,
}

impl io::Write for TestOutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let captured = ACTIVE_CAPTURE.with(|active| match active.borrow_mut().as_mut() {
            Some(accumulator) => {
                accumulator.push(self.stream, buf);
                true
            }
            None => false,
        });
        if captured {
            return Ok(buf.len());
        }

        match self.stream {
            OutputStream::Stdout => io::stdout().write(buf),
            OutputStream::Stderr => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if is_capturing() {
            return Ok(());
        }
        match self.stream {
            OutputStream::Stdout => io::stdout().flush(),
            OutputStream::Stderr => io::stderr().flush(),
        }
    }
}

impl std::fmt::Write for TestOutputWriter {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        io::Write::write_all(self, s.as_bytes()).map_err(|_| std::fmt::Error)
    }
}
