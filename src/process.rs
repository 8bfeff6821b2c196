use std::io::Read;
use std::process::ChildStderr;
use std::thread::JoinHandle;

/// Most stderr kept from one ffmpeg child
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Collects a child's stderr on a background thread
///
/// The pipe is read continuously so a verbose child never blocks on a full
/// stderr buffer while frames are still flowing through stdin or stdout.
#[derive(Debug)]
pub struct StderrDrain {
    handle: Option<JoinHandle<String>>,
}

impl StderrDrain {
    pub fn spawn(stderr: Option<ChildStderr>) -> Self {
        let handle = stderr.map(|pipe| {
            std::thread::spawn(move || {
                let mut captured = Vec::new();
                let mut pipe = pipe;
                let _ = (&mut pipe).take(MAX_STDERR_BYTES).read_to_end(&mut captured);
                // Keep draining past the limit so the child never stalls
                let _ = std::io::copy(&mut pipe, &mut std::io::sink());
                String::from_utf8_lossy(&captured).trim().to_string()
            })
        });
        Self { handle }
    }

    /// Wait for the child to close stderr and return what it wrote
    ///
    /// Call only after the child has exited or been killed.
    pub fn collect(mut self) -> String {
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}
