//! Progress bars that stay pinned below log output.
//!
//! Log lines are routed through the shared `MultiProgress` so a running bulk
//! upsert does not get its bar torn by tracing output.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Bar counting records written by a bulk upsert
pub fn upsert_progress_bar(total: u64) -> ProgressBar {
    let bar = multi_progress().add(ProgressBar::new(total));
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} records ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn print_line(line: &str) {
    let _ = multi_progress().println(line.trim_end_matches('\r'));
}

/// `MakeWriter` that sends each formatted log line above the progress bars
#[derive(Default, Clone)]
pub struct LogWriterFactory;

pub struct LogWriter {
    pending: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.pending.find('\n') {
            print_line(&self.pending[..idx]);
            self.pending.drain(..=idx);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            print_line(&self.pending);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            pending: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_buffers_partial_lines() {
        let mut writer = LogWriterFactory.make_writer();
        writer.write_all(b"first line\nsecond ").unwrap();
        assert_eq!(writer.pending, "second ");
        writer.write_all(b"half\n").unwrap();
        assert!(writer.pending.is_empty());
        writer.write_all(b"tail").unwrap();
        writer.flush().unwrap();
        assert!(writer.pending.is_empty());
    }

    #[test]
    fn test_upsert_bar_tracks_length() {
        let bar = upsert_progress_bar(42);
        assert_eq!(bar.length(), Some(42));
        bar.finish_and_clear();
    }
}
