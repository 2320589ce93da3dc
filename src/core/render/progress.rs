//! ffmpeg stderr 进度解析

use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2}\.\d{2})").ok());

static TIME_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"time=(\d{2}):(\d{2}):(\d{2}\.\d{2})").ok());

/// Percent shown while ffmpeg is still running.
pub const RUNNING_CAP: f64 = 99.9;

fn capture_seconds(re: &Option<Regex>, text: &str) -> Option<f64> {
    let caps = re.as_ref()?.captures_iter(text).last()?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Tracks one ffmpeg run. Duration is latched from the first banner seen.
#[derive(Debug, Default)]
pub struct RenderProgress {
    duration: Option<f64>,
    pending: Vec<u8>,
}

impl RenderProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn feed(&mut self, chunk: &str) -> Option<f64> {
        self.feed_bytes(chunk.as_bytes())
    }

    /// Feed raw stderr bytes; returns the latest percent if one was found.
    ///
    /// ffmpeg rewrites its status line with `\r`, so both `\r` and `\n`
    /// terminate a line. Bytes after the last terminator wait for the next
    /// read, which keeps multi-byte characters split across reads intact.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Option<f64> {
        let text = self.complete_lines(chunk)?;
        self.scan(&text)
    }

    fn complete_lines(&mut self, chunk: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(chunk);
        let cut = self.pending.iter().rposition(|b| *b == b'\r' || *b == b'\n')?;
        let complete: Vec<u8> = self.pending.drain(..=cut).collect();
        Some(String::from_utf8_lossy(&complete).into_owned())
    }

    fn scan(&mut self, text: &str) -> Option<f64> {
        if self.duration.is_none() {
            self.duration = capture_seconds(&DURATION_RE, text).filter(|d| *d > 0.0);
        }
        let duration = self.duration?;
        let current = capture_seconds(&TIME_RE, text)?;
        Some((current / duration * 100.0).min(RUNNING_CAP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = "Input #0, mov,mp4 from 'a.mp4':\n  Duration: 00:01:40.00, start: 0.000000, bitrate: 8000 kb/s\n";

    #[test]
    fn test_no_percent_before_duration() {
        let mut p = RenderProgress::new();
        assert_eq!(p.feed("frame=  10 time=00:00:01.00 bitrate=1\r"), None);
    }

    #[test]
    fn test_percent_from_time() {
        let mut p = RenderProgress::new();
        p.feed(BANNER);
        assert_eq!(p.duration(), Some(100.0));

        let pct = p.feed("frame= 300 fps=60 time=00:00:25.00 bitrate=1\r").unwrap();
        assert!((pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_percent_capped_while_running() {
        let mut p = RenderProgress::new();
        p.feed(BANNER);
        let pct = p.feed("time=00:01:45.00\r").unwrap();
        assert_eq!(pct, RUNNING_CAP);
    }

    #[test]
    fn test_split_chunks_are_joined() {
        let mut p = RenderProgress::new();
        p.feed(BANNER);
        assert_eq!(p.feed("frame= 1 time=00:00:"), None);
        let pct = p.feed("50.00 bitrate=1\r").unwrap();
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_multibyte_text_split_across_reads() {
        let mut p = RenderProgress::new();
        let line = "Input #0, mov,mp4 from '视频.mp4':\n".as_bytes();
        // cut in the middle of the first CJK character
        let at = line.iter().position(|b| *b >= 0x80).unwrap() + 1;

        assert_eq!(p.complete_lines(&line[..at]), None);
        let text = p.complete_lines(&line[at..]).unwrap();
        assert_eq!(text, "Input #0, mov,mp4 from '视频.mp4':\n");
        assert!(!text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_bytes_feed_reports_percent() {
        let mut p = RenderProgress::new();
        p.feed_bytes(BANNER.as_bytes());
        let status = "frame= 9 time=00:00:10.00 bitrate=1\r".as_bytes();
        assert_eq!(p.feed_bytes(&status[..7]), None);
        let pct = p.feed_bytes(&status[7..]).unwrap();
        assert!((pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_hours_are_counted() {
        let mut p = RenderProgress::new();
        p.feed("  Duration: 02:00:00.00, start: 0\n");
        let pct = p.feed("time=01:00:00.00\n").unwrap();
        assert!((pct - 50.0).abs() < 1e-9);
    }
}
