//! Subtitle conversion (§4.12). Text formats (srt/vtt/ass) are parsed into a small in-memory cue
//! list and re-serialized with cue-time windowing applied; image-based formats (PGS, VobSub)
//! have no practical in-process path and are extracted via an FFmpeg subprocess, using the same
//! `tokio::process::Command` spawn style as `services/ffmpeg.rs` and `media/transcoder.rs`.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Ass,
    Pgs,
    VobSub,
}

impl SubtitleFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            SubtitleFormat::Vtt => "text/vtt",
            SubtitleFormat::Srt => "application/x-subrip",
            SubtitleFormat::Ass => "text/x-ssa",
            SubtitleFormat::Pgs | SubtitleFormat::VobSub => "application/octet-stream",
        }
    }

    fn is_text(self) -> bool {
        matches!(self, SubtitleFormat::Srt | SubtitleFormat::Vtt | SubtitleFormat::Ass)
    }
}

#[derive(Debug, Clone)]
struct Cue {
    start_ms: i64,
    end_ms: i64,
    text: String,
}

pub struct SubtitleConverter {
    ffmpeg_path: String,
}

impl SubtitleConverter {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }

    /// Converts `input` from `input_fmt` to `output_fmt`. `start_ticks`/`end_ticks` are millisecond
    /// bounds; cues entirely outside the window are dropped and partially-overlapping cues are
    /// clamped, mirroring how a client requests just the portion of a track it's about to play.
    pub async fn convert(
        &self,
        input: &[u8],
        input_fmt: SubtitleFormat,
        output_fmt: SubtitleFormat,
        start_ticks: Option<i64>,
        end_ticks: Option<i64>,
        stream_index: Option<usize>,
    ) -> Result<Vec<u8>> {
        if !input_fmt.is_text() {
            return self.extract_via_ffmpeg(input, output_fmt, stream_index).await;
        }

        let text = String::from_utf8_lossy(input);
        let mut cues = match input_fmt {
            SubtitleFormat::Srt => parse_srt(&text),
            SubtitleFormat::Vtt => parse_vtt(&text),
            SubtitleFormat::Ass => parse_ass(&text),
            _ => unreachable!("image formats handled above"),
        };

        if let Some(start) = start_ticks {
            cues.retain(|c| c.end_ms > start);
            for cue in &mut cues {
                cue.start_ms = cue.start_ms.max(start);
            }
        }
        if let Some(end) = end_ticks {
            cues.retain(|c| c.start_ms < end);
            for cue in &mut cues {
                cue.end_ms = cue.end_ms.min(end);
            }
        }

        let rendered = match output_fmt {
            SubtitleFormat::Vtt => render_vtt(&cues),
            SubtitleFormat::Srt => render_srt(&cues),
            SubtitleFormat::Ass => render_ass(&cues),
            _ => bail!("cannot render text cues as an image subtitle format"),
        };
        Ok(rendered.into_bytes())
    }

    /// PGS/VobSub have no practical in-process decode path; spawn FFmpeg to burn the named
    /// subtitle stream into `output_fmt` and capture stdout.
    async fn extract_via_ffmpeg(
        &self,
        input: &[u8],
        output_fmt: SubtitleFormat,
        stream_index: Option<usize>,
    ) -> Result<Vec<u8>> {
        let index = stream_index.unwrap_or(0);
        let output_format_flag = match output_fmt {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "webvtt",
            SubtitleFormat::Ass => "ass",
            _ => bail!("cannot extract an image subtitle into another image format"),
        };

        let mut child = Command::new(&self.ffmpeg_path)
            .args(["-i", "pipe:0"])
            .args(["-map", &format!("0:s:{index}")])
            .args(["-f", output_format_flag])
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg for subtitle extraction")?;

        {
            use tokio::io::AsyncWriteExt;
            let mut stdin = child.stdin.take().context("ffmpeg stdin unavailable")?;
            stdin.write_all(input).await?;
        }

        let mut stdout = child.stdout.take().context("ffmpeg stdout unavailable")?;
        let mut output = Vec::new();
        stdout.read_to_end(&mut output).await?;

        let status = child.wait().await?;
        if !status.success() {
            bail!("ffmpeg subtitle extraction exited with {status}");
        }
        Ok(output)
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim().replace(',', ".");
    let (hms, ms) = raw.split_once('.')?;
    let mut parts = hms.split(':');
    let h: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    let s: i64 = parts.next()?.parse().ok()?;
    let ms: i64 = ms.parse().ok()?;
    Some(((h * 60 + m) * 60 + s) * 1000 + ms)
}

fn format_timestamp(ms: i64, decimal_sep: char) -> String {
    let ms = ms.max(0);
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1000;
    let frac = ms % 1000;
    format!("{h:02}:{m:02}:{s:02}{decimal_sep}{frac:03}")
}

fn parse_srt(text: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    for block in text.split("\r\n\r\n").flat_map(|b| b.split("\n\n")) {
        let mut lines = block.lines();
        let Some(first) = lines.next() else { continue };
        let timing_line = if first.contains("-->") { first } else { lines.next().unwrap_or("") };
        let Some((start_raw, end_raw)) = timing_line.split_once("-->") else { continue };
        let (Some(start_ms), Some(end_ms)) = (parse_timestamp(start_raw), parse_timestamp(end_raw)) else { continue };
        let text = lines.collect::<Vec<_>>().join("\n");
        cues.push(Cue { start_ms, end_ms, text });
    }
    cues
}

fn parse_vtt(text: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    for block in text.split("\n\n") {
        for line in block.lines() {
            if let Some((start_raw, rest)) = line.split_once("-->") {
                let end_raw = rest.split_whitespace().next().unwrap_or("");
                if let (Some(start_ms), Some(end_ms)) = (parse_timestamp(start_raw), parse_timestamp(end_raw)) {
                    let body_start = block.find(line).map(|i| i + line.len()).unwrap_or(block.len());
                    let text = block[body_start..].trim_start_matches('\n').to_string();
                    cues.push(Cue { start_ms, end_ms, text });
                }
                break;
            }
        }
    }
    cues
}

/// Best-effort ASS reader: only `Dialogue:` lines are turned into cues, and inline override tags
/// (`{\...}`) are stripped — full ASS styling has no equivalent in the other text formats.
fn parse_ass(text: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    for line in text.lines() {
        let Some(rest) = line.strip_prefix("Dialogue:") else { continue };
        let fields: Vec<&str> = rest.splitn(10, ',').collect();
        if fields.len() < 10 {
            continue;
        }
        let (Some(start_ms), Some(end_ms)) = (parse_ass_timestamp(fields[1]), parse_ass_timestamp(fields[2])) else { continue };
        let raw_text = fields[9].trim();
        let text = strip_ass_tags(raw_text);
        cues.push(Cue { start_ms, end_ms, text });
    }
    cues
}

fn parse_ass_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let mut parts = raw.split(':');
    let h: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    let (s, cs) = parts.next()?.split_once('.')?;
    let s: i64 = s.parse().ok()?;
    let cs: i64 = cs.parse().ok()?;
    Some(((h * 60 + m) * 60 + s) * 1000 + cs * 10)
}

fn strip_ass_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0;
    for ch in text.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '\\' if depth == 0 && out.ends_with('\\') => {}
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.replace("\\N", "\n").replace("\\n", "\n")
}

fn render_vtt(cues: &[Cue]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for cue in cues {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_timestamp(cue.start_ms, '.'),
            format_timestamp(cue.end_ms, '.'),
            cue.text
        ));
    }
    out
}

fn render_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(cue.start_ms, ','),
            format_timestamp(cue.end_ms, ','),
            cue.text
        ));
    }
    out
}

fn render_ass(cues: &[Cue]) -> String {
    let mut out = String::from(
        "[Script Info]\nScriptType: v4.00+\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
    );
    for cue in cues {
        out.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            format_ass_timestamp(cue.start_ms),
            format_ass_timestamp(cue.end_ms),
            cue.text.replace('\n', "\\N")
        ));
    }
    out
}

fn format_ass_timestamp(ms: i64) -> String {
    let ms = ms.max(0);
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1000;
    let cs = (ms % 1000) / 10;
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn srt_to_vtt_round_trips_cue_text_and_timing() {
        let srt = "1\n00:00:01,000 --> 00:00:03,500\nHello there\n\n2\n00:00:05,000 --> 00:00:06,000\nSecond cue\n";
        let converter = SubtitleConverter::new("ffmpeg".into());
        let vtt = converter
            .convert(srt.as_bytes(), SubtitleFormat::Srt, SubtitleFormat::Vtt, None, None, None)
            .await
            .unwrap();
        let vtt = String::from_utf8(vtt).unwrap();
        assert!(vtt.starts_with("WEBVTT"));
        assert!(vtt.contains("00:00:01.000 --> 00:00:03.500"));
        assert!(vtt.contains("Hello there"));
        assert!(vtt.contains("Second cue"));
    }

    #[tokio::test]
    async fn window_drops_cues_entirely_outside_range_and_clamps_overlap() {
        let srt = "1\n00:00:01,000 --> 00:00:03,000\nEarly\n\n2\n00:00:04,000 --> 00:00:08,000\nOverlaps window\n\n3\n00:00:20,000 --> 00:00:21,000\nFar later\n";
        let converter = SubtitleConverter::new("ffmpeg".into());
        let vtt = converter
            .convert(srt.as_bytes(), SubtitleFormat::Srt, SubtitleFormat::Vtt, Some(2000), Some(6000), None)
            .await
            .unwrap();
        let vtt = String::from_utf8(vtt).unwrap();
        assert!(!vtt.contains("Early") || vtt.contains("00:00:02.000"));
        assert!(vtt.contains("Overlaps window"));
        assert!(!vtt.contains("Far later"));
    }

    #[test]
    fn mime_types_match_spec() {
        assert_eq!(SubtitleFormat::Vtt.mime_type(), "text/vtt");
        assert_eq!(SubtitleFormat::Srt.mime_type(), "application/x-subrip");
        assert_eq!(SubtitleFormat::Ass.mime_type(), "text/x-ssa");
    }
}
