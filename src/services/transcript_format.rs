//! Renders a speech result as a transcript file body.

use std::fmt::Write;

use crate::entities::TranscriptFormat;
use crate::services::deepgram::{SpeechResult, Utterance};

pub fn render(result: &SpeechResult, format: TranscriptFormat) -> String {
    match format {
        TranscriptFormat::Txt => {
            let mut text = result.transcript.trim().to_string();
            text.push('\n');
            text
        }
        TranscriptFormat::Srt => render_cues(&cues(result), CueStyle::Srt),
        TranscriptFormat::Vtt => render_cues(&cues(result), CueStyle::Vtt),
    }
}

/// Utterances if the provider returned any, else one cue spanning the audio.
fn cues(result: &SpeechResult) -> Vec<Utterance> {
    let utterances: Vec<Utterance> = result
        .utterances
        .iter()
        .filter(|u| !u.transcript.trim().is_empty())
        .cloned()
        .collect();

    if !utterances.is_empty() || result.transcript.trim().is_empty() {
        return utterances;
    }

    vec![Utterance {
        start: 0.0,
        end: result.duration().unwrap_or(0.0),
        transcript: result.transcript.trim().to_string(),
    }]
}

#[derive(Clone, Copy)]
enum CueStyle {
    Srt,
    Vtt,
}

fn render_cues(cues: &[Utterance], style: CueStyle) -> String {
    let mut out = String::new();
    if let CueStyle::Vtt = style {
        out.push_str("WEBVTT\n\n");
    }

    for (i, cue) in cues.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            timestamp(cue.start, style),
            timestamp(cue.end.max(cue.start), style)
        );
        let _ = writeln!(out, "{}\n", cue.transcript.trim());
    }
    out
}

fn timestamp(seconds: f64, style: CueStyle) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    let sep = match style {
        CueStyle::Srt => ',',
        CueStyle::Vtt => '.',
    };
    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, sep, ms)
}
