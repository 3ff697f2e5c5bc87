use once_cell::sync::Lazy;
use regex::Regex;

use crate::decoder::{Frame, Phase};

static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid emphasis pattern"));

pub const THINKING_MARKUP: &str = "<p class=\"thinking-text\">Thinking<span class=\"dot-1\">.</span><span class=\"dot-2\">.</span><span class=\"dot-3\">.</span></p>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Emphasis(String),
    LineBreak,
}

/// What the bot message region shows for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub thinking: bool,
    pub body: Vec<Segment>,
    pub badges: Vec<String>,
}

impl Presentation {
    pub fn thinking() -> Self {
        Presentation {
            thinking: true,
            body: Vec::new(),
            badges: Vec::new(),
        }
    }

    pub fn markup(&self) -> String {
        let mut out = if self.thinking {
            THINKING_MARKUP.to_string()
        } else {
            segments_to_markup(&self.body)
        };
        out.push_str(&badges_markup(&self.badges));
        out
    }
}

/// Maps a decoder frame to what should be displayed.
pub fn project(frame: &Frame) -> Presentation {
    let no_body = frame.phase == Phase::HeaderComplete && frame.body.is_empty();
    if frame.phase == Phase::Pending || frame.awaiting_body() || no_body {
        return Presentation {
            thinking: true,
            body: Vec::new(),
            badges: frame.sources.clone(),
        };
    }

    Presentation {
        thinking: false,
        body: format_text(&frame.body),
        badges: frame.sources.clone(),
    }
}

/// Splits text into plain runs, `**emphasis**` runs and line breaks.
///
/// Pairs are consumed left to right and never nest; an emphasis run does
/// not cross a newline.
pub fn format_text(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in EMPHASIS.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_plain(&mut segments, &text[last..whole.start()]);
        segments.push(Segment::Emphasis(inner.as_str().to_string()));
        last = whole.end();
    }
    push_plain(&mut segments, &text[last..]);
    segments
}

fn push_plain(segments: &mut Vec<Segment>, text: &str) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            segments.push(Segment::LineBreak);
        }
        if !line.is_empty() {
            segments.push(Segment::Text(line.to_string()));
        }
    }
}

pub fn segments_to_markup(segments: &[Segment]) -> String {
    let mut out = String::from("<p>");
    for segment in segments {
        match segment {
            Segment::Text(s) => out.push_str(s),
            Segment::Emphasis(s) => {
                out.push_str("<em>");
                out.push_str(s);
                out.push_str("</em>");
            }
            Segment::LineBreak => out.push_str("<br>"),
        }
    }
    out.push_str("</p>");
    out
}

fn badges_markup(badges: &[String]) -> String {
    if badges.is_empty() {
        return String::new();
    }
    let spans: String = badges
        .iter()
        .map(|b| format!("<span class=\"source-badge\">{}</span>", b))
        .collect();
    format!("<div class=\"source-badges\">{}</div>", spans)
}
