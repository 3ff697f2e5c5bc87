/// Literal prefix that marks a citation header at the very start of a stream.
pub const HEADER_PREFIX: &str = "Sources: ";
/// Blank line that ends the citation header.
pub const HEADER_SEPARATOR: &str = "\n\n";
/// Delimiter between citation labels inside the header.
pub const SOURCE_DELIMITER: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    HeaderComplete,
}

/// Classified view of everything received so far for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub phase: Phase,
    pub sources: Vec<String>,
    pub body: String,
}

impl Frame {
    fn pending() -> Self {
        Frame {
            phase: Phase::Pending,
            sources: Vec::new(),
            body: String::new(),
        }
    }

    fn plain(text: &str) -> Self {
        Frame {
            phase: Phase::HeaderComplete,
            sources: Vec::new(),
            body: text.to_string(),
        }
    }

    /// Header parsed with citations, but no answer bytes yet.
    pub fn awaiting_body(&self) -> bool {
        self.phase == Phase::HeaderComplete && self.body.is_empty() && !self.sources.is_empty()
    }
}

fn split_sources(header: &str) -> Vec<String> {
    header.split(SOURCE_DELIMITER).map(str::to_string).collect()
}

/// Parses a complete accumulated buffer from scratch.
///
/// A buffer that is still a strict prefix of `"Sources: "` is undecided and
/// classified as `Pending`: it may yet turn into a header, and deciding early
/// would let the phase regress once the rest of the prefix arrives.
pub fn parse(buffer: &str) -> Frame {
    if !buffer.starts_with(HEADER_PREFIX) {
        // Could still become a header; stay Pending so the phase cannot
        // fall back from HeaderComplete once the prefix completes.
        if HEADER_PREFIX.starts_with(buffer) {
            return Frame::pending();
        }
        return Frame::plain(buffer);
    }

    let rest = &buffer[HEADER_PREFIX.len()..];
    match rest.find(HEADER_SEPARATOR) {
        Some(idx) => Frame {
            phase: Phase::HeaderComplete,
            sources: split_sources(&rest[..idx]),
            body: rest[idx + HEADER_SEPARATOR.len()..].to_string(),
        },
        None => Frame::pending(),
    }
}

/// Parses a buffer whose stream has terminated.
///
/// An unfinished header degrades to rendering the whole buffer as body.
pub fn parse_final(buffer: &str) -> Frame {
    let frame = parse(buffer);
    match frame.phase {
        Phase::HeaderComplete => frame,
        Phase::Pending => Frame::plain(buffer),
    }
}

#[derive(Debug, Clone)]
enum Mode {
    /// Not enough bytes yet to tell whether a header is present.
    Undecided,
    /// No header; the whole buffer is body.
    Plain,
    /// Header prefix seen; separator search resumes at `scan_from`.
    Header { scan_from: usize },
    /// Header complete; the body starts at `body_start`.
    Split { sources: Vec<String>, body_start: usize },
}

/// Incremental decoder for one exchange.
///
/// Produces the same frames as [`parse`] over the accumulated buffer, but
/// locates the header separator at most once, resuming the search where the
/// previous fragment left off.
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    buffer: String,
    mode: Mode,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        StreamDecoder {
            buffer: String::new(),
            mode: Mode::Undecided,
        }
    }

    #[allow(dead_code)]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Appends one fragment and returns the frame for the whole buffer.
    pub fn push(&mut self, fragment: &str) -> Frame {
        self.buffer.push_str(fragment);
        self.advance();
        self.frame()
    }

    /// Final pass once the transport signalled completion.
    pub fn finish(&mut self) -> Frame {
        match self.mode {
            Mode::Undecided | Mode::Header { .. } => {
                self.mode = Mode::Plain;
                parse_final(&self.buffer)
            }
            _ => self.frame(),
        }
    }

    pub fn frame(&self) -> Frame {
        match &self.mode {
            Mode::Undecided | Mode::Header { .. } => Frame::pending(),
            Mode::Plain => Frame::plain(&self.buffer),
            Mode::Split { sources, body_start } => Frame {
                phase: Phase::HeaderComplete,
                sources: sources.clone(),
                body: self.buffer[*body_start..].to_string(),
            },
        }
    }

    fn advance(&mut self) {
        if let Mode::Undecided = self.mode {
            if self.buffer.starts_with(HEADER_PREFIX) {
                self.mode = Mode::Header {
                    scan_from: HEADER_PREFIX.len(),
                };
            } else if !HEADER_PREFIX.starts_with(self.buffer.as_str()) {
                // Only leave Undecided once the buffer diverges from the
                // prefix, so a decided phase is never revisited.
                self.mode = Mode::Plain;
            }
        }

        if let Mode::Header { scan_from } = self.mode {
            match self.buffer[scan_from..].find(HEADER_SEPARATOR) {
                Some(offset) => {
                    let idx = scan_from + offset;
                    let sources = split_sources(&self.buffer[HEADER_PREFIX.len()..idx]);
                    self.mode = Mode::Split {
                        sources,
                        body_start: idx + HEADER_SEPARATOR.len(),
                    };
                }
                None => {
                    // A trailing newline may be the first half of the separator.
                    let len = self.buffer.len();
                    let resume = if self.buffer.ends_with('\n') { len - 1 } else { len };
                    self.mode = Mode::Header {
                        scan_from: resume.max(HEADER_PREFIX.len()),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Sources: doc1.pdf, doc2.pdf\n\nThe answer is **42**.";

    fn feed(fragments: &[&str]) -> (Vec<Frame>, Frame) {
        let mut decoder = StreamDecoder::new();
        let frames = fragments.iter().map(|f| decoder.push(f)).collect();
        let last = decoder.finish();
        (frames, last)
    }

    #[test]
    fn test_plain_text_passes_through_immediately() {
        let mut decoder = StreamDecoder::new();
        let frame = decoder.push("The answer is 42.");
        assert_eq!(
            frame,
            Frame {
                phase: Phase::HeaderComplete,
                sources: vec![],
                body: "The answer is 42.".to_string(),
            }
        );
        assert_eq!(parse("The answer is 42."), frame);
    }

    #[test]
    fn test_header_split() {
        let frame = parse(FULL);
        assert_eq!(frame.phase, Phase::HeaderComplete);
        assert_eq!(frame.sources, vec!["doc1.pdf", "doc2.pdf"]);
        assert_eq!(frame.body, "The answer is **42**.");
    }

    #[test]
    fn test_header_without_separator_is_pending() {
        let frame = parse("Sources: doc1.pdf, doc2");
        assert_eq!(frame.phase, Phase::Pending);
        assert!(frame.sources.is_empty());
        assert!(frame.body.is_empty());

        // A single newline is not the separator.
        assert_eq!(parse("Sources: doc1.pdf\n").phase, Phase::Pending);
    }

    #[test]
    fn test_partial_prefix_is_undecided() {
        assert_eq!(parse("").phase, Phase::Pending);
        assert_eq!(parse("Sour").phase, Phase::Pending);
        assert_eq!(parse("Sources:").phase, Phase::Pending);
        assert_eq!(parse("Sourced").phase, Phase::HeaderComplete);
        assert_eq!(parse_final("Sour").body, "Sour");
    }

    #[test]
    fn test_finish_matches_parse_final() {
        for buffer in ["", "Sour", "Sources: a.pdf", "Sources: a.pdf\n\nok", "plain"] {
            let mut decoder = StreamDecoder::new();
            decoder.push(buffer);
            assert_eq!(decoder.finish(), parse_final(buffer), "buffer {:?}", buffer);
        }
    }

    #[test]
    fn test_awaiting_body_after_header() {
        let frame = parse("Sources: doc1.pdf, doc2.pdf\n\n");
        assert_eq!(frame.phase, Phase::HeaderComplete);
        assert_eq!(frame.sources.len(), 2);
        assert!(frame.body.is_empty());
        assert!(frame.awaiting_body());
    }

    #[test]
    fn test_duplicates_and_order_preserved() {
        let frame = parse("Sources: b.txt, a.txt, b.txt\n\nok");
        assert_eq!(frame.sources, vec!["b.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_body_is_never_reparsed_for_header() {
        let frame = parse("Sources: a.pdf\n\nbody\n\nSources: b.pdf\n\nmore");
        assert_eq!(frame.sources, vec!["a.pdf"]);
        assert_eq!(frame.body, "body\n\nSources: b.pdf\n\nmore");
    }

    #[test]
    fn test_truncated_stream_falls_back_to_body() {
        let (frames, last) = feed(&["Sources: doc1.pdf"]);
        assert_eq!(frames[0].phase, Phase::Pending);
        assert_eq!(last.phase, Phase::HeaderComplete);
        assert!(last.sources.is_empty());
        assert_eq!(last.body, "Sources: doc1.pdf");
        assert_eq!(parse_final("Sources: doc1.pdf"), last);
    }

    #[test]
    fn test_split_inside_separator() {
        let whole = feed(&[FULL]).1;
        let cut = FULL.find("\n\n").unwrap() + 1;
        let (frames, last) = feed(&[&FULL[..cut], &FULL[cut..]]);
        assert_eq!(frames[0].phase, Phase::Pending);
        assert_eq!(last, whole);
    }

    #[test]
    fn test_every_split_point_matches_single_fragment() {
        let whole = parse(FULL);
        for cut in 0..=FULL.len() {
            if !FULL.is_char_boundary(cut) {
                continue;
            }
            let (_, last) = feed(&[&FULL[..cut], &FULL[cut..]]);
            assert_eq!(last, whole, "split at {}", cut);
        }
    }

    #[test]
    fn test_incremental_matches_full_parse() {
        let text = "Sources: ü.pdf, 日本.txt\n\nÄnswer with **bold**\nand more.";
        let mut decoder = StreamDecoder::new();
        let mut seen = String::new();
        for ch in text.chars() {
            let mut buf = [0u8; 4];
            let piece = ch.encode_utf8(&mut buf);
            seen.push_str(piece);
            assert_eq!(decoder.push(piece), parse(&seen));
        }
        assert_eq!(decoder.buffer(), text);
    }

    #[test]
    fn test_sources_monotonic_over_prefixes() {
        let mut decoder = StreamDecoder::new();
        let mut established: Option<Vec<String>> = None;
        for ch in FULL.chars() {
            let frame = decoder.push(&ch.to_string());
            if let Some(ref sources) = established {
                assert_eq!(&frame.sources, sources);
            } else if !frame.sources.is_empty() {
                established = Some(frame.sources.clone());
            }
        }
        assert_eq!(established, Some(vec!["doc1.pdf".to_string(), "doc2.pdf".to_string()]));
    }

    #[test]
    fn test_phase_never_regresses() {
        let mut decoder = StreamDecoder::new();
        let mut complete = false;
        for ch in "Sources: x\n\ny".chars() {
            let frame = decoder.push(&ch.to_string());
            if complete {
                assert_eq!(frame.phase, Phase::HeaderComplete);
            }
            complete = frame.phase == Phase::HeaderComplete;
        }
        assert!(complete);
    }

    #[test]
    fn test_reparse_is_idempotent() {
        for s in ["", "Sour", "Sources: a", "Sources: a\n\n", FULL, "plain\n\ntext"] {
            assert_eq!(parse(s), parse(s));
        }
        let mut decoder = StreamDecoder::new();
        decoder.push(FULL);
        assert_eq!(decoder.frame(), decoder.frame());
    }

    #[test]
    fn test_empty_header_yields_single_empty_label() {
        let frame = parse("Sources: \n\nanswer");
        assert_eq!(frame.sources, vec![String::new()]);
        assert_eq!(frame.body, "answer");
    }

    #[test]
    fn test_delimiter_inside_label_splits() {
        // Labels are not escaped; a ", " inside a filename splits it.
        let frame = parse("Sources: a, b.pdf\n\nx");
        assert_eq!(frame.sources, vec!["a", "b.pdf"]);
    }
}
