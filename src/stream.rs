//! Line-oriented stream processing
//!
//! Reads newline-delimited JSON records, enriches each one and writes it back
//! out as a single line, in input order. What happens to a line that cannot be
//! processed is decided by the [`ErrorPolicy`].

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::enricher::{EnrichOutcome, Enricher};
use crate::error::EnrichError;

/// Handling of lines that fail to parse or enrich
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop at the first bad line
    #[default]
    Fail,
    /// Log the failure and drop the line
    Skip,
    /// Log the failure and copy the line to the output unchanged
    Passthrough,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::Fail => "fail",
            ErrorPolicy::Skip => "skip",
            ErrorPolicy::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(ErrorPolicy::Fail),
            "skip" => Ok(ErrorPolicy::Skip),
            "passthrough" => Ok(ErrorPolicy::Passthrough),
            other => Err(format!(
                "unknown error policy '{}' (expected fail, skip or passthrough)",
                other
            )),
        }
    }
}

/// Counters for one processed stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Input lines read
    pub lines_read: usize,
    pub enriched: usize,
    /// Records written without derived metrics (no impedance)
    pub passed_through: usize,
    /// Bad lines dropped under [`ErrorPolicy::Skip`]
    pub skipped: usize,
    /// Bad lines copied verbatim under [`ErrorPolicy::Passthrough`]
    pub echoed: usize,
}

impl StreamStats {
    /// Lines written to the output
    pub fn lines_written(&self) -> usize {
        self.enriched + self.passed_through + self.echoed
    }
}

/// Reads, enriches and writes NDJSON records one line at a time
pub struct StreamEnricher {
    enricher: Enricher,
    policy: ErrorPolicy,
    flush: bool,
}

impl StreamEnricher {
    pub fn new(enricher: Enricher) -> Self {
        Self {
            enricher,
            policy: ErrorPolicy::default(),
            flush: true,
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Flush the writer after every record (on by default, for live pipes)
    pub fn with_flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    /// Process `reader` to end of input, writing one line per record to `writer`.
    ///
    /// Every input line, blank or not, is one record. Reader and writer failures
    /// always abort. Record failures, including lines that are not valid UTF-8,
    /// follow the configured policy; under [`ErrorPolicy::Fail`] the returned
    /// error carries the 1-based line number.
    pub fn process<R: BufRead, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> Result<StreamStats, EnrichError> {
        let mut stats = StreamStats::default();
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;
            stats.lines_read += 1;

            let line = strip_line_ending(&buf);

            match self.enricher.enrich_bytes(line) {
                Ok((output, outcome)) => {
                    writeln!(writer, "{}", output)?;
                    match outcome {
                        EnrichOutcome::Enriched => stats.enriched += 1,
                        EnrichOutcome::PassedThrough => stats.passed_through += 1,
                    }
                    debug!("line {}: {:?}", line_no, outcome);
                }
                Err(e) => match self.policy {
                    ErrorPolicy::Fail => return Err(e.at_line(line_no)),
                    ErrorPolicy::Skip => {
                        warn!("line {}: skipped: {}", line_no, e);
                        stats.skipped += 1;
                        continue;
                    }
                    ErrorPolicy::Passthrough => {
                        warn!("line {}: copied unchanged: {}", line_no, e);
                        writer.write_all(line)?;
                        writer.write_all(b"\n")?;
                        stats.echoed += 1;
                    }
                },
            }

            if self.flush {
                writer.flush()?;
            }
        }

        writer.flush()?;

        info!(
            "processed {} records: {} enriched, {} passed through, {} skipped, {} copied unchanged",
            stats.lines_read, stats.enriched, stats.passed_through, stats.skipped, stats.echoed
        );

        Ok(stats)
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Sex, SubjectProfile};
    use crate::record::ScaleRecord;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn run(stream: &StreamEnricher, input: &str) -> (Result<StreamStats, EnrichError>, String) {
        let mut output = Vec::new();
        let result = stream.process(Cursor::new(input), &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_stream_preserves_order_and_count() {
        let input = concat!(
            r#"{"seq":1,"weight":80,"impedance":500}"#,
            "\n",
            r#"{"seq":2,"weight":81.5,"impedance":null}"#,
            "\n",
            r#"{"seq":3,"weight":55.5,"impedance":420}"#,
            "\n",
            r#"{"seq":4,"weight":79.9}"#,
            "\n",
        );
        let stream = StreamEnricher::new(Enricher::default());
        let (result, output) = run(&stream, input);
        let stats = result.unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(stats.lines_read, 4);
        assert_eq!(stats.enriched, 2);
        assert_eq!(stats.passed_through, 2);
        assert_eq!(stats.lines_written(), 4);

        for (i, line) in lines.iter().enumerate() {
            let record = ScaleRecord::parse(line).unwrap();
            assert_eq!(record.get("seq").and_then(|v| v.as_u64()), Some(i as u64 + 1));
        }

        assert_eq!(lines[1], r#"{"seq":2,"weight":81.5,"impedance":null}"#);
        assert_eq!(lines[3], r#"{"seq":4,"weight":79.9}"#);
        assert!(lines[0].starts_with(r#"{"seq":1,"weight":80,"impedance":500,"bmi":"#));
    }

    fn run_bytes(
        stream: &StreamEnricher,
        input: &[u8],
    ) -> (Result<StreamStats, EnrichError>, Vec<u8>) {
        let mut output = Vec::new();
        let result = stream.process(Cursor::new(input), &mut output);
        (result, output)
    }

    const WITH_BLANK_LINE: &str =
        "{\"weight\":80,\"impedance\":null}\n\n{\"weight\":70,\"impedance\":null}\n";

    #[test]
    fn test_blank_line_fails_by_default() {
        let stream = StreamEnricher::new(Enricher::default());
        let (result, output) = run(&stream, WITH_BLANK_LINE);

        let err = result.unwrap_err();
        assert!(matches!(err, EnrichError::Line { line: 2, .. }));
        assert!(matches!(err.root(), EnrichError::Json(_)));
        assert_eq!(output, "{\"weight\":80,\"impedance\":null}\n");
    }

    #[test]
    fn test_blank_line_skipped() {
        let stream = StreamEnricher::new(Enricher::default()).with_policy(ErrorPolicy::Skip);
        let (result, output) = run(&stream, WITH_BLANK_LINE);
        let stats = result.unwrap();

        assert_eq!(stats.lines_read, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(
            output,
            "{\"weight\":80,\"impedance\":null}\n{\"weight\":70,\"impedance\":null}\n"
        );
    }

    #[test]
    fn test_blank_line_copied_under_passthrough() {
        let stream =
            StreamEnricher::new(Enricher::default()).with_policy(ErrorPolicy::Passthrough);
        let (result, output) = run(&stream, WITH_BLANK_LINE);
        let stats = result.unwrap();

        assert_eq!(stats.lines_read, 3);
        assert_eq!(stats.echoed, 1);
        assert_eq!(stats.lines_written(), 3);
        assert_eq!(output, WITH_BLANK_LINE);
    }

    const WITH_INVALID_UTF8: &[u8] =
        b"{\"weight\":80,\"impedance\":null}\n{\"source\":\"\xff\xfe\"}\n{\"weight\":70,\"impedance\":null}\n";

    #[test]
    fn test_invalid_utf8_line_fails_as_record_error() {
        let stream = StreamEnricher::new(Enricher::default());
        let (result, _) = run_bytes(&stream, WITH_INVALID_UTF8);

        let err = result.unwrap_err();
        assert!(matches!(err, EnrichError::Line { line: 2, .. }));
        assert!(matches!(err.root(), EnrichError::Json(_)));
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let stream = StreamEnricher::new(Enricher::default()).with_policy(ErrorPolicy::Skip);
        let (result, output) = run_bytes(&stream, WITH_INVALID_UTF8);
        let stats = result.unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.passed_through, 2);
        assert_eq!(
            output,
            b"{\"weight\":80,\"impedance\":null}\n{\"weight\":70,\"impedance\":null}\n".to_vec()
        );
    }

    #[test]
    fn test_invalid_utf8_line_copied_byte_for_byte() {
        let stream =
            StreamEnricher::new(Enricher::default()).with_policy(ErrorPolicy::Passthrough);
        let (result, output) = run_bytes(&stream, WITH_INVALID_UTF8);
        let stats = result.unwrap();

        assert_eq!(stats.echoed, 1);
        assert_eq!(stats.lines_written(), 3);
        assert_eq!(output, WITH_INVALID_UTF8.to_vec());
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let input = "{\"weight\":80,\"impedance\":null}\r\n{\"weight\":70}";
        let stream = StreamEnricher::new(Enricher::default());
        let (result, output) = run(&stream, input);

        assert_eq!(result.unwrap().passed_through, 2);
        assert_eq!(
            output,
            "{\"weight\":80,\"impedance\":null}\n{\"weight\":70}\n"
        );
    }

    #[test]
    fn test_fail_policy_stops_with_line_number() {
        let input = "{\"weight\":80,\"impedance\":null}\nnot json\n{\"weight\":70,\"impedance\":null}\n";
        let stream = StreamEnricher::new(Enricher::default());
        let (result, output) = run(&stream, input);

        let err = result.unwrap_err();
        assert!(matches!(err, EnrichError::Line { line: 2, .. }));
        assert!(matches!(err.root(), EnrichError::Json(_)));
        assert_eq!(output, "{\"weight\":80,\"impedance\":null}\n");
    }

    #[test]
    fn test_skip_policy_drops_bad_lines() {
        let input = "not json\n{\"impedance\":500}\n{\"weight\":70,\"impedance\":null}\n";
        let stream = StreamEnricher::new(Enricher::default()).with_policy(ErrorPolicy::Skip);
        let (result, output) = run(&stream, input);
        let stats = result.unwrap();

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.passed_through, 1);
        assert_eq!(output, "{\"weight\":70,\"impedance\":null}\n");
    }

    #[test]
    fn test_passthrough_policy_copies_bad_lines() {
        let profile = SubjectProfile::new(Sex::Female, 30, 170.0).unwrap();
        let input = "not json\n{\"weight\":58,\"impedance\":500}\n[1,2]\n";
        let stream = StreamEnricher::new(Enricher::new(profile))
            .with_policy(ErrorPolicy::Passthrough)
            .with_flush(false);
        let (result, output) = run(&stream, input);
        let stats = result.unwrap();

        assert_eq!(stats.echoed, 3);
        assert_eq!(stats.lines_written(), 3);
        assert_eq!(output, input);
    }

    #[test]
    fn test_error_policy_from_str() {
        assert_eq!("fail".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Fail);
        assert_eq!("Skip".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Skip);
        assert_eq!(
            "passthrough".parse::<ErrorPolicy>().unwrap(),
            ErrorPolicy::Passthrough
        );
        assert!("ignore".parse::<ErrorPolicy>().is_err());
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Fail);
    }
}
