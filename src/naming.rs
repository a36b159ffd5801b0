//! File-organization convention for regional climate archives.
//!
//! Directory and file names are built from `{token}` templates. The output
//! file name always follows the archive convention
//! `<var>_<domain>_<driving source>_<experiment>_<variant>_<institution>_<source>_<version>_<frequency>[_<start>-<end>].nc`.
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

/// Wildcard substituted for the time range in input file patterns
pub const TIME_RANGE_WILDCARD: &str = "*";

/// Extension of every archive file
pub const FILE_EXTENSION: &str = "nc";

/// Separator between tokens in archive file names
pub const TOKEN_SEPARATOR: char = '_';

/// Placeholder names usable in directory and file templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Variable,
    Activity,
    Domain,
    DrivingSource,
    DrivingExperiment,
    DrivingVariant,
    Institution,
    SourceId,
    VersionRealisation,
    Frequency,
    DataVersion,
    TimeRange,
}

impl Token {
    const NAMES: [(&'static str, Token); 12] = [
        ("variable", Token::Variable),
        ("activity", Token::Activity),
        ("domain", Token::Domain),
        ("driving_source", Token::DrivingSource),
        ("driving_experiment", Token::DrivingExperiment),
        ("driving_variant", Token::DrivingVariant),
        ("institution", Token::Institution),
        ("source_id", Token::SourceId),
        ("version_realisation", Token::VersionRealisation),
        ("frequency", Token::Frequency),
        ("data_version", Token::DataVersion),
        ("time_range", Token::TimeRange),
    ];

    pub fn from_name(name: &str) -> Option<Token> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, token)| *token)
    }

    pub fn name(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, t)| t == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }
}

/// Tokens embedded in an output file name, in order
pub const OUTPUT_TOKENS: [Token; 9] = [
    Token::Variable,
    Token::Domain,
    Token::DrivingSource,
    Token::DrivingExperiment,
    Token::DrivingVariant,
    Token::Institution,
    Token::SourceId,
    Token::VersionRealisation,
    Token::Frequency,
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token(Token),
}

/// A parsed `{token}` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template, rejecting unknown tokens and unbalanced braces
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        if c == '{' {
                            return Err(format!("Nested '{{' in template '{}'", source));
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(format!("Unclosed '{{' in template '{}'", source));
                    }
                    let token = Token::from_name(name.trim()).ok_or_else(|| {
                        format!("Unknown token '{{{}}}' in template '{}'", name, source)
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Token(token));
                }
                '}' => return Err(format!("Unmatched '}}' in template '{}'", source)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Tokens referenced by this template, in order of appearance
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Token(t) => Some(*t),
            Segment::Literal(_) => None,
        })
    }

    pub fn uses(&self, token: Token) -> bool {
        self.tokens().any(|t| t == token)
    }

    /// Substitute every token with the value returned by `lookup`
    pub fn render<F>(&self, lookup: F) -> String
    where
        F: Fn(Token) -> String,
    {
        self.render_with(lookup, str::to_string)
    }

    /// Like [`Template::render`], passing the literal text between tokens
    /// through `literal` (e.g. to escape glob characters)
    pub fn render_with<F, L>(&self, lookup: F, literal: L) -> String
    where
        F: Fn(Token) -> String,
        L: Fn(&str) -> String,
    {
        let mut out = String::with_capacity(self.source.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(&literal(text)),
                Segment::Token(token) => out.push_str(&lookup(*token)),
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Output frequency of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    OneHourly,
    ThreeHourly,
    SixHourly,
    Daily,
    Monthly,
    Fixed,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::OneHourly => "1hr",
            Frequency::ThreeHourly => "3hr",
            Frequency::SixHourly => "6hr",
            Frequency::Daily => "day",
            Frequency::Monthly => "mon",
            Frequency::Fixed => "fx",
        }
    }

    /// strftime format of each end of a time-range suffix, if the frequency has one
    pub fn time_format(&self) -> Option<&'static str> {
        match self {
            Frequency::OneHourly | Frequency::ThreeHourly | Frequency::SixHourly => {
                Some("%Y%m%d%H%M")
            }
            Frequency::Daily => Some("%Y%m%d"),
            Frequency::Monthly => Some("%Y%m"),
            Frequency::Fixed => None,
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1hr" => Ok(Frequency::OneHourly),
            "3hr" => Ok(Frequency::ThreeHourly),
            "6hr" => Ok(Frequency::SixHourly),
            "day" => Ok(Frequency::Daily),
            "mon" => Ok(Frequency::Monthly),
            "fx" => Ok(Frequency::Fixed),
            _ => Err(format!(
                "Unknown frequency '{}'. Expected one of: 1hr, 3hr, 6hr, day, mon, fx",
                s
            )),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive time span covered by one archive file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, String> {
        if start > end {
            return Err(format!("Time range start {} is after end {}", start, end));
        }
        Ok(Self { start, end })
    }

    /// Parse the two ends from "YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS"
    pub fn parse(start: &str, end: &str) -> Result<Self, String> {
        let start = parse_datetime(start, false)?;
        let end = parse_datetime(end, true)?;
        Self::new(start, end)
    }

    /// Suffix such as "20200101-20201231", or None for fixed fields
    pub fn suffix(&self, frequency: Frequency) -> Option<String> {
        frequency.time_format().map(|format| {
            format!("{}-{}", self.start.format(format), self.end.format(format))
        })
    }
}

fn parse_datetime(value: &str, end_of_day: bool) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        format!(
            "Invalid datetime format: {}. Expected: YYYY-MM-DD or YYYY-MM-DD HH:MM:SS",
            value
        )
    })?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.ok_or_else(|| format!("Invalid date {}", value))
}

/// Join output tokens with the archive separator and append the optional
/// time-range suffix and the extension
pub fn archive_file_name<F>(lookup: F, frequency: Frequency, range: Option<&TimeRange>) -> String
where
    F: Fn(Token) -> String,
{
    let mut parts: Vec<String> = OUTPUT_TOKENS.iter().map(|t| lookup(*t)).collect();
    if let Some(suffix) = range.and_then(|r| r.suffix(frequency)) {
        parts.push(suffix);
    }
    let separator = TOKEN_SEPARATOR.to_string();
    format!("{}.{}", parts.join(separator.as_str()), FILE_EXTENSION)
}
