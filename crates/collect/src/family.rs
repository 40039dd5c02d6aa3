//! Text exposition helpers: family headers and sample lines.

use std::borrow::Cow;
use std::fmt::Write as _;

use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
    Counter,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Family {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricType,
}

impl Family {
    pub const fn gauge(name: &'static str, help: &'static str) -> Self {
        Self { name, help, kind: MetricType::Gauge }
    }

    /// `# HELP` and `# TYPE` lines, without trailing newline.
    pub fn header(&self) -> String {
        format!("# HELP {} {}\n# TYPE {} {}", self.name, self.help, self.name, self.kind.as_str())
    }

    pub fn render(&self, samples: &[Sample]) -> Vec<u8> {
        let mut out = String::new();
        for s in samples {
            out.push_str(self.name);
            if !s.labels.is_empty() {
                out.push('{');
                for (i, (k, v)) in s.labels.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}=\"{}\"", k, escape(v));
                }
                out.push('}');
            }
            out.push(' ');
            out.push_str(&format_value(s.value));
            out.push('\n');
        }
        out.into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: SmallVec<[(&'static str, String); 4]>,
    pub value: f64,
}

impl Sample {
    pub fn new(value: f64) -> Self {
        Self { labels: SmallVec::new(), value }
    }

    pub fn label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }
}

fn escape(v: &str) -> Cow<'_, str> {
    if !v.contains(|c: char| matches!(c, '\\' | '"' | '\n')) {
        return Cow::Borrowed(v);
    }
    let mut out = String::with_capacity(v.len() + 4);
    for c in v.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

pub(crate) fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        let inf = if v > 0.0 { "+Inf" } else { "-Inf" };
        inf.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
