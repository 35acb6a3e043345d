//! Prometheus text exposition helpers

use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn metric_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("static regex"))
}

fn label_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static regex"))
}

pub fn is_valid_metric_name(name: &str) -> bool {
    metric_name_re().is_match(name)
}

/// Label names may not contain ':' and the `__` prefix is reserved
pub fn is_valid_label_name(name: &str) -> bool {
    label_name_re().is_match(name) && !name.starts_with("__")
}

pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// HELP text escapes only backslash and newline
pub fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// `name{k="v",...} value\n`; the brace block is dropped when there are no labels
pub fn format_line(name: &str, labels: &[(&str, &str)], value: f64) -> String {
    let mut line = String::with_capacity(64);
    line.push_str(name);

    if !labels.is_empty() {
        line.push('{');
        for (i, (key, val)) in labels.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(line, "{}=\"{}\"", key, escape_label_value(val));
        }
        line.push('}');
    }

    line.push(' ');
    line.push_str(&format_value(value));
    line.push('\n');
    line
}
