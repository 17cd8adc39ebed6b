//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::collections::BTreeSet;

use scrawl_core::{Record, RecordSummary};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single record with its content
    pub fn print_record(&self, record: &Record) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", record.id);
                println!(
                    "Created: {}",
                    record.meta.created_at.format("%Y-%m-%d %H:%M")
                );
                if !record.meta.tags.is_empty() {
                    println!("Tags:    {}", join_tags(&record.meta.tags));
                }
                for (key, value) in &record.meta.extra {
                    if let Some(text) = value.as_str() {
                        println!("{}: {}", capitalize(key), text);
                    }
                }
                println!();
                println!("{}", record.content);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(record).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", record.id);
            }
        }
    }

    /// Print a list of record summaries
    pub fn print_summaries(&self, summaries: &[RecordSummary]) {
        match self.format {
            OutputFormat::Human => {
                if summaries.is_empty() {
                    println!("No records found.");
                    return;
                }
                for summary in summaries {
                    println!(
                        "{} | {} | {}",
                        summary.created_at.format("%Y-%m-%d %H:%M"),
                        truncate(&summary.id, 36),
                        join_tags(&summary.tags)
                    );
                }
                println!("\n{} record(s)", summaries.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(summaries).unwrap());
            }
            OutputFormat::Quiet => {
                for summary in summaries {
                    println!("{}", summary.id);
                }
            }
        }
    }

    /// Print a list of tags with usage counts
    pub fn print_tags(&self, tags: &[(String, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for (name, count) in tags {
                    println!("{} ({})", name, count);
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json_tags).unwrap());
            }
            OutputFormat::Quiet => {
                for (name, _) in tags {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print a set of record ids
    pub fn print_ids(&self, ids: &BTreeSet<String>) {
        match self.format {
            OutputFormat::Human => {
                if ids.is_empty() {
                    println!("No matching records.");
                    return;
                }
                for id in ids {
                    println!("{}", id);
                }
                println!("\n{} record(s)", ids.len());
            }
            OutputFormat::Json => {
                let list: Vec<_> = ids.iter().collect();
                println!("{}", serde_json::to_string_pretty(&list).unwrap());
            }
            OutputFormat::Quiet => {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
