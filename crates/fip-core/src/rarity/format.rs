//! Sectioned tabular text format for the rarity statistics file
//!
//! The file is a sequence of `# <ISO-date>` sections, each holding a padded
//! ASCII table of `| subnet | total_count |` rows sorted by descending count
//! then ascending subnet. A file without section headers is treated as one
//! legacy table attributed to the caller-supplied default date.

use std::collections::BTreeMap;

/// Per-subnet counts of one date partition
pub type SubnetCounts = BTreeMap<String, u64>;

/// All date partitions, keyed by ISO date string
pub type DateSections = BTreeMap<String, SubnetCounts>;

const HEADER_SUBNET: &str = "subnet";
const HEADER_COUNT: &str = "total_count";

/// Parse one table body; tolerant of separators, headers and junk rows
pub fn parse_table(text: &str) -> SubnetCounts {
    let mut counts = SubnetCounts::new();
    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with('|') {
            continue;
        }
        let parts: Vec<&str> = line
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if parts.len() < 2 {
            continue;
        }
        if parts[0].eq_ignore_ascii_case(HEADER_SUBNET)
            || parts[1].eq_ignore_ascii_case(HEADER_COUNT)
        {
            continue;
        }
        if let Ok(count) = parts[1].parse::<u64>() {
            counts.insert(parts[0].to_string(), count);
        }
    }
    counts
}

/// Parse a whole file into date sections
pub fn parse_sections(text: &str, default_date: &str) -> DateSections {
    let mut sections = DateSections::new();
    let mut current_date: Option<String> = None;
    let mut buffer: Vec<&str> = Vec::new();
    let mut has_header = false;

    for line in text.lines() {
        if let Some(date) = line.strip_prefix("# ") {
            if let Some(date_str) = current_date.take() {
                if !buffer.is_empty() {
                    sections.insert(date_str, parse_table(&buffer.join("\n")));
                }
            }
            current_date = Some(date.trim().to_string());
            buffer.clear();
            has_header = true;
            continue;
        }
        if current_date.is_some() {
            buffer.push(line);
        }
    }
    if let Some(date_str) = current_date {
        if !buffer.is_empty() {
            sections.insert(date_str, parse_table(&buffer.join("\n")));
        }
    }

    if !has_header {
        let counts = parse_table(text);
        if !counts.is_empty() {
            sections.insert(default_date.to_string(), counts);
        }
    }

    sections
}

/// Render one table, columns padded to content width
pub fn format_table(counts: &SubnetCounts) -> String {
    let mut rows: Vec<(&str, u64)> = counts.iter().map(|(s, &c)| (s.as_str(), c)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let subnet_width = rows
        .iter()
        .map(|(s, _)| s.len())
        .chain([HEADER_SUBNET.len()])
        .max()
        .unwrap_or(HEADER_SUBNET.len());
    let count_width = rows
        .iter()
        .map(|(_, c)| c.to_string().len())
        .chain([HEADER_COUNT.len()])
        .max()
        .unwrap_or(HEADER_COUNT.len());

    let line = format!("+{}+{}+", "-".repeat(subnet_width), "-".repeat(count_width));
    let mut out = vec![
        line.clone(),
        format!("|{HEADER_SUBNET:<subnet_width$}|{HEADER_COUNT:<count_width$}|"),
        line.clone(),
    ];
    for (subnet, count) in rows {
        let count = count.to_string();
        out.push(format!("|{subnet:<subnet_width$}|{count:<count_width$}|"));
    }
    out.push(line);
    out.join("\n") + "\n"
}

/// Render all sections, dates ascending
pub fn format_sections(sections: &DateSections) -> String {
    let mut out: Vec<String> = Vec::new();
    for (date, counts) in sections {
        out.push(format!("# {date}"));
        out.push(format_table(counts).trim_end_matches('\n').to_string());
        out.push(String::new());
    }
    if !out.is_empty() {
        out.pop();
    }
    out.join("\n") + "\n"
}

/// Sum counts per subnet across every date partition
pub fn aggregate_sections(sections: &DateSections) -> SubnetCounts {
    let mut totals = SubnetCounts::new();
    for counts in sections.values() {
        for (subnet, count) in counts {
            *totals.entry(subnet.clone()).or_insert(0) += count;
        }
    }
    totals
}
