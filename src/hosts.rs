/// Split a comma-separated host list, trimming whitespace and dropping
/// entries that end up empty. Duplicates are kept; each copy is probed
/// on its own.
pub fn parse_host_list(s: &str) -> Vec<String> {
    normalize_iter(s.split(','))
}

/// Apply the same trim/drop discipline to an already-split list, e.g.
/// hosts collected from a repeatable CLI flag.
pub fn normalize_hosts(raw: &[String]) -> Vec<String> {
    normalize_iter(raw.iter().map(String::as_str))
}

fn normalize_iter<'a, I>(items: I) -> Vec<String>
where
    I: Iterator<Item = &'a str>,
{
    items
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}
