use super::strip_ansi;

/// Elapsed-time column of the first `ps -eo etime,args` line whose command
/// contains `needle`.
pub fn parse_uptime(ps_output: &str, needle: &str) -> Option<String> {
    let text = strip_ansi(ps_output);
    text.lines()
        .map(str::trim)
        .filter_map(|line| line.split_once(char::is_whitespace))
        .find(|(_, command)| command.contains(needle))
        .map(|(etime, _)| etime.to_string())
}

/// Converts a `ps` elapsed time (`[[dd-]hh:]mm:ss`) to seconds.
pub fn etime_seconds(etime: &str) -> Option<u64> {
    let (days, clock) = match etime.split_once('-') {
        Some((days, clock)) => (days.parse::<u64>().ok()?, clock),
        None => (0, etime),
    };

    let parts = clock
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };

    Some(((days * 24 + hours) * 60 + minutes) * 60 + seconds)
}
