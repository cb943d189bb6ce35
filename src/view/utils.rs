//! Formatting helpers shared by the screens

pub fn format_duration(ms: u32) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}", minutes, seconds)
}

pub fn truncate_string(s: &str, max_width: usize) -> String {
    if s.chars().count() > max_width {
        let truncated: String = s.chars().take(max_width.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

/// `[████░░░░] 12/30 (40.0%)` style bar.
pub fn progress_bar(current: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (width * current.min(total)) / total
    };
    let pct = if total == 0 {
        0.0
    } else {
        current.min(total) as f64 * 100.0 / total as f64
    };
    format!(
        "[{}{}] {}/{} ({:.1}%)",
        "█".repeat(filled),
        "░".repeat(width - filled),
        current,
        total,
        pct
    )
}

/// Width of the index column for a menu with `count` entries.
pub fn index_width(count: usize) -> usize {
    count.max(1).to_string().len().max(2)
}

/// "1 song" / "3 songs"
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_pad_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(213_573), "3:33");
        assert_eq!(format_duration(3_600_000), "60:00");
    }

    #[test]
    fn long_names_are_cut_with_ellipsis() {
        assert_eq!(truncate_string("Short", 10), "Short");
        assert_eq!(truncate_string("A very long playlist name", 10), "A very ...");
        assert_eq!(truncate_string("Überlänge!", 10), "Überlänge!");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(1, 4, 8), "[██░░░░░░] 1/4 (25.0%)");
        assert_eq!(progress_bar(4, 4, 4), "[████] 4/4 (100.0%)");
        assert_eq!(progress_bar(0, 0, 4), "[░░░░] 0/0 (0.0%)");
    }

    #[test]
    fn index_width_grows_with_count() {
        assert_eq!(index_width(0), 2);
        assert_eq!(index_width(9), 2);
        assert_eq!(index_width(120), 3);
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "song"), "1 song");
        assert_eq!(plural(0, "song"), "0 songs");
    }
}
