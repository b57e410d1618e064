use colored::Colorize;

/// Console line styles
pub struct Styles;

impl Styles {
    pub fn success(text: &str) -> String {
        format!("{} {}", "[ok]".bright_green(), text)
    }

    pub fn error(text: &str) -> String {
        format!("{} {}", "[error]".bright_red(), text)
    }

    pub fn warning(text: &str) -> String {
        format!("{} {}", "[warn]".bright_yellow(), text)
    }

    pub fn info(text: &str) -> String {
        format!("{} {}", "->".dimmed(), text)
    }

    /// Dimmed, indented secondary line
    pub fn dimmed(text: &str) -> String {
        format!("   {}", text.dimmed())
    }

    /// Bulleted remediation line
    pub fn bullet(text: &str) -> String {
        format!("   {} {}", "•".dimmed(), text)
    }

    pub fn kv(key: &str, value: &str) -> String {
        format!(
            "   {:<16} {}",
            format!("{}:", key).dimmed(),
            value.bright_white()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        colored::control::set_override(false);
        assert_eq!(Styles::success("done"), "[ok] done");
        assert_eq!(Styles::error("bad"), "[error] bad");
        assert_eq!(Styles::warning("hmm"), "[warn] hmm");
        assert_eq!(Styles::info("note"), "-> note");
        assert_eq!(Styles::kv("path", "/tmp/a"), "   path:            /tmp/a");
    }
}
