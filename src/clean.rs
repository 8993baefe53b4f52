use regex::Regex;
use std::sync::LazyLock;

static BRACKETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"（[^）]*）|\([^)]*\)|\[[^\]]*\]|【[^】]*】").expect("valid bracket pattern")
});

const QUOTES: &[char] = &['"', '\'', '“', '”', '「', '」'];

const SENTENCE_BREAKS: &[char] = &['。', '！', '？', '…', '\n', '，', ','];

const MAX_CHARS: usize = 50;

const HARD_CUT: usize = 20;

/// Turns raw model output into a one-line action description.
pub fn clean_description(raw: &str) -> Option<String> {
    let text = raw.trim().trim_matches(QUOTES).trim();
    let text = BRACKETS.replace_all(text, "");
    let text = text.trim();

    let text = if text.chars().count() > MAX_CHARS {
        // breaks are tried in order, not by position
        match SENTENCE_BREAKS.iter().find_map(|sep| text.find(*sep)) {
            Some(idx) => text[..idx].trim().to_string(),
            None => text.chars().take(HARD_CUT).collect(),
        }
    } else {
        text.to_string()
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_annotations() {
        assert_eq!(
            clean_description("「发现自己暴露了XP（笑）」").as_deref(),
            Some("发现自己暴露了XP")
        );
        assert_eq!(
            clean_description("  \"肯定又发错群了[doge]\"\n").as_deref(),
            Some("肯定又发错群了")
        );
    }

    #[test]
    fn long_output_is_cut_at_first_break() {
        let raw = format!("撤回了刚才的暴言。{}", "后面还有很多很多废话".repeat(6));
        assert_eq!(clean_description(&raw).as_deref(), Some("撤回了刚才的暴言"));
    }

    #[test]
    fn full_stop_wins_over_earlier_comma() {
        let head = format!("我说，{}", "这条消息其实是发给另一个群的".repeat(4));
        let raw = format!("{}。然后就撤回了", head);
        assert_eq!(clean_description(&raw), Some(head));
    }

    #[test]
    fn long_output_without_breaks_is_hard_cut() {
        let raw = "啊".repeat(60);
        assert_eq!(clean_description(&raw).unwrap().chars().count(), 20);
    }

    #[test]
    fn annotation_only_output_is_empty() {
        assert_eq!(clean_description("（沉默）"), None);
        assert_eq!(clean_description("   "), None);
    }
}
