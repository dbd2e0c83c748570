use std::sync::OnceLock;

use regex::Regex;

fn telegram_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(https?://)?t(?:elegram)?\.me/[A-Za-z0-9_+/]+").expect("valid regex")
    })
}

fn handle_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)@[A-Za-z0-9_]{3,}(?:\s|$)").expect("valid regex"))
}

/// Strip `t.me/...`/`telegram.me/...` links and standalone `@handle` mentions
/// from `text`, preserving surrounding whitespace (spec §4.4).
pub fn clean_telegram_links(text: &str) -> String {
    let without_urls = telegram_url_re().replace_all(text, "");
    let mut out = String::with_capacity(without_urls.len());
    let mut last_end = 0;
    for m in handle_re().find_iter(&without_urls) {
        let matched = m.as_str();
        let leading_ws_len = matched.len() - matched.trim_start().len();
        let trailing_ws_len = matched.len() - matched.trim_end().len();
        out.push_str(&without_urls[last_end..m.start()]);
        out.push_str(&matched[..leading_ws_len]);
        out.push_str(&matched[matched.len() - trailing_ws_len..]);
        last_end = m.end();
    }
    out.push_str(&without_urls[last_end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_handle_and_link_preserving_whitespace() {
        let input = "hi @channel visit t.me/x\nend";
        assert_eq!(clean_telegram_links(input), "hi  visit \nend");
    }

    #[test]
    fn leaves_short_handles_alone() {
        assert_eq!(clean_telegram_links("email me@ab now"), "email me@ab now");
    }

    #[test]
    fn strips_telegram_me_with_scheme() {
        assert_eq!(
            clean_telegram_links("see https://telegram.me/foo_bar here"),
            "see  here"
        );
    }

    #[test]
    fn leaves_embedded_at_signs_alone() {
        assert_eq!(clean_telegram_links("user@example.com"), "user@example.com");
    }
}
