//! Keyword-matched canned replies.

struct FaqEntry {
    keywords: &'static [&'static str],
    reply: &'static str,
}

// Order matters: the first entry with a matching keyword wins.
const FAQ_ENTRIES: &[FaqEntry] = &[
    FaqEntry {
        keywords: &["demo", "practice", "free"],
        reply: "Click Free Demo, enter the code, then start practice. You can also pick a subject and topic to begin instantly.",
    },
    FaqEntry {
        keywords: &["ncfm"],
        reply: "NCFM is NSE's certification program focused on financial market knowledge and skills.",
    },
    FaqEntry {
        keywords: &["unlock", "full access", "subscription", "payment"],
        reply: "To unlock full access, upgrade in the Pricing or Checkout section. Subscriptions remove demo limits and unlock all questions.",
    },
    FaqEntry {
        keywords: &["explain", "answer", "question"],
        reply: "Share the question or ask for an explanation and I will walk you through the correct answer step-by-step.",
    },
];

pub const DEFAULT_REPLY: &str =
    "I can help with exam topics, practice steps, demo access, or subscriptions. What would you like to know?";

pub fn faq_reply(message: &str) -> &'static str {
    let text = message.to_lowercase();
    FAQ_ENTRIES
        .iter()
        .find(|entry| entry.keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|entry| entry.reply)
        .unwrap_or(DEFAULT_REPLY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keywords_case_insensitively() {
        assert!(faq_reply("How do I get a FREE trial?").starts_with("Click Free Demo"));
        assert!(faq_reply("what is NCFM").starts_with("NCFM is"));
        assert!(faq_reply("I want Full Access").starts_with("To unlock"));
    }

    #[test]
    fn first_matching_entry_wins() {
        // "practice" (entry 1) beats "question" (entry 4).
        assert!(faq_reply("practice question help").starts_with("Click Free Demo"));
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(faq_reply("hello there"), DEFAULT_REPLY);
        assert_eq!(faq_reply(""), DEFAULT_REPLY);
    }
}
