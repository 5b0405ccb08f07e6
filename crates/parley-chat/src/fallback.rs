//! Keyword-matched replies used when the completion capability is absent or
//! failing.

use std::sync::Arc;

use rand::Rng;

/// Picks an index in `0..len`. Injected so tests can pin the echo template.
pub type IndexSelector = Arc<dyn Fn(usize) -> usize + Send + Sync>;

/// Keyword rule, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRule {
    Greeting,
    Weather,
    Time,
    Search,
    Email,
    Help,
    Reminder,
}

impl FallbackRule {
    pub const ALL: [FallbackRule; 7] = [
        FallbackRule::Greeting,
        FallbackRule::Weather,
        FallbackRule::Time,
        FallbackRule::Search,
        FallbackRule::Email,
        FallbackRule::Help,
        FallbackRule::Reminder,
    ];

    /// Lowercase keywords that trigger the rule anywhere in the input.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            FallbackRule::Greeting => &["hello", "hi", "hey"],
            FallbackRule::Weather => &["weather", "temperature"],
            FallbackRule::Time => &["time", "clock"],
            FallbackRule::Search => &["search", "find", "look up"],
            FallbackRule::Email => &["email", "mail"],
            FallbackRule::Help => &["help", "what can you do", "capabilities"],
            FallbackRule::Reminder => &["remind", "note", "remember"],
        }
    }

    fn matches(self, lowered: &str) -> bool {
        self.keywords().iter().any(|kw| lowered.contains(kw))
    }

    fn reply(self) -> String {
        match self {
            FallbackRule::Greeting => "Hello! I'm your AI voice assistant. I can help with weather, time, web searches, emails, and more. What would you like me to do?".to_string(),
            FallbackRule::Weather => "I can help you get weather information! What city would you like to know about?".to_string(),
            FallbackRule::Time => format!(
                "The current time is {}.",
                chrono::Local::now().format("%-I:%M:%S %p")
            ),
            FallbackRule::Search => "I can help you search for information on the web. What would you like me to look up?".to_string(),
            FallbackRule::Email => "I can help you send emails. What would you like to send and to whom?".to_string(),
            FallbackRule::Help => "I can help you with weather information, tell you the time, search the web, send emails, set reminders, take notes, and answer questions. Just ask me what you need!".to_string(),
            FallbackRule::Reminder => "I can help you set reminders and take notes. What would you like me to remember for you?".to_string(),
        }
    }
}

/// Echo templates for input no rule matches. `{text}` is replaced verbatim.
const ECHO_TEMPLATES: [&str; 4] = [
    "That's interesting! Can you tell me more about what you'd like me to help you with regarding \"{text}\"?",
    "I understand you mentioned \"{text}\". How can I assist you with that?",
    "Thanks for sharing that with me. What specific help do you need with \"{text}\"?",
    "I'm here to help! What would you like me to do about \"{text}\"?",
];

/// Produces canned replies from keyword rules, echoing unmatched input.
#[derive(Clone)]
pub struct FallbackResponder {
    select: IndexSelector,
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackResponder {
    /// Responder choosing echo templates uniformly at random.
    pub fn new() -> Self {
        Self::with_selector(Arc::new(|len| rand::rng().random_range(0..len)))
    }

    pub fn with_selector(select: IndexSelector) -> Self {
        Self { select }
    }

    /// First rule matching `text`, if any.
    pub fn matching_rule(&self, text: &str) -> Option<FallbackRule> {
        let lowered = text.to_lowercase();
        FallbackRule::ALL
            .into_iter()
            .find(|rule| rule.matches(&lowered))
    }

    pub fn respond(&self, text: &str) -> String {
        if let Some(rule) = self.matching_rule(text) {
            return rule.reply();
        }
        let index = (self.select)(ECHO_TEMPLATES.len()) % ECHO_TEMPLATES.len();
        ECHO_TEMPLATES[index].replace("{text}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinned(index: usize) -> FallbackResponder {
        FallbackResponder::with_selector(Arc::new(move |_| index))
    }

    #[test]
    fn test_greeting() {
        let responder = FallbackResponder::new();
        let reply = responder.respond("Hello there");
        assert!(reply.starts_with("Hello! I'm your AI voice assistant."));
        assert_eq!(responder.matching_rule("hey you"), Some(FallbackRule::Greeting));
        assert_eq!(responder.matching_rule("HI"), Some(FallbackRule::Greeting));
    }

    #[test]
    fn test_weather_mentions_weather() {
        let responder = FallbackResponder::new();
        let reply = responder.respond("what's the weather in Paris");
        assert!(reply.contains("weather"));
        assert_eq!(
            responder.matching_rule("current temperature?"),
            Some(FallbackRule::Weather)
        );
    }

    #[test]
    fn test_time_embeds_clock() {
        let reply = FallbackResponder::new().respond("what time is it");
        assert!(reply.starts_with("The current time is "));
        assert!(reply.ends_with("M."));
    }

    #[test]
    fn test_rule_priority_order() {
        let responder = FallbackResponder::new();
        // Greeting beats weather.
        assert_eq!(
            responder.matching_rule("hey, how is the weather"),
            Some(FallbackRule::Greeting)
        );
        // Weather beats time.
        assert_eq!(
            responder.matching_rule("weather by the clock"),
            Some(FallbackRule::Weather)
        );
        // Search beats email.
        assert_eq!(
            responder.matching_rule("find my email"),
            Some(FallbackRule::Search)
        );
    }

    #[test]
    fn test_other_rules() {
        let responder = FallbackResponder::new();
        assert_eq!(
            responder.matching_rule("please look up rust"),
            Some(FallbackRule::Search)
        );
        assert_eq!(
            responder.matching_rule("send an email to bob"),
            Some(FallbackRule::Email)
        );
        assert_eq!(
            responder.matching_rule("What can you do?"),
            Some(FallbackRule::Help)
        );
        assert_eq!(
            responder.matching_rule("remind me tomorrow"),
            Some(FallbackRule::Reminder)
        );
    }

    #[test]
    fn test_keywords_match_inside_other_words() {
        let responder = FallbackResponder::new();
        assert_eq!(
            responder.matching_rule("tell me about this"),
            Some(FallbackRule::Greeting)
        );
        assert_eq!(
            responder.matching_rule("anything new?"),
            Some(FallbackRule::Greeting)
        );
        assert_eq!(
            responder.matching_rule("what times work"),
            Some(FallbackRule::Time)
        );
        assert_eq!(
            responder.matching_rule("check my gmail"),
            Some(FallbackRule::Email)
        );
    }

    #[test]
    fn test_unmatched_input_has_no_rule() {
        assert_eq!(FallbackResponder::new().matching_rule("violet submarine"), None);
    }

    #[test]
    fn test_echo_contains_input_verbatim() {
        let input = "Quantum \"bananas\" & stuff";
        for index in 0..4 {
            let reply = pinned(index).respond(input);
            assert!(reply.contains(input), "template {} lost the input", index);
            assert!(!reply.contains("{text}"));
        }
    }

    #[test]
    fn test_echo_templates_are_distinct() {
        let replies: Vec<String> = (0..4).map(|i| pinned(i).respond("purple")).collect();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert_ne!(replies[i], replies[j]);
            }
        }
    }

    #[test]
    fn test_out_of_range_selector_wraps() {
        let reply = pinned(6).respond("purple");
        assert_eq!(reply, pinned(2).respond("purple"));
    }

    #[test]
    fn test_random_echo_is_one_of_templates() {
        let responder = FallbackResponder::new();
        let candidates: Vec<String> = (0..4).map(|i| pinned(i).respond("purple")).collect();
        for _ in 0..20 {
            assert!(candidates.contains(&responder.respond("purple")));
        }
    }
}
