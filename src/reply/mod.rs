//! Reply drafting: a generation backend first, a fixed template otherwise.
//!
//! [`ReplyGenerator::generate`] always returns usable, non-empty text.

pub mod backend;

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::GenerationError;

pub use backend::{HttpGenerator, TextGenerator, Unavailable};

/// Marker that ends the prompt; generated text follows its last occurrence.
pub const REPLY_MARKER: &str = "Reply:";

/// A reply containing any of these (case-insensitive) already has a closing.
pub const CLOSING_PHRASES: &[&str] = &["regards", "thank", "best", "sincerely"];

/// Appended to generated replies that lack a closing phrase.
pub const SIGN_OFF: &str = "\n\nRegards,\n";

/// Tuning for the generation path.
#[derive(Debug, Clone, Copy)]
pub struct ReplySettings {
    /// Output bound passed to the backend.
    pub max_length: usize,
    /// Minimum accepted reply length, in characters.
    pub min_reply_len: usize,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            max_length: 150,
            min_reply_len: 10,
        }
    }
}

impl From<&GenerationConfig> for ReplySettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_length: config.max_length,
            min_reply_len: config.min_reply_len,
        }
    }
}

/// Produces reply text for a message, owning its generation backend.
pub struct ReplyGenerator {
    backend: Box<dyn TextGenerator>,
    settings: ReplySettings,
}

impl ReplyGenerator {
    pub fn new(backend: Box<dyn TextGenerator>, settings: ReplySettings) -> Self {
        Self { backend, settings }
    }

    /// A generator that only ever uses the template.
    pub fn template_only() -> Self {
        Self::new(
            Box::new(Unavailable::new("template-only generator")),
            ReplySettings::default(),
        )
    }

    /// Build the backend and settings from configuration.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(backend::from_config(config), ReplySettings::from(config))
    }

    /// Whether the generation path will be attempted.
    pub fn backend_available(&self) -> bool {
        self.backend.available()
    }

    /// Draft a reply. Never fails and never returns an empty string.
    ///
    /// A panicking backend is caught and answered with the template. The
    /// process panic hook still reports the panic itself; the caller only
    /// ever sees a reply.
    pub fn generate(&self, sender_name: &str, subject: &str, body: &str) -> String {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_generate(sender_name, subject, body)
        }));

        match attempt {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(backend = self.backend.name(), error = %e, "Using template reply");
                fallback_reply(sender_name, subject)
            }
            Err(_) => {
                warn!(backend = self.backend.name(), "Generation backend panicked, using template reply");
                fallback_reply(sender_name, subject)
            }
        }
    }

    fn try_generate(
        &self,
        sender_name: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, GenerationError> {
        if !self.backend.available() {
            return Err(GenerationError::Unavailable(format!(
                "{} backend",
                self.backend.name()
            )));
        }

        let prompt = build_prompt(sender_name, subject, body);
        let raw = self
            .backend
            .attempt_generate(&prompt, self.settings.max_length)?;
        debug!(len = raw.len(), "Backend returned text");
        post_process(&raw, self.settings.min_reply_len)
    }
}

/// Build the generation prompt.
pub fn build_prompt(sender_name: &str, subject: &str, body: &str) -> String {
    format!(
        "You are a helpful, professional assistant. \
         Write a concise reply email to {sender_name} about the following message.\n\n\
         Subject: {subject}\n\n\
         Message: {body}\n\n\
         {REPLY_MARKER}"
    )
}

/// Clean raw backend output into a reply, or reject it.
///
/// Keeps the text after the last [`REPLY_MARKER`], then only the first
/// paragraph. Replies shorter than `min_len` characters are rejected. A
/// [`SIGN_OFF`] is appended when no closing phrase is present.
pub fn post_process(raw: &str, min_len: usize) -> Result<String, GenerationError> {
    let text = match raw.rfind(REPLY_MARKER) {
        Some(pos) => &raw[pos + REPLY_MARKER.len()..],
        None => raw,
    };

    let reply = text
        .trim()
        .split("\n\n")
        .next()
        .unwrap_or("")
        .trim();

    let len = reply.chars().count();
    if len < min_len {
        return Err(GenerationError::InvalidOutput(format!(
            "reply too short ({len} < {min_len} characters)"
        )));
    }

    let lower = reply.to_lowercase();
    if CLOSING_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        Ok(reply.to_string())
    } else {
        Ok(format!("{reply}{SIGN_OFF}"))
    }
}

/// Deterministic template reply.
pub fn fallback_reply(sender_name: &str, subject: &str) -> String {
    let name = match sender_name.trim() {
        "" => "there",
        name => name,
    };
    format!(
        "Hi {name},\n\n\
         Thanks for your message about \"{subject}\". I appreciate you reaching out. \
         I'll look into this and get back to you shortly.\n\n\
         Best regards,\n"
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Backend that replays a fixed result and records the prompt it saw.
    struct Scripted {
        output: Result<String, String>,
        seen: Mutex<Option<(String, usize)>>,
    }

    impl Scripted {
        fn ok(text: &str) -> Self {
            Self {
                output: Ok(text.to_string()),
                seen: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                output: Err("boom".to_string()),
                seen: Mutex::new(None),
            }
        }
    }

    impl TextGenerator for Scripted {
        fn available(&self) -> bool {
            true
        }

        fn attempt_generate(
            &self,
            prompt: &str,
            max_length: usize,
        ) -> Result<String, GenerationError> {
            *self.seen.lock().expect("lock") = Some((prompt.to_string(), max_length));
            self.output.clone().map_err(GenerationError::Request)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Panicking;

    impl TextGenerator for Panicking {
        fn available(&self) -> bool {
            true
        }

        fn attempt_generate(&self, _: &str, _: usize) -> Result<String, GenerationError> {
            panic!("model crashed")
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_fallback_when_unavailable() {
        let generator = ReplyGenerator::template_only();
        assert!(!generator.backend_available());
        let reply = generator.generate("Alice", "Meeting", "Can we reschedule?");
        assert!(reply.contains("Alice"));
        assert!(reply.contains("Best regards"));
        assert_eq!(reply, generator.generate("Alice", "Meeting", "Can we reschedule?"));
    }

    #[test]
    fn test_fallback_default_name() {
        let reply = fallback_reply("  ", "Hi");
        assert!(reply.starts_with("Hi there,"));
    }

    #[test]
    fn test_generated_reply_after_last_marker() {
        let backend = Scripted::ok(
            "prompt text Reply: echoed Reply: Sure, Tuesday works for me.\n\nSecond paragraph",
        );
        let generator = ReplyGenerator::new(Box::new(backend), ReplySettings::default());
        let reply = generator.generate("Bob", "Meeting", "Tuesday?");
        assert_eq!(reply, format!("Sure, Tuesday works for me.{SIGN_OFF}"));
    }

    #[test]
    fn test_generated_reply_with_closing_kept() {
        let reply = post_process("Happy to help. Thanks!", 10).expect("valid");
        assert_eq!(reply, "Happy to help. Thanks!");
    }

    #[test]
    fn test_short_output_falls_back() {
        let generator = ReplyGenerator::new(Box::new(Scripted::ok("Reply: ok")), ReplySettings::default());
        let reply = generator.generate("Carol", "Ping", "");
        assert_eq!(reply, fallback_reply("Carol", "Ping"));
    }

    #[test]
    fn test_backend_error_falls_back() {
        let generator = ReplyGenerator::new(Box::new(Scripted::failing()), ReplySettings::default());
        assert_eq!(generator.generate("", "S", "B"), fallback_reply("", "S"));
    }

    #[test]
    fn test_backend_panic_falls_back() {
        let generator = ReplyGenerator::new(Box::new(Panicking), ReplySettings::default());
        assert!(generator.backend_available());
        assert_eq!(generator.generate("Dan", "S", "B"), fallback_reply("Dan", "S"));
    }

    #[test]
    fn test_prompt_and_length_passed_to_backend() {
        let backend = std::sync::Arc::new(Scripted::ok("A perfectly fine answer, best"));
        struct Shared(std::sync::Arc<Scripted>);
        impl TextGenerator for Shared {
            fn available(&self) -> bool {
                true
            }
            fn attempt_generate(&self, p: &str, n: usize) -> Result<String, GenerationError> {
                self.0.attempt_generate(p, n)
            }
            fn name(&self) -> &str {
                "shared"
            }
        }

        let settings = ReplySettings {
            max_length: 42,
            min_reply_len: 10,
        };
        let generator = ReplyGenerator::new(Box::new(Shared(backend.clone())), settings);
        generator.generate("Eve", "Budget", "Numbers attached");

        let seen = backend.seen.lock().expect("lock").clone().expect("called");
        assert_eq!(seen.1, 42);
        assert!(seen.0.contains("reply email to Eve"));
        assert!(seen.0.contains("Subject: Budget"));
        assert!(seen.0.ends_with(REPLY_MARKER));
    }

    #[test]
    fn test_never_empty() {
        for (name, subject, body) in [("", "", ""), ("X", "", "body"), ("", "S", "")] {
            assert!(!ReplyGenerator::template_only()
                .generate(name, subject, body)
                .is_empty());
            let scripted = ReplyGenerator::new(Box::new(Scripted::ok("")), ReplySettings::default());
            assert!(!scripted.generate(name, subject, body).is_empty());
        }
    }
}
