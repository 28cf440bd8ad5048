//! Detects when the assistant has wrapped up the conversation.

use crate::realtime_api::ResponseBody;

/// Phrases that signal the assistant is ending the call.
pub const GOODBYE_PHRASES: [&str; 8] = [
    "thank you bye have a great day",
    "thank you and goodbye",
    "goodbye have a nice day",
    "thank you have a great day",
    "have a great day",
    "talk to you later",
    "take care",
    "goodbye",
];

/// Returns true if `text` contains any goodbye phrase, ignoring case.
pub fn is_goodbye(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    GOODBYE_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
}

/// Tracks goodbye intent over the lifetime of a single call.
///
/// Once a goodbye has been observed the flag stays set; later responses
/// cannot clear it.
#[derive(Debug, Default, Clone)]
pub struct GoodbyeDetector {
    detected: bool,
}

impl GoodbyeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects the transcript carried by a `response.done` event.
    ///
    /// Returns the lower-cased transcript when one was present so callers can
    /// log it.
    pub fn observe(&mut self, response: &ResponseBody) -> Option<String> {
        let transcript = response.audio_transcript()?.to_lowercase();
        if is_goodbye(&transcript) {
            self.detected = true;
        }
        Some(transcript)
    }

    pub fn detected(&self) -> bool {
        self.detected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime_api::{ContentPart, OutputItem};

    fn response_with_transcript(transcript: &str) -> ResponseBody {
        ResponseBody {
            output: vec![OutputItem {
                content: vec![ContentPart {
                    kind: "audio".to_string(),
                    transcript: Some(transcript.to_string()),
                }],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_is_goodbye_matches_phrases() {
        assert!(is_goodbye("Thank you, have a great day!"));
        assert!(is_goodbye("  GOODBYE  "));
        assert!(is_goodbye("Okay, take care of yourself."));
        assert!(is_goodbye("Great, talk to you later then."));
    }

    #[test]
    fn test_is_goodbye_rejects_other_text() {
        assert!(!is_goodbye("What are your hours?"));
        assert!(!is_goodbye(""));
        assert!(!is_goodbye("Good morning, how can I help?"));
    }

    #[test]
    fn test_detector_is_monotonic() {
        let mut detector = GoodbyeDetector::new();
        assert!(!detector.detected());

        detector.observe(&response_with_transcript("Our office opens at 8 AM."));
        assert!(!detector.detected());

        let transcript = detector.observe(&response_with_transcript("Goodbye, have a nice day"));
        assert_eq!(transcript.as_deref(), Some("goodbye, have a nice day"));
        assert!(detector.detected());

        detector.observe(&response_with_transcript("Is there anything else?"));
        assert!(detector.detected());
    }

    #[test]
    fn test_detector_ignores_responses_without_transcript() {
        let mut detector = GoodbyeDetector::new();
        let response = ResponseBody {
            output: vec![OutputItem {
                content: vec![ContentPart {
                    kind: "text".to_string(),
                    transcript: Some("goodbye".to_string()),
                }],
            }],
            ..Default::default()
        };

        assert_eq!(detector.observe(&response), None);
        assert!(!detector.detected());
        assert_eq!(detector.observe(&ResponseBody::default()), None);
    }
}
