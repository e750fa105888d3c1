use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageLevel {
    Info,
    Warn,
    Error,
}

impl MessageLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One diagnostic produced by loading, self-check or evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub text: String,
    pub level: MessageLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleRef>,
}

impl ValidationMessage {
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level,
            context: None,
            rule: None,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Info, text)
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Warn, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Error, text)
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_rule(mut self, id: &str, name: Option<&str>) -> Self {
        self.rule = Some(RuleRef {
            id: id.to_string(),
            name: name.map(ToString::to_string),
        });
        self
    }

    #[must_use]
    pub fn rule_id(&self) -> Option<&str> {
        self.rule.as_ref().map(|rule| rule.id.as_str())
    }
}

impl std::fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.level)?;
        if let Some(rule) = self.rule_id() {
            write!(f, " rule {rule}:")?;
        }
        write!(f, " {}", self.text)?;
        if let Some(context) = &self.context {
            write!(f, " (at {context})")?;
        }
        Ok(())
    }
}

/// Highest level among `messages`, if any.
#[must_use]
pub fn max_level(messages: &[ValidationMessage]) -> Option<MessageLevel> {
    messages.iter().map(|message| message.level).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        let messages = vec![
            ValidationMessage::info("a"),
            ValidationMessage::error("b"),
            ValidationMessage::warn("c"),
        ];
        assert_eq!(max_level(&messages), Some(MessageLevel::Error));
        assert_eq!(max_level(&[]), None);
    }

    #[test]
    fn display_and_json_shape() {
        let message = ValidationMessage::warn("value MI:9999 not allowed")
            .with_rule("R1", Some("detection method"))
            .with_context("/interaction/detectionMethod");
        assert_eq!(
            message.to_string(),
            "[WARN] rule R1: value MI:9999 not allowed (at /interaction/detectionMethod)"
        );

        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["level"], "WARN");
        assert_eq!(json["rule"]["id"], "R1");

        let bare = serde_json::to_value(ValidationMessage::info("x")).expect("serialize");
        assert!(bare.get("context").is_none());
        assert!(bare.get("rule").is_none());
    }
}
