use crate::domain::models::SimplifiedView;
use crate::shared::text::pretty_json;
use serde_json::Value;

/// Successful handler output before it becomes a text block.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    /// Confirmation line followed by the pretty-printed entity.
    Announced { headline: &'static str, body: Value },
}

impl Reply {
    pub fn json(value: Value) -> Self {
        Reply::Json(value)
    }

    pub fn view(entity: &impl SimplifiedView) -> Self {
        Reply::Json(entity.to_simplified())
    }

    pub fn announced(headline: &'static str, entity: &impl SimplifiedView) -> Self {
        Reply::Announced {
            headline,
            body: entity.to_simplified(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Reply::Json(value) => pretty_json(value),
            Reply::Announced { headline, body } => format!("{headline}\n{}", pretty_json(body)),
        }
    }
}
