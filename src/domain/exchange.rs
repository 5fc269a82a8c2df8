use serde::{Deserialize, Serialize};

/// A stored question/answer exchange together with its embedding.
///
/// Records are never updated in place; every upsert produces a new `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub question: String,
    pub answer: String,
}

/// Payload kept next to each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangePayload {
    pub question: String,
    pub answer: String,
}

/// A prior exchange returned by nearest-neighbour search, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarExchange {
    pub question: String,
    pub answer: String,
    pub score: f32,
}

impl SimilarExchange {
    /// Renders the exchange the way it is fed back into prompts.
    pub fn as_context(&self) -> String {
        format!("Q: {}\nA: {}", self.question, self.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_format_is_question_then_answer() {
        let exchange = SimilarExchange {
            question: "Which year sold most?".to_string(),
            answer: "2020".to_string(),
            score: 0.91,
        };
        assert_eq!(exchange.as_context(), "Q: Which year sold most?\nA: 2020");
    }
}
