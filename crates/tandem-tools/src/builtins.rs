//! Native built-in tools registered at startup.

use crate::tool::{ExecutionContext, Tool, ToolOutcome, ToolSpec};
use async_trait::async_trait;
use tandem_core::TandemResult;

fn number_value(v: f64) -> serde_json::Value {
    // Prefer an integer representation when the value is exact, so
    // "25*4" yields 100 rather than 100.0.
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        serde_json::json!(v as i64)
    } else {
        serde_json::json!(v)
    }
}

/// Arithmetic expression evaluator.
///
/// Supports `+ - * /`, parentheses, unary minus, and decimal literals.
pub struct CalculatorTool {
    spec: ToolSpec,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec {
                name: "calculator".to_string(),
                description: "Perform mathematical calculations".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "expression": {
                            "type": "string",
                            "description": "Mathematical expression to evaluate"
                        }
                    },
                    "required": ["expression"]
                }),
                category: "builtin".to_string(),
            },
        }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn run(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> TandemResult<ToolOutcome> {
        let expression = params["expression"].as_str().unwrap_or_default();
        if expression.is_empty() {
            return Ok(ToolOutcome::failure("Missing 'expression' parameter"));
        }

        match evaluate(expression) {
            Ok(v) => Ok(ToolOutcome::success(number_value(v))),
            Err(e) => Ok(ToolOutcome::failure(format!(
                "Invalid expression '{expression}': {e}"
            ))),
        }
    }
}

/// Evaluates an arithmetic expression string.
fn evaluate(input: &str) -> Result<f64, String> {
    let tokens: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected character '{}'", parser.tokens[parser.pos]));
    }
    Ok(value)
}

struct Parser {
    tokens: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.pos += 1;
                    value += self.term()?;
                }
                '-' => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                '/' => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                if self.peek() != Some(')') {
                    return Err("missing closing parenthesis".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("unexpected character '{c}'")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.tokens[start..self.pos].iter().collect();
        text.parse::<f64>().map_err(|_| format!("invalid number '{text}'"))
    }
}

/// Web search stub. Returns deterministic placeholder results in the shape
/// a real search integration would produce.
pub struct WebSearchTool {
    spec: ToolSpec,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec {
                name: "web_search".to_string(),
                description: "Search the web for information".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Search query"},
                        "num_results": {
                            "type": "integer",
                            "default": 5,
                            "description": "Number of results to return"
                        }
                    },
                    "required": ["query"]
                }),
                category: "builtin".to_string(),
            },
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn run(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> TandemResult<ToolOutcome> {
        let query = params["query"].as_str().unwrap_or_default();
        if query.is_empty() {
            return Ok(ToolOutcome::failure("Missing 'query' parameter"));
        }
        let num_results = params["num_results"].as_u64().unwrap_or(5).min(20) as usize;

        let results: Vec<serde_json::Value> = (0..num_results)
            .map(|i| {
                serde_json::json!({
                    "title": format!("Result {} for {}", i + 1, query),
                    "url": format!("https://example.com/result-{}", i + 1),
                    "snippet": format!("This is a snippet for result {}", i + 1),
                })
            })
            .collect();

        Ok(ToolOutcome::success(serde_json::json!({
            "query": query,
            "results": results,
        })))
    }
}

/// Text analyzer: word counts, naive sentiment, Flesch readability.
pub struct TextAnalyzerTool {
    spec: ToolSpec,
}

impl TextAnalyzerTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec {
                name: "text_analyzer".to_string(),
                description: "Analyze text for various properties".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "text": {"type": "string", "description": "Text to analyze"},
                        "analysis_type": {
                            "type": "string",
                            "enum": ["word_count", "sentiment", "readability"],
                            "description": "Type of analysis to perform"
                        }
                    },
                    "required": ["text", "analysis_type"]
                }),
                category: "builtin".to_string(),
            },
        }
    }
}

impl Default for TextAnalyzerTool {
    fn default() -> Self {
        Self::new()
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "fantastic", "love", "like", "happy",
    "joy",
];
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "dislike", "sad", "angry", "frustrated", "disappointed",
];

fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

fn syllable_estimate(word: &str) -> usize {
    word.chars()
        .filter(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
        .count()
        .max(1)
}

fn analyze(text: &str, analysis_type: &str) -> serde_json::Value {
    match analysis_type {
        "word_count" => {
            let words = text.split_whitespace().count();
            let sentences = sentence_count(text);
            serde_json::json!({
                "words": words,
                "characters": text.chars().count(),
                "characters_no_spaces": text.chars().filter(|c| *c != ' ').count(),
                "sentences": sentences,
                "avg_words_per_sentence": words as f64 / sentences.max(1) as f64,
            })
        }
        "sentiment" => {
            let lower = text.to_lowercase();
            let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
            let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
            let sentiment = match positive.cmp(&negative) {
                std::cmp::Ordering::Greater => "positive",
                std::cmp::Ordering::Less => "negative",
                std::cmp::Ordering::Equal => "neutral",
            };
            let word_total = text.split_whitespace().count().max(1);
            serde_json::json!({
                "sentiment": sentiment,
                "positive_indicators": positive,
                "negative_indicators": negative,
                "confidence": positive.abs_diff(negative) as f64 / word_total as f64,
            })
        }
        "readability" => {
            let words: Vec<&str> = text.split_whitespace().collect();
            let sentences = sentence_count(text);
            let syllables: usize = words.iter().map(|w| syllable_estimate(w)).sum();

            let (score, level) = if sentences > 0 && !words.is_empty() {
                let score = 206.835
                    - 1.015 * (words.len() as f64 / sentences as f64)
                    - 84.6 * (syllables as f64 / words.len() as f64);
                let level = match score {
                    s if s >= 90.0 => "Very Easy",
                    s if s >= 80.0 => "Easy",
                    s if s >= 70.0 => "Fairly Easy",
                    s if s >= 60.0 => "Standard",
                    s if s >= 50.0 => "Fairly Difficult",
                    s if s >= 30.0 => "Difficult",
                    _ => "Very Difficult",
                };
                (score, level)
            } else {
                (0.0, "Unknown")
            };

            serde_json::json!({
                "flesch_score": (score * 100.0).round() / 100.0,
                "reading_level": level,
                "avg_sentence_length": words.len() as f64 / sentences.max(1) as f64,
                "avg_syllables_per_word": syllables as f64 / words.len().max(1) as f64,
            })
        }
        _ => serde_json::json!({"error": "Unknown analysis type"}),
    }
}

#[async_trait]
impl Tool for TextAnalyzerTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn run(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> TandemResult<ToolOutcome> {
        let text = params["text"].as_str().unwrap_or_default();
        let analysis_type = params["analysis_type"].as_str().unwrap_or_default();
        if text.is_empty() || analysis_type.is_empty() {
            return Ok(ToolOutcome::failure(
                "Both 'text' and 'analysis_type' parameters are required",
            ));
        }
        Ok(ToolOutcome::success(analyze(text, analysis_type)))
    }
}
