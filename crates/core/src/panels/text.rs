//! Text panels of WordWeaver: token table, output box, transformer flow.

use crate::tokens::{flow_tokens, word_pills};

pub const NO_OUTPUT: &str = "No output yet.";
pub const NO_TOKENS: &str = "No tokens yet. Type a prompt and click Generate Next Token.";
/// Tokens shown flowing through the transformer view.
pub const FLOW_WINDOW: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRow {
    /// 1-based position.
    pub index: usize,
    pub token: String,
    /// Token id, or `-` when the backend did not send one for this slot.
    pub id: String,
}

pub fn token_table(output: &str, token_ids: &[u32]) -> Vec<TokenRow> {
    word_pills(output)
        .into_iter()
        .enumerate()
        .map(|(i, token)| TokenRow {
            index: i + 1,
            token,
            id: token_ids
                .get(i)
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputView {
    pub last_token: String,
    pub body: String,
}

pub fn output_view(output: &str, last_token: &str) -> OutputView {
    OutputView {
        last_token: last_token.to_string(),
        body: if output.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            output.to_string()
        },
    }
}

/// Last [`FLOW_WINDOW`] output tokens, each keeping its trailing space.
pub fn transformer_flow(output: &str) -> Vec<String> {
    let mut tokens = flow_tokens(output);
    let skip = tokens.len().saturating_sub(FLOW_WINDOW);
    tokens.drain(..skip);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_render_as_dash() {
        let rows = token_table("Once upon a", &[10, 20]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[1].id, "20");
        assert_eq!(rows[2].id, "-");
    }

    #[test]
    fn empty_output_shows_placeholder() {
        assert_eq!(output_view("", "").body, NO_OUTPUT);
        assert_eq!(output_view("Hi there", " there").last_token, " there");
    }

    #[test]
    fn flow_keeps_the_tail() {
        let text: String = (0..30).map(|i| format!("w{i} ")).collect();
        let flow = transformer_flow(text.trim_end());
        assert_eq!(flow.len(), FLOW_WINDOW);
        assert_eq!(flow[0], "w6 ");
        assert_eq!(flow[FLOW_WINDOW - 1], "w29");
    }
}
