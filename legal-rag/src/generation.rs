//! Grounded answer generation.
//!
//! The [`AnswerGenerator`] turns a question and its retrieved chunks into a
//! single prompt that confines the model to that context, then normalizes
//! the reply. A reply meaning "the context does not say" always comes back
//! as the exact [`NOT_IN_CONTEXT`] sentinel; a failed model call comes back
//! as an error. Callers rely on the two staying distinct.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, error, info};

use crate::document::{AnswerResult, Chunk};
use crate::error::{RagError, Result};
use crate::timeout::with_timeout;

/// The fixed reply for questions the supplied context cannot answer.
pub const NOT_IN_CONTEXT: &str = "Not in context";

/// Whole lines left behind by PDF extraction: dashed page numbers
/// (`- 12 -`), `Page 3 of 10`, and running bill headers (`•HR 3684 EH`).
static RESIDUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[ \t]*(?:",
        r"-[ \t]*\d{1,4}[ \t]*-",
        r"|(?i:page)[ \t]+\d+(?:[ \t]+(?i:of)[ \t]+\d+)?",
        r"|[•·]?[ \t]*(?:H\.?[ \t]?R\.?|S\.)[ \t]*\d+[ \t]+[A-Z]{2,3}",
        r")[ \t]*$",
    ))
    .expect("residue pattern is valid")
});

/// A line holding nothing but a short number: a page or line number, or a
/// figure the extractor split off its sentence.
static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\d{1,4}[ \t]*$").expect("number pattern is valid"));

/// A generative language model: prompt in, text out.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::GenerativeModel;
///
/// let reply = model.generate("Answer using only the context...").await?;
/// ```
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model name used in logs and errors.
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Normalize chunk text extracted from a PDF before it enters a prompt.
///
/// Control characters other than newlines become spaces, page-number and
/// running-header residue lines are dropped, and every whitespace run
/// collapses to a single space. The result is a fixed point of these steps,
/// so cleaning already-clean text returns it unchanged.
///
/// A line that is only a number is dropped as a page or line number unless
/// it sits inside a sentence: the line before ends mid-sentence and the line
/// after continues in lowercase (`may not exceed\n25\npercent`). There the
/// number is kept, since it is more likely a split-off figure.
pub fn clean_chunk_text(text: &str) -> String {
    let mut current = clean_pass(text);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(text: &str) -> String {
    let visible: String =
        text.chars().map(|c| if c.is_control() && c != '\n' { ' ' } else { c }).collect();
    let lines: Vec<&str> = visible.split('\n').collect();

    let kept: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|&(i, line)| {
            if RESIDUE_LINE.is_match(line) {
                return false;
            }
            !BARE_NUMBER.is_match(line) || inside_sentence(&lines, i)
        })
        .map(|(_, line)| *line)
        .collect();

    kept.iter().flat_map(|line| line.split_whitespace()).collect::<Vec<_>>().join(" ")
}

/// Whether line `i` is wedged between an unfinished sentence and its
/// lowercase continuation.
fn inside_sentence(lines: &[&str], i: usize) -> bool {
    let before = lines[..i].iter().rev().map(|l| l.trim()).find(|l| !l.is_empty());
    let after = lines[i + 1..].iter().map(|l| l.trim()).find(|l| !l.is_empty());

    let open = before
        .and_then(|l| l.chars().last())
        .is_some_and(|c| c.is_alphanumeric() || matches!(c, ',' | '$' | '('));
    let continues = after
        .and_then(|l| l.chars().next())
        .is_some_and(|c| c.is_lowercase() || matches!(c, '%' | ')'));
    open && continues
}

/// Build the grounded prompt for `question` from `context` chunks.
///
/// Only the supplied chunks appear in the prompt, cleaned and labelled with
/// their IDs and pages, in the order given.
pub fn build_prompt(question: &str, context: &[Chunk]) -> String {
    let mut prompt = String::from(
        "You answer questions about a legal document using only the context below.\n\
         \n\
         Rules:\n\
         1. Use only facts stated in the context. Do not use outside knowledge.\n\
         2. Quote numbers, monetary amounts, percentages, and dates exactly as written in \
         the context. Do not round, convert, or paraphrase them.\n",
    );
    prompt.push_str(&format!(
        "3. If the context does not contain the answer, reply with exactly: {NOT_IN_CONTEXT}\n\n"
    ));
    prompt.push_str("Context:\n");

    for chunk in context {
        let pages =
            chunk.pages.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");
        prompt.push_str(&format!("[{} | pages {pages}]\n", chunk.id));
        prompt.push_str(&clean_chunk_text(&chunk.text));
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!("Question: {}\nAnswer:", question.trim()));
    prompt
}

/// Map the model's reply onto an answer, folding sentinel variants
/// (`"not in context."`, `` `Not in context` ``) into [`NOT_IN_CONTEXT`].
fn normalize_reply(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return None;
    }
    let bare = trimmed
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*'))
        .trim_end_matches('.')
        .trim();
    if bare.eq_ignore_ascii_case(NOT_IN_CONTEXT) {
        return Some(NOT_IN_CONTEXT.to_string());
    }
    Some(trimmed.to_string())
}

/// Generates grounded answers with a [`GenerativeModel`].
///
/// Each call issues at most one model request; there is no conversation
/// state between questions.
pub struct AnswerGenerator {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl AnswerGenerator {
    /// Create a generator that waits at most `timeout` for each reply.
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Answer `question` from `context`.
    ///
    /// With no context at all the sentinel is returned without calling the
    /// model.
    ///
    /// # Errors
    ///
    /// - [`RagError::GenerationError`] if the model call fails or returns an
    ///   empty reply
    /// - [`RagError::TimeoutError`] if the model exceeds the deadline
    pub async fn generate(&self, question: &str, context: &[Chunk]) -> Result<AnswerResult> {
        let source_chunk_ids: Vec<String> = context.iter().map(|c| c.id.clone()).collect();

        if context.is_empty() {
            info!("no context supplied, answering with sentinel");
            return Ok(AnswerResult {
                question: question.to_string(),
                answer: NOT_IN_CONTEXT.to_string(),
                source_chunk_ids,
            });
        }

        let prompt = build_prompt(question, context);
        debug!(
            model = self.model.name(),
            prompt_len = prompt.len(),
            context_chunks = context.len(),
            "generating answer"
        );

        let reply = with_timeout("generation", self.timeout, self.model.generate(&prompt))
            .await
            .inspect_err(|e| error!(model = self.model.name(), error = %e, "generation failed"))?;

        let answer = normalize_reply(&reply).ok_or_else(|| {
            error!(model = self.model.name(), "model returned an empty reply");
            RagError::GenerationError {
                model: self.model.name().to_string(),
                message: "model returned an empty reply".to_string(),
            }
        })?;

        Ok(AnswerResult { question: question.to_string(), answer, source_chunk_ids })
    }
}
