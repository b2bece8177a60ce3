//! Deterministic collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use legal_rag::{EmbeddingProvider, GenerativeModel, NOT_IN_CONTEXT, RagError, Result};

pub const BILL: &str = "A BILL\n\
To establish a clean energy grant program, and for other purposes.\n\
SEC. 1. SHORT TITLE.\n\
This Act may be cited as the Clean Energy Grants Act.\n\
SEC. 2. DEFINITIONS.\n\
In this Act the term Secretary means the Secretary of Energy, and the term eligible entity means a State or unit of local government.\n\
3\n\
SEC. 3. ESTABLISHMENT OF PROGRAM.\n\
The Secretary shall establish a program to award grants to eligible entities for clean energy projects.\n\
SEC. 4. GRANTS.\n\
The amount of a grant awarded under this Act may not exceed $25,000,000.\n\
SEC. 5. REPORTS.\n\
Not later than 1 year after the date of enactment of this Act, the Secretary shall submit a report to Congress.\n\
SEC. 6. AUTHORIZATION OF APPROPRIATIONS.\n\
There is authorized to be appropriated to carry out this Act $500,000,000 for fiscal year 2025.\n";

const STOPWORDS: &[&str] = &[
    "the", "what", "is", "of", "a", "an", "and", "or", "to", "for", "in", "may", "not", "this",
    "that", "be", "by", "under", "are", "there", "how", "which", "who",
];

/// Lowercase content words, with a trailing plural `s` removed.
pub fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .map(|w| match w.strip_suffix('s') {
            Some(stem) if stem.len() >= 3 => stem.to_string(),
            _ => w,
        })
        .collect()
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Bag-of-words embedder: each keyword bumps one hashed dimension.
pub struct KeywordEmbedder {
    pub dimensions: usize,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0f32; self.dimensions];
        for word in keywords(text) {
            vector[(fnv1a(&word) % self.dimensions as u64) as usize] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "keyword-stub"
    }
}

/// Embedder whose query-time vectors have a different length than promised.
pub struct ShrinkingEmbedder {
    pub inner: KeywordEmbedder,
    pub shrink_after: usize,
}

#[async_trait]
impl EmbeddingProvider for ShrinkingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let calls = self.inner.calls.load(Ordering::SeqCst);
        let mut vector = self.inner.embed(text).await?;
        if calls >= self.shrink_after {
            vector.truncate(self.inner.dimensions / 2);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }
}

/// Embedder that never answers within any reasonable deadline.
pub struct SlowEmbedder;

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![1.0; 8])
    }

    fn dimensions(&self) -> usize {
        8
    }
}

/// Keyword embedder that takes `per_call` for every text, and stalls for an
/// hour on any text containing `stall_on`.
pub struct PacedEmbedder {
    pub inner: KeywordEmbedder,
    pub per_call: Duration,
    pub stall_on: Option<&'static str>,
}

#[async_trait]
impl EmbeddingProvider for PacedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let stall = self.stall_on.is_some_and(|needle| text.contains(needle));
        let delay = if stall { Duration::from_secs(3600) } else { self.per_call };
        tokio::time::sleep(delay).await;
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }
}

/// Model that follows the grounding instructions literally: it answers with
/// the context sentence sharing the most keywords with the question, or the
/// sentinel when no sentence shares enough.
#[derive(Default)]
pub struct GroundedModel {
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let from = text.find(start).map_or(0, |i| i + start.len());
    let to = text[from..].find(end).map_or(text.len(), |i| from + i);
    &text[from..to]
}

#[async_trait]
impl GenerativeModel for GroundedModel {
    fn name(&self) -> &str {
        "grounded-stub"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());

        let context = between(prompt, "Context:\n", "\nQuestion: ");
        let question = keywords(between(prompt, "\nQuestion: ", "\nAnswer:"));
        let needed = question.len().min(2);

        let best = context
            .lines()
            .filter(|line| !line.starts_with('['))
            .flat_map(|line| line.split(". "))
            .map(|sentence| {
                let words = keywords(sentence);
                let hits = question.iter().filter(|q| words.contains(q)).count();
                (hits, sentence.trim())
            })
            .filter(|(hits, _)| *hits >= needed && *hits > 0)
            .fold(None::<(usize, &str)>, |best, candidate| match best {
                Some(b) if b.0 >= candidate.0 => Some(b),
                _ => Some(candidate),
            });

        Ok(best.map_or_else(|| NOT_IN_CONTEXT.to_string(), |(_, s)| s.to_string()))
    }
}

/// Model whose every call fails.
#[derive(Default)]
pub struct FailingModel {
    pub calls: AtomicUsize,
}

#[async_trait]
impl GenerativeModel for FailingModel {
    fn name(&self) -> &str {
        "failing-stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::GenerationError {
            model: self.name().to_string(),
            message: "upstream returned 503".to_string(),
        })
    }
}

/// Model that takes an hour to reply.
pub struct SlowModel;

#[async_trait]
impl GenerativeModel for SlowModel {
    fn name(&self) -> &str {
        "slow-stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }
}

/// Model that replies with a fixed string.
pub struct FixedModel(pub &'static str);

#[async_trait]
impl GenerativeModel for FixedModel {
    fn name(&self) -> &str {
        "fixed-stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}
