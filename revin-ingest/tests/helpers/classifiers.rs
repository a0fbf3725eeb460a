//! In-process classifiers for driving the pipeline without a network

use async_trait::async_trait;
use revin_ingest::services::{ClassificationKind, Classifier, ClassifyError};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Labels by keyword: "bad"/"slow" → negative, "ok" → neutral, else positive;
/// category is always "app"
pub struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(
        &self,
        kind: ClassificationKind,
        text: &str,
    ) -> Result<String, ClassifyError> {
        Ok(match kind {
            ClassificationKind::Sentiment if text.contains("bad") || text.contains("slow") => {
                "negative".to_string()
            }
            ClassificationKind::Sentiment if text.contains("ok") => "neutral".to_string(),
            ClassificationKind::Sentiment => "positive".to_string(),
            ClassificationKind::Category => "app".to_string(),
        })
    }
}

/// Replays a fixed script of responses, then answers "positive"/"app"
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<String, ClassifyError>>>,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Result<String, ClassifyError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        kind: ClassificationKind,
        _text: &str,
    ) -> Result<String, ClassifyError> {
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        Ok(match kind {
            ClassificationKind::Sentiment => "positive".to_string(),
            ClassificationKind::Category => "app".to_string(),
        })
    }
}
