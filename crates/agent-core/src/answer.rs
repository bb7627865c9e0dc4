use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::oracle::OracleReply;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("word pattern"));

const AFFIRMATIVE: &[&str] = &["YES", "TRUE", "AFFIRMATIVE"];
const NEGATIVE: &[&str] = &["NO", "NOT", "NONE", "FALSE"];

/// Reading of a free-text yes/no answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerClass {
    Affirmative,
    Negative,
    Unparseable,
}

impl AnswerClass {
    /// Only an explicit yes lets a caller proceed.
    pub fn proceeds(self) -> bool {
        matches!(self, AnswerClass::Affirmative)
    }
}

/// Classify free text by whole-word keyword match.
///
/// A negative token wins over an affirmative one, so "yes, but there is no
/// next page" stops. Text with neither is unparseable.
pub fn classify_answer(text: &str) -> AnswerClass {
    let mut affirmative = false;
    for word in WORD.find_iter(text) {
        let token = word.as_str().to_ascii_uppercase();
        if NEGATIVE.contains(&token.as_str()) {
            return AnswerClass::Negative;
        }
        if AFFIRMATIVE.contains(&token.as_str()) {
            affirmative = true;
        }
    }
    if affirmative {
        AnswerClass::Affirmative
    } else {
        AnswerClass::Unparseable
    }
}

/// Prefer a shape-conforming boolean, fall back to keyword matching.
pub fn classify_reply(reply: &OracleReply) -> AnswerClass {
    match reply.as_bool() {
        Some(true) => AnswerClass::Affirmative,
        Some(false) => AnswerClass::Negative,
        None => classify_answer(&reply.raw_text),
    }
}
