use std::fmt::Write as _;
use std::time::{Duration, Instant};

use agent_core::{classify_reply, AgentError, AnswerClass, Instruction, OracleReply, OracleSession};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, warn};

/// One instruction/answer exchange.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub prompt: String,
    pub step_budget: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Drives one session instruction at a time and keeps a transcript.
///
/// Every instruction is bounded by a wall-clock timeout on top of its step
/// budget; expiry surfaces as [`AgentError::Timeout`].
pub struct StepRunner<'a> {
    session: &'a mut dyn OracleSession,
    instruction_timeout: Duration,
    transcript: Vec<TranscriptEntry>,
}

impl<'a> StepRunner<'a> {
    pub fn new(session: &'a mut dyn OracleSession, instruction_timeout: Duration) -> Self {
        Self {
            session,
            instruction_timeout,
            transcript: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub async fn invoke(&mut self, instruction: Instruction) -> Result<OracleReply, AgentError> {
        let started = Instant::now();
        debug!(
            session = self.session.id(),
            steps = instruction.step_budget,
            "invoking oracle instruction"
        );
        let outcome = match timeout(self.instruction_timeout, self.session.invoke(&instruction)).await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(format!(
                "no answer within {}s",
                self.instruction_timeout.as_secs_f64()
            ))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let (response, error) = match &outcome {
            Ok(reply) => (Some(reply.raw_text.clone()), None),
            Err(err) => {
                warn!(session = self.session.id(), %err, "oracle instruction failed");
                (None, Some(err.to_string()))
            }
        };
        self.transcript.push(TranscriptEntry {
            prompt: instruction.prompt,
            step_budget: instruction.step_budget,
            response,
            error,
            elapsed_ms,
        });
        outcome
    }

    /// Ask a yes/no question and classify the answer.
    pub async fn ask(&mut self, question: Instruction) -> Result<AnswerClass, AgentError> {
        let reply = self.invoke(question).await?;
        Ok(classify_reply(&reply))
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn into_transcript(self) -> Vec<TranscriptEntry> {
        self.transcript
    }
}

/// Plain-text rendering used for the raw-output artifact.
pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "### step {} (budget {}, {} ms)",
            index + 1,
            entry.step_budget,
            entry.elapsed_ms
        );
        let _ = writeln!(out, ">>> {}", entry.prompt.trim());
        match (&entry.response, &entry.error) {
            (Some(response), _) => {
                let _ = writeln!(out, "<<< {}", response);
            }
            (None, Some(error)) => {
                let _ = writeln!(out, "!!! {}", error);
            }
            (None, None) => {}
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{OracleConnector, ScriptedConnector};

    #[tokio::test]
    async fn records_answers_and_errors() {
        let connector = ScriptedConnector::new(|call| {
            if call.call_index == 0 {
                Ok(OracleReply::boolean(true))
            } else {
                Err(AgentError::instruction("element missing"))
            }
        });
        let mut session = connector.open("https://example.com").await.unwrap();
        let mut runner = StepRunner::new(session.as_mut(), Duration::from_secs(5));

        let answer = runner.ask(Instruction::question("Ready?")).await.unwrap();
        assert_eq!(answer, AnswerClass::Affirmative);
        assert!(runner.invoke(Instruction::new("Click it")).await.is_err());

        let text = render_transcript(runner.transcript());
        assert!(text.contains(">>> Ready?"));
        assert!(text.contains("!!! instruction failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_answers_time_out() {
        let connector = ScriptedConnector::new(|_| Ok(OracleReply::text("late")))
            .with_latency(Duration::from_secs(60));
        let mut session = connector.open("https://example.com").await.unwrap();
        let mut runner = StepRunner::new(session.as_mut(), Duration::from_secs(1));
        let err = runner.invoke(Instruction::new("Wait")).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
        assert_eq!(runner.transcript().len(), 1);
    }
}
