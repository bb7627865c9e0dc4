use std::time::Duration;

use agent_core::{AgentError, AnswerClass, Instruction};
use async_trait::async_trait;
use tracing::{debug, info};

use super::runner::StepRunner;
use super::task::{ScriptContext, ScriptOutput, SessionScript};

/// Step budgets for the connection-request flow.
#[derive(Clone, Copy, Debug)]
pub struct OutreachBudgets {
    pub captcha: u32,
    pub check: u32,
    pub click: u32,
}

impl Default for OutreachBudgets {
    fn default() -> Self {
        Self {
            captcha: 2,
            check: 3,
            click: 5,
        }
    }
}

/// Sends a connection request from a profile page.
///
/// The control may sit behind a "More" menu; absence of either is a failure.
/// A visible captcha also fails the task since nobody is there to solve it.
#[derive(Clone, Debug)]
pub struct OutreachScript {
    budgets: OutreachBudgets,
    settle_delay: Duration,
}

impl OutreachScript {
    pub fn new(budgets: OutreachBudgets, settle_delay: Duration) -> Self {
        Self {
            budgets,
            settle_delay,
        }
    }

    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    async fn check(
        &self,
        steps: &mut StepRunner<'_>,
        prompt: &str,
        budget: u32,
    ) -> Result<AnswerClass, String> {
        steps
            .ask(Instruction::question(prompt).with_step_budget(budget))
            .await
            .map_err(describe)
    }

    async fn click(&self, steps: &mut StepRunner<'_>, prompt: &str) -> Result<(), String> {
        steps
            .invoke(Instruction::new(prompt).with_step_budget(self.budgets.click))
            .await
            .map(|_| ())
            .map_err(describe)
    }
}

fn describe(err: AgentError) -> String {
    err.to_string()
}

#[async_trait]
impl SessionScript for OutreachScript {
    fn name(&self) -> &'static str {
        "outreach"
    }

    async fn run(
        &self,
        steps: &mut StepRunner<'_>,
        ctx: ScriptContext<'_>,
    ) -> Result<ScriptOutput, String> {
        self.settle().await;

        let captcha = self
            .check(steps, "Is there a captcha on the screen?", self.budgets.captcha)
            .await?;
        if captcha == AnswerClass::Affirmative {
            return Err("captcha detected on the profile page".to_string());
        }

        let direct = self
            .check(
                steps,
                "Can you see a Connect button on this profile page?",
                self.budgets.check,
            )
            .await?;
        if !direct.proceeds() {
            debug!(page_target = %ctx.target, "connect not visible, trying the More menu");
            let more = self
                .check(
                    steps,
                    "Can you see a 'More' button on this profile page?",
                    self.budgets.check,
                )
                .await?;
            if !more.proceeds() {
                return Err("neither a Connect nor a More button is visible".to_string());
            }
            self.click(steps, "Click the 'More' button").await?;
            self.settle().await;
            let in_menu = self
                .check(
                    steps,
                    "Can you see a Connect button in the menu that appeared?",
                    self.budgets.check,
                )
                .await?;
            if !in_menu.proceeds() {
                return Err("no Connect option in the More menu".to_string());
            }
        }

        self.click(steps, "Click the Connect button to send a connection request")
            .await?;
        self.settle().await;
        self.click(
            steps,
            "Click 'Send' or 'Send invitation' to send the connection request without adding a personal message",
        )
        .await?;

        let confirmed = self
            .check(
                steps,
                "Was the connection request sent successfully? Look for confirmation messages or changes on the page.",
                self.budgets.check,
            )
            .await?;
        if !confirmed.proceeds() {
            return Err(format!(
                "connection request was not confirmed (answer: {confirmed:?})"
            ));
        }
        info!(page_target = %ctx.target, "connection request sent");
        Ok(ScriptOutput::default())
    }
}
