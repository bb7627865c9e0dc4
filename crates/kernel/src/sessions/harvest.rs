use std::time::Duration;

use agent_core::Instruction;
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::runner::StepRunner;
use super::task::{ScriptContext, ScriptOutput, SessionScript};
use crate::extraction::ExtractionEngine;

/// Page-load wait followed by one extraction instruction.
#[derive(Clone, Debug)]
pub struct HarvestScript {
    engine: ExtractionEngine,
    item_description: String,
    settle_delay: Duration,
    step_budget: u32,
}

impl HarvestScript {
    pub fn new(
        engine: ExtractionEngine,
        item_description: impl Into<String>,
        settle_delay: Duration,
        step_budget: u32,
    ) -> Self {
        Self {
            engine,
            item_description: item_description.into(),
            settle_delay,
            step_budget,
        }
    }

    pub fn wait_prompt(&self) -> String {
        let schema = self.engine.schema();
        format!(
            "Wait for the page to fully load. Look for {} with {}, {} and {} details.",
            self.item_description, schema.name_field, schema.category_field, schema.url_field
        )
    }

    pub fn extraction_prompt(&self) -> String {
        let schema = self.engine.schema();
        format!(
            "Extract ALL {items} visible on this page. For each one provide:\n\
             1. {name}: the full name shown\n\
             2. {url}: the complete URL the card links to (use the href attribute)\n\
             3. {category}: the category label shown on the card\n\n\
             Output valid JSON objects, one per line, exactly in this format:\n\
             {example}\n\n\
             Include every item on the current page and output only JSON, no other text.",
            items = self.item_description,
            name = schema.name_field,
            url = schema.url_field,
            category = schema.category_field,
            example = schema.example_line(),
        )
    }
}

#[async_trait]
impl SessionScript for HarvestScript {
    fn name(&self) -> &'static str {
        "harvest"
    }

    async fn run(
        &self,
        steps: &mut StepRunner<'_>,
        ctx: ScriptContext<'_>,
    ) -> Result<ScriptOutput, String> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        steps
            .invoke(Instruction::new(self.wait_prompt()).with_step_budget(self.step_budget))
            .await
            .map_err(|err| format!("page did not load: {err}"))?;

        let reply = steps
            .invoke(Instruction::new(self.extraction_prompt()).with_step_budget(self.step_budget))
            .await
            .map_err(|err| format!("extraction instruction failed: {err}"))?;
        let text = match (&reply.parsed_value, reply.raw_text.trim().is_empty()) {
            (Some(value), true) => value.to_string(),
            _ => reply.raw_text,
        };

        let extraction = self.engine.extract(&text, ctx.known);
        debug!(
            page_target = %ctx.target,
            strategy = ?extraction.strategy,
            accepted = extraction.records.len(),
            rejected = extraction.rejected,
            duplicates = extraction.duplicates,
            "extraction finished"
        );

        let captured_at = Utc::now();
        let records = extraction
            .records
            .into_iter()
            .map(|record| {
                let record = record.with_captured_at(captured_at);
                match ctx.target.page() {
                    Some(page) => record.with_page_number(page),
                    None => record,
                }
            })
            .collect();
        Ok(ScriptOutput {
            records,
            duplicates: extraction.duplicates,
        })
    }
}
