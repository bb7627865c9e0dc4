#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actharvest_kernel::artifacts::ArtifactWriter;
use actharvest_kernel::{ExtractionEngine, HarvestScript, SessionTask};
use agent_core::{OracleReply, ScriptCall};

pub fn session_task(dir: &Path) -> SessionTask {
    SessionTask::new(ArtifactWriter::new(dir.join("audit")), Duration::from_secs(5))
}

pub fn harvest_script() -> HarvestScript {
    HarvestScript::new(ExtractionEngine::default(), "hero cards", Duration::ZERO, 10)
}

/// Two records per page, named after the page: `P<n>-a`, `P<n>-b`.
pub fn page_payload(page: usize) -> String {
    format!(
        "Sure, here they are:\n{{\"name\":\"P{page}-a\",\"profile_url\":\"https://x/{page}/a\",\"subject\":\"Serverless\"}}\n{{\"name\":\"P{page}-b\",\"profile_url\":\"https://x/{page}/b\",\"subject\":\"Data\"}}"
    )
}

pub fn is_extraction(call: &ScriptCall<'_>) -> bool {
    call.instruction.prompt.starts_with("Extract ALL")
}

pub fn is_continuation(call: &ScriptCall<'_>) -> bool {
    call.instruction.prompt.contains("pagination controls")
}

/// Responder for a single session that walks pages in order and always
/// answers `continuation` when asked about a next page.
pub fn paging_responder(
    continuation: &'static str,
) -> impl Fn(&ScriptCall<'_>) -> Result<OracleReply, agent_core::AgentError> + Send + Sync + 'static
{
    let page = Arc::new(AtomicUsize::new(0));
    move |call: &ScriptCall<'_>| {
        if is_extraction(call) {
            let n = page.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(OracleReply::text(page_payload(n)))
        } else if is_continuation(call) {
            Ok(OracleReply::text(continuation))
        } else {
            Ok(OracleReply::text("The page has loaded."))
        }
    }
}

/// Page number encoded in a `...?page=N` URL.
pub fn page_of(url: &str) -> usize {
    url.rsplit('=')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}
