use tracing::info;

use super::comment::with_hidden_instruction;
use crate::bot::{Current, Io};
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};
use crate::instructions::{Instruction, InstructionKind};

pub fn absorb(current: &mut Current, instruction: &Instruction) {
    if instruction.kind() == InstructionKind::ReportDone {
        current.report_done = true;
    }
}

/// Summarises failed contexts of a branch tip, once.
///
/// Pull requests already show failures next to the change, so only branch
/// heads get a report.
pub async fn decide<H, R>(current: &mut Current, io: &Io<'_, H, R>) -> Result<(), EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    if !current.head.is_branch() || current.report_done {
        return Ok(());
    }

    let failed: Vec<_> = current
        .statuses
        .values()
        .filter(|status| status.state.is_failed())
        .collect();
    if failed.is_empty() {
        return Ok(());
    }

    let mut body = format!(
        "Builds of `{}` failed at {}:\n",
        current.head.short_ref(),
        current.head.sha.short()
    );
    for status in &failed {
        match &status.target_url {
            Some(url) => body.push_str(&format!("\n- [{}]({}) {}", status.context, url, status.state)),
            None => body.push_str(&format!("\n- {} {}", status.context, status.state)),
        }
    }

    info!(head = %current.head, failed = failed.len(), "Reporting failures");
    io.post_comment(&current.head.id, with_hidden_instruction(&body, "report-done"))
        .await?;
    current.report_done = true;
    Ok(())
}
