//! Error reporting.

use tracing::info;

use super::comment::with_hidden_instruction;
use crate::bot::{Current, Io};
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};
use crate::instructions::{Instruction, InstructionKind};

pub fn absorb(current: &mut Current, instruction: &Instruction) {
    if instruction.kind() == InstructionKind::ResetErrors {
        let date = instruction.date;
        current.errors_reset_at = Some(current.errors_reset_at.map_or(date, |at| at.max(date)));
        current.errors.retain(|e| e.date >= date);
    }
}

/// Posts one comment per error not yet acknowledged by a `reset-errors`.
pub async fn decide<H, R>(current: &mut Current, io: &Io<'_, H, R>) -> Result<(), EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    if let Some(reset_at) = current.errors_reset_at {
        current.errors.retain(|e| e.date >= reset_at);
    }

    for error in &current.errors {
        info!(message = %error.message, "Reporting error");
        let body = format!("Sorry, I failed to process this:\n\n```\n{}\n```", error.message);
        io.post_comment(&current.head.id, with_hidden_instruction(&body, "reset-errors"))
            .await?;
    }
    Ok(())
}
