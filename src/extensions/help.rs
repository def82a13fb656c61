use super::comment::{mentions, with_hidden_instruction};
use crate::bot::{Current, Io};
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};
use crate::instructions::{Instruction, InstructionKind};

const MANUAL: &str = "\
You can steer builds with `jenkins:` instructions in comments:

- `jenkins: skip` skips every job; `skip: [pattern, ...]` skips matching jobs.
- `jenkins: {jobs: [pattern, -pattern, ...]}` builds only matching jobs.
- `jenkins: rebuild` rebuilds failed jobs.
- `jenkins: reset-errors` acknowledges reported errors.
- `jenkins: help` shows this message.

Patterns are regular expressions searched in job names. `*` matches any job
and a leading `-` excludes.";

pub fn absorb(current: &mut Current, instruction: &Instruction) {
    match instruction.kind() {
        InstructionKind::Help => {
            current.help_mentions.insert(instruction.author.clone());
        }
        InstructionKind::HelpReset => current.help_mentions.clear(),
        _ => {}
    }
}

/// Answers pending help requests in a single comment.
pub async fn decide<H, R>(current: &mut Current, io: &Io<'_, H, R>) -> Result<(), EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    if current.help_mentions.is_empty() {
        return Ok(());
    }
    let body = format!("{}: {}", mentions(&current.help_mentions), MANUAL);
    io.post_comment(&current.head.id, with_hidden_instruction(&body, "help-reset"))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{RecordingHost, RecordingRunner};
    use crate::settings::Settings;
    use crate::test_utils::{at, pr_head};
    use tokio_util::sync::CancellationToken;

    fn asked(login: &str, name: &str, hour: i64) -> Instruction {
        Instruction::new(name, vec![], login, at(hour))
    }

    #[tokio::test]
    async fn compute_help() {
        let mut current = Current::new(pr_head(1, "pr", "d0d0"), Settings::default());

        absorb(&mut current, &asked("asker", "help", 1));
        assert!(current.help_mentions.contains("asker"));

        absorb(&mut current, &asked("asker1", "help", 2));
        absorb(&mut current, &asked("bot", "help-reset", 3));
        assert!(current.help_mentions.is_empty());

        absorb(&mut current, &asked("asker1", "help", 4));
        absorb(&mut current, &asked("asker2", "man", 5));

        let host = RecordingHost::default();
        let runner = RecordingRunner::default();
        let io = Io::new(&host, &runner, CancellationToken::new());
        decide(&mut current, &io).await.unwrap();

        let comments = host.posted_comments();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("@asker1"));
        assert!(comments[0].contains("@asker2"));
        assert!(comments[0].contains("jenkins: help-reset"));
    }

    #[tokio::test]
    async fn nothing_asked() {
        let mut current = Current::new(pr_head(1, "pr", "d0d0"), Settings::default());
        let host = RecordingHost::default();
        let runner = RecordingRunner::default();
        let io = Io::new(&host, &runner, CancellationToken::new());

        decide(&mut current, &io).await.unwrap();

        assert!(host.effects().is_empty());
    }
}
