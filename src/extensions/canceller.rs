use tracing::{info, warn};

use crate::bot::{Current, Io};
use crate::effects::{EffectError, HostInterpreter, RunnerInterpreter};

/// Cancels every build queued by auto-cancellation.
///
/// A failed cancellation is logged; the remaining builds are still cancelled.
pub async fn decide<H, R>(current: &mut Current, io: &Io<'_, H, R>) -> Result<(), EffectError>
where
    H: HostInterpreter,
    R: RunnerInterpreter,
{
    for build in std::mem::take(&mut current.cancel_queue) {
        match io.cancel_build(&build.job, build.id).await {
            Ok(()) => info!(job = %build.job, build = %build.id, "Cancelled outdated build"),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => warn!(job = %build.job, build = %build.id, error = %e, "Failed to cancel build"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{RecordingHost, RecordingRunner};
    use crate::settings::Settings;
    use crate::test_utils::{branch_head, running_build};
    use crate::types::BuildId;
    use chrono::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn failure_does_not_stop_others() {
        let host = RecordingHost::default();
        let runner = RecordingRunner::default();
        let known = running_build("job", 2, "01d", "origin/branch", Duration::minutes(5));
        runner.update(|s| s.builds = vec![known.clone()]);

        let mut current = Current::new(branch_head("branch", "bab1"), Settings::default());
        let unknown = running_build("gone", 1, "01d", "origin/branch", Duration::minutes(5));
        current.cancel_queue = vec![unknown, known];

        let io = Io::new(&host, &runner, CancellationToken::new());
        decide(&mut current, &io).await.unwrap();

        assert!(current.cancel_queue.is_empty());
        assert_eq!(
            runner.cancelled(),
            vec![("gone".to_string(), BuildId(1)), ("job".to_string(), BuildId(2))]
        );
        assert!(!runner.state().builds[0].running);
    }
}
