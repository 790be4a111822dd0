use tracing::debug;

use super::ActionContext;
use crate::result::ExecutionResult;

pub(super) fn succeed() -> ExecutionResult {
    ExecutionResult::success()
}

pub(super) fn abort(message: &str, ctx: &ActionContext<'_>) -> ExecutionResult {
    let message = ctx.variables.substitute(message);
    debug!(workflow = %ctx.workflow, action = %ctx.action, message = %message, "abort");
    ExecutionResult::failure(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use sluice_config::Variables;

    #[test]
    fn test_abort_substitutes_variables() {
        let mut vars = Variables::new();
        vars.set("TABLE", "orders");
        let previous = ExecutionResult::success();
        let ctx = ActionContext {
            workflow: "wf",
            action: "Abort",
            previous: &previous,
            variables: &vars,
            stop: &AtomicBool::new(false),
        };

        let result = abort("missing ${TABLE} in ${SCHEMA}", &ctx);
        assert!(!result.result);
        assert_eq!(result.error.as_deref(), Some("missing orders in ${SCHEMA}"));
    }
}
