//! Successor selection after an action completes.

use crate::meta::WorkflowHopMeta;

/// Pick the hops to follow after an action finished with `result`.
///
/// Disabled hops are never followed. With `single_hop_always`, a lone
/// enabled hop is taken whatever its flags. Otherwise a hop is eligible when
/// it is unconditional or its evaluation matches the result. Every eligible
/// hop is returned, in the order given; more than one means fan-out.
pub fn select_successors<'a, I>(hops: I, result: bool, single_hop_always: bool) -> Vec<&'a WorkflowHopMeta>
where
    I: IntoIterator<Item = &'a WorkflowHopMeta>,
{
    let enabled: Vec<&WorkflowHopMeta> = hops.into_iter().filter(|h| h.enabled).collect();
    if single_hop_always && enabled.len() == 1 {
        return enabled;
    }
    enabled
        .into_iter()
        .filter(|h| h.is_eligible(result))
        .collect()
}
