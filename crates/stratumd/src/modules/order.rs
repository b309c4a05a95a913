use std::cmp::Ordering;

use stratum_config::ModuleOrder;

use super::Module;

/// Sorts `modules` by `order` and assigns priorities `0..n`, lowest first.
///
/// The directory name breaks every tie, so the ranking is total and
/// reproducible across scans.
pub(crate) fn rank(modules: &mut [Module], order: ModuleOrder) {
    modules.sort_by(|left, right| compare(left, right, order));
    for (priority, module) in (0_u32..).zip(modules.iter_mut()) {
        module.priority = priority;
    }
}

fn compare(left: &Module, right: &Module, order: ModuleOrder) -> Ordering {
    let primary = match order {
        ModuleOrder::InstallTime => left.installed_at.cmp(&right.installed_at),
        ModuleOrder::Name => Ordering::Equal,
        ModuleOrder::Weight => left.info.weight.cmp(&right.info.weight),
    };
    primary.then_with(|| left.name.cmp(&right.name))
}
