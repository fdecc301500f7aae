//! Wall-clock to election-schedule mapping.
//!
//! The schedule is pure arithmetic over Unix time: cycles tile the timeline,
//! each cycle is divided into one period per delegate, and the period index
//! names the delegate expected to propose.

use crate::config::DposConfig;

/// The schedule position for a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    /// Rotation index of the delegate whose period covers the time.
    pub node_index: u32,
    /// Cycle number.
    pub cycle: i64,
    /// First second of the cycle.
    pub cycle_start: i64,
    /// Last second of the cycle.
    pub cycle_stop: i64,
    /// First second of the period.
    pub period_start: i64,
    /// Last second of the period.
    pub period_stop: i64,
}

/// Compute the schedule position for `now`.
pub fn decide_task_by_time(now: i64, cfg: &DposConfig) -> Task {
    let cycle_len = cfg.cycle_secs();
    let period_len = cfg.period_secs();

    let cycle = now.div_euclid(cycle_len);
    let cycle_start = cycle * cycle_len;
    let cycle_stop = cycle_start + cycle_len - 1;

    let node_index = ((now - cycle_start) / period_len) as u32;
    let period_start = cycle_start + node_index as i64 * period_len;
    let period_stop = period_start + period_len - 1;

    Task {
        node_index,
        cycle,
        cycle_start,
        cycle_stop,
        period_start,
        period_stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DposConfig {
        DposConfig {
            delegate_num: 4,
            block_interval: 1,
            continue_block_num: 6,
            ..Default::default()
        }
    }

    #[test]
    fn start_of_cycle_maps_to_first_delegate() {
        let task = decide_task_by_time(240, &cfg());
        assert_eq!(task.cycle, 10);
        assert_eq!(task.cycle_start, 240);
        assert_eq!(task.cycle_stop, 263);
        assert_eq!(task.node_index, 0);
        assert_eq!(task.period_start, 240);
        assert_eq!(task.period_stop, 245);
    }

    #[test]
    fn mid_cycle_maps_to_rotated_delegate() {
        // Second 255 is 15s into cycle 10, i.e. period index 2.
        let task = decide_task_by_time(255, &cfg());
        assert_eq!(task.node_index, 2);
        assert_eq!(task.period_start, 252);
        assert_eq!(task.period_stop, 257);
    }

    #[test]
    fn last_second_of_cycle() {
        let task = decide_task_by_time(263, &cfg());
        assert_eq!(task.cycle, 10);
        assert_eq!(task.node_index, 3);
        assert_eq!(task.period_stop, task.cycle_stop);
    }

    #[test]
    fn same_second_same_task() {
        let a = decide_task_by_time(1_000_000, &cfg());
        let b = decide_task_by_time(1_000_000, &cfg());
        assert_eq!(a, b);
    }
}
