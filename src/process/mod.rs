//! Process management utilities.

mod control;
mod tracker;

pub use control::{
    apply_new_session, feed_stdin, open_operation_log, read_log_lossy, run_tail_window,
    run_with_timeout, tail_lines, TailOutput,
};
pub use tracker::{OperationGuard, OperationState, OperationTracker};
