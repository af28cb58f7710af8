use crate::source::TaskList;

/// Decide whether a list is synced and whether its tasks need the time filter.
///
/// Returns `(include, task_filter)`:
/// - no threshold: every list, tasks unfiltered;
/// - due date at or after the threshold: tasks unfiltered;
/// - due date before the threshold: list skipped;
/// - no due date: list kept, tasks filtered by update time.
pub fn should_include_list(list: &TaskList, threshold: Option<i64>) -> (bool, bool) {
    let Some(threshold) = threshold else {
        return (true, false);
    };
    match list.due_date {
        Some(due) if due >= threshold => (true, false),
        Some(_) => (false, false),
        None => (true, true),
    }
}

/// Folder lists without a start date are never treated as sprints.
pub fn has_start_date(list: &TaskList) -> bool {
    list.start_date.is_some()
}

/// `date_updated_gt` for a list's task fetch.
pub fn task_filter(threshold: Option<i64>, use_task_filter: bool) -> Option<i64> {
    if use_task_filter {
        threshold
    } else {
        None
    }
}
