use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::API_PREFIX;
use crate::domain::TaskStatus;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

pub fn auth_signup(base: &str) -> String {
    base_join(base, &format!("{}/auth/signup", API_PREFIX))
}
pub fn auth_login(base: &str) -> String {
    base_join(base, &format!("{}/auth/login", API_PREFIX))
}
pub fn auth_logout(base: &str) -> String {
    base_join(base, &format!("{}/auth/logout", API_PREFIX))
}
pub fn tasks(base: &str) -> String {
    base_join(base, &format!("{}/tasks", API_PREFIX))
}
pub fn tasks_by_status(base: &str, status: TaskStatus) -> String {
    format!("{}?status={}", tasks(base), status.as_str())
}
pub fn task(base: &str, task_id: &str) -> String {
    base_join(base, &format!("{}/tasks/{}", API_PREFIX, enc(task_id)))
}
pub fn task_complete(base: &str, task_id: &str) -> String {
    format!("{}/complete", task(base, task_id))
}
pub fn task_review(base: &str, task_id: &str) -> String {
    format!("{}/review", task(base, task_id))
}
pub fn child_tasks(base: &str, child_id: &str) -> String {
    base_join(
        base,
        &format!("{}/children/{}/tasks", API_PREFIX, enc(child_id)),
    )
}
pub fn child_xp(base: &str, child_id: &str) -> String {
    base_join(base, &format!("{}/children/{}/xp", API_PREFIX, enc(child_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_and_encodes() {
        assert_eq!(tasks("http://h:1/"), "http://h:1/api/tasks");
        assert_eq!(
            tasks_by_status("", TaskStatus::Completed),
            "/api/tasks?status=completed"
        );
        assert_eq!(task_review("", "a b"), "/api/tasks/a%20b/review");
        assert_eq!(child_xp("http://h", "c-1"), "http://h/api/children/c%2D1/xp");
    }
}
