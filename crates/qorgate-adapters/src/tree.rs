//! Process-tree enumeration and forceful termination.

use std::collections::{BTreeSet, VecDeque};

/// Every transitive child of `root` in a `(pid, ppid)` table. `root` itself
/// is not included.
pub fn descendants_of(root: u32, table: &[(u32, u32)]) -> BTreeSet<u32> {
    let mut found = BTreeSet::new();
    let mut queue = VecDeque::from([root]);

    while let Some(parent) = queue.pop_front() {
        for (pid, ppid) in table {
            if *ppid == parent && *pid != root && found.insert(*pid) {
                queue.push_back(*pid);
            }
        }
    }

    found
}

#[cfg(target_os = "linux")]
fn process_table() -> Vec<(u32, u32)> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };

    entries
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().to_str()?.parse::<u32>().ok())
        .filter_map(|pid| {
            let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
            parse_ppid(&stat).map(|ppid| (pid, ppid))
        })
        .collect()
}

/// `pid (comm) state ppid ...`; `comm` may itself contain parentheses.
#[cfg(target_os = "linux")]
fn parse_ppid(stat: &str) -> Option<u32> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_table() -> Vec<(u32, u32)> {
    let Ok(out) = std::process::Command::new("ps")
        .args(["-A", "-o", "pid=", "-o", "ppid="])
        .output()
    else {
        return Vec::new();
    };

    String::from_utf8_lossy(&out.stdout)
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let ppid = fields.next()?.parse().ok()?;
            Some((pid, ppid))
        })
        .collect()
}

/// SIGKILL every descendant of `pid`, then its process group, then `pid`.
///
/// Descendants are enumerated before anything is signalled, while the tree
/// is still intact. Failures (already-exited processes) are ignored.
#[cfg(unix)]
pub(crate) fn kill_tree(pid: libc::pid_t) {
    let descendants = descendants_of(pid as u32, &process_table());
    tracing::debug!(pid, descendants = descendants.len(), "killing process tree");

    for child in &descendants {
        unsafe {
            libc::kill(*child as libc::pid_t, libc::SIGKILL);
        }
    }
    unsafe {
        libc::killpg(pid, libc::SIGKILL);
        libc::kill(pid, libc::SIGKILL);
    }
}

/// Kill what is left of a process group whose leader has already been
/// reaped. Orphans are reparented away from the leader, so only the group
/// still reaches them.
#[cfg(unix)]
pub(crate) fn kill_group(pgid: libc::pid_t) {
    tracing::debug!(pgid, "killing orphaned process group");
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}
