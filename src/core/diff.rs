// src/core/diff.rs

//! Generic set-difference used by every reconciliation phase: users, groups,
//! group membership, role flags, and per-identifier privilege lists.

/// The outcome of comparing current state against desired state for one
/// entity level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Divergence {
    /// Present in the cluster but absent from the policy.
    pub undefined: Vec<String>,
    /// Declared in the policy but absent from the cluster.
    pub missing: Vec<String>,
}

impl Divergence {
    pub fn count(&self) -> usize {
        self.undefined.len() + self.missing.len()
    }

    pub fn is_synced(&self) -> bool {
        self.count() == 0
    }
}

/// Set difference in both directions. Results are deduplicated, keep the
/// left operand's order, and never contain empty entries.
pub fn diff<A: AsRef<str>, B: AsRef<str>>(current: &[A], desired: &[B]) -> Divergence {
    Divergence {
        undefined: subtract(current, desired),
        missing: subtract(desired, current),
    }
}

/// Like [`diff`], but entities on the `protected` list are exempt from
/// "undefined" (extra) detection. They still participate in desired-state
/// checks.
pub fn diff_excluding<A: AsRef<str>, B: AsRef<str>, C: AsRef<str>>(
    current: &[A],
    desired: &[B],
    protected: &[C],
) -> Divergence {
    let undefined = subtract(current, desired);
    Divergence {
        undefined: subtract(&undefined, protected),
        missing: subtract(desired, current),
    }
}

/// `left - right`, deduplicated, empty strings dropped.
fn subtract<A: AsRef<str>, B: AsRef<str>>(left: &[A], right: &[B]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in left {
        let item = item.as_ref();
        if item.is_empty()
            || right.iter().any(|r| r.as_ref() == item)
            || out.iter().any(|o| o == item)
        {
            continue;
        }
        out.push(item.to_string());
    }
    out
}
