use std::collections::HashSet;

/// Static set of user IDs allowed to run privileged commands.
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    ids: HashSet<String>,
}

impl AdminList {
    /// Parses a comma separated list such as `"123, 456"`. Blank entries are skipped.
    pub fn parse(raw: &str) -> AdminList {
        let ids = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        AdminList { ids }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.ids.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}
