use std::collections::HashMap;

/// Groups of user actions whose responses supersede each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionFamily {
    Connect,
    Extract,
    Samples,
    Generate,
    Execute,
    SampleMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    family: ActionFamily,
    sequence: u64,
}

impl RequestToken {
    #[must_use]
    pub fn family(self) -> ActionFamily {
        self.family
    }

    #[must_use]
    pub fn sequence(self) -> u64 {
        self.sequence
    }
}

/// Whether a completed request was allowed to update the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current,
    Stale,
}

/// Issues monotonically increasing tokens per action family. Only the latest
/// token of a family is current; older in-flight requests still complete but
/// their responses are dropped.
#[derive(Debug, Default)]
pub struct RequestTokens {
    nonce: u64,
    latest: HashMap<ActionFamily, u64>,
}

impl RequestTokens {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, family: ActionFamily) -> RequestToken {
        self.nonce = self.nonce.saturating_add(1);
        self.latest.insert(family, self.nonce);
        RequestToken {
            family,
            sequence: self.nonce,
        }
    }

    #[must_use]
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.get(&token.family) == Some(&token.sequence)
    }

    #[must_use]
    pub fn in_flight(&self, family: ActionFamily) -> bool {
        self.latest.contains_key(&family)
    }

    /// Marks the token's request as settled. Returns whether it was current.
    pub fn settle(&mut self, token: RequestToken) -> Applied {
        if self.is_current(token) {
            self.latest.remove(&token.family);
            Applied::Current
        } else {
            Applied::Stale
        }
    }

    /// Turns every outstanding request of `family` stale.
    pub fn invalidate(&mut self, family: ActionFamily) {
        self.latest.remove(&family);
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionFamily, Applied, RequestTokens};

    #[test]
    fn latest_token_wins_and_older_one_is_stale() {
        let mut tokens = RequestTokens::new();
        let first = tokens.issue(ActionFamily::Generate);
        let second = tokens.issue(ActionFamily::Generate);

        assert!(second.sequence() > first.sequence());
        assert_eq!(tokens.settle(first), Applied::Stale);
        assert!(tokens.in_flight(ActionFamily::Generate));
        assert_eq!(tokens.settle(second), Applied::Current);
        assert!(!tokens.in_flight(ActionFamily::Generate));
    }

    #[test]
    fn families_are_fenced_independently() {
        let mut tokens = RequestTokens::new();
        let generate = tokens.issue(ActionFamily::Generate);
        let execute = tokens.issue(ActionFamily::Execute);

        assert!(tokens.is_current(generate));
        assert!(tokens.is_current(execute));
        assert_eq!(execute.family(), ActionFamily::Execute);
    }

    #[test]
    fn invalidate_turns_outstanding_request_stale() {
        let mut tokens = RequestTokens::new();
        let connect = tokens.issue(ActionFamily::Connect);
        tokens.invalidate(ActionFamily::Connect);

        assert_eq!(tokens.settle(connect), Applied::Stale);
    }

    #[test]
    fn settled_token_cannot_apply_twice() {
        let mut tokens = RequestTokens::new();
        let token = tokens.issue(ActionFamily::Extract);
        assert_eq!(tokens.settle(token), Applied::Current);
        assert_eq!(tokens.settle(token), Applied::Stale);
    }
}
