//! User-Agent selection for outbound requests.

use rand::seq::SliceRandom;

/// Agent sent when neither an override nor rotation applies.
pub const DEFAULT_USER_AGENT: &str = "Prach-Browse/1.0";

/// Desktop and mobile browser agents used for rotation.
pub const ROTATION_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
];

/// How the `User-Agent` header of outbound requests is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UserAgentPolicy {
    /// Always [`DEFAULT_USER_AGENT`].
    #[default]
    Default,
    /// A fixed operator-supplied agent.
    Fixed(String),
    /// A random pick from the list for every request.
    Rotate(Vec<String>),
}

impl UserAgentPolicy {
    /// Resolve the policy from the operator settings. An override always wins
    /// over rotation.
    pub fn from_settings(custom: Option<&str>, rotation: bool) -> Self {
        match custom.map(str::trim).filter(|agent| !agent.is_empty()) {
            Some(agent) => UserAgentPolicy::Fixed(agent.to_string()),
            None if rotation => UserAgentPolicy::Rotate(
                ROTATION_AGENTS.iter().map(|agent| agent.to_string()).collect(),
            ),
            None => UserAgentPolicy::Default,
        }
    }

    /// Agent for the next outbound request.
    pub fn pick(&self) -> &str {
        match self {
            UserAgentPolicy::Default => DEFAULT_USER_AGENT,
            UserAgentPolicy::Fixed(agent) => agent,
            UserAgentPolicy::Rotate(agents) => agents
                .choose(&mut rand::thread_rng())
                .map(String::as_str)
                .unwrap_or(DEFAULT_USER_AGENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_rotation() {
        let policy = UserAgentPolicy::from_settings(Some("Custom/2.0"), true);
        assert_eq!(policy, UserAgentPolicy::Fixed("Custom/2.0".into()));
        assert_eq!(policy.pick(), "Custom/2.0");
    }

    #[test]
    fn blank_override_is_ignored() {
        assert_eq!(
            UserAgentPolicy::from_settings(Some("  "), false),
            UserAgentPolicy::Default
        );
    }

    #[test]
    fn rotation_picks_from_list() {
        let policy = UserAgentPolicy::from_settings(None, true);
        for _ in 0..20 {
            assert!(ROTATION_AGENTS.contains(&policy.pick()));
        }
    }

    #[test]
    fn empty_rotation_falls_back_to_default() {
        assert_eq!(UserAgentPolicy::Rotate(Vec::new()).pick(), DEFAULT_USER_AGENT);
        assert_eq!(UserAgentPolicy::Default.pick(), DEFAULT_USER_AGENT);
    }
}
