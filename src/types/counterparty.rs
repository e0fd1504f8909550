use serde::Deserialize;

/// Which resting book entries count towards depth statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyFilter {
    #[default]
    Any,
    Only(String),
    Exclude(String),
}

impl CounterpartyFilter {
    pub fn anonymous() -> Self {
        Self::Only("ANON".to_string())
    }

    pub fn matches(&self, trader_id: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(id) => trader_id.eq_ignore_ascii_case(id),
            Self::Exclude(id) => !trader_id.eq_ignore_ascii_case(id),
        }
    }
}
