use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability unlocking the tools whose names start with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grant {
    EnvInfo,
    SearchBxDocs,
    LiveApi,
    Exec,
    Eval,
    Sql,
}

impl Grant {
    pub const ALL: [Grant; 6] = [
        Grant::EnvInfo,
        Grant::SearchBxDocs,
        Grant::LiveApi,
        Grant::Exec,
        Grant::Eval,
        Grant::Sql,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Grant::EnvInfo => "ENV_INFO",
            Grant::SearchBxDocs => "SEARCH_BX_DOCS",
            Grant::LiveApi => "LIVE_API",
            Grant::Exec => "EXEC",
            Grant::Eval => "EVAL",
            Grant::Sql => "SQL",
        }
    }

    /// Whether this grant covers the tool called `tool_name`.
    pub fn covers(self, tool_name: &str) -> bool {
        let canonical = upper_snake_case(tool_name);
        let grant = self.as_str();
        canonical == grant
            || canonical
                .strip_prefix(grant)
                .is_some_and(|rest| rest.starts_with('_'))
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grant::ALL
            .into_iter()
            .find(|grant| grant.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// `liveApiGetModuleFunctions` -> `LIVE_API_GET_MODULE_FUNCTIONS`.
pub fn upper_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (index, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() && index > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Whether any of `grants` covers the tool called `tool_name`.
pub fn is_tool_allowed(tool_name: &str, grants: &[Grant]) -> bool {
    grants.iter().any(|grant| grant.covers(tool_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_camel_case_tool_names() {
        assert_eq!(upper_snake_case("envInfo"), "ENV_INFO");
        assert_eq!(upper_snake_case("searchBxDocs"), "SEARCH_BX_DOCS");
        assert_eq!(
            upper_snake_case("liveApiGetModuleFunctionCode"),
            "LIVE_API_GET_MODULE_FUNCTION_CODE"
        );
        assert_eq!(upper_snake_case("sql"), "SQL");
    }

    #[test]
    fn grant_covers_only_its_prefix() {
        assert!(Grant::LiveApi.covers("liveApiFindFunction"));
        assert!(Grant::Sql.covers("sql"));
        assert!(!Grant::Sql.covers("sqlite"));
        assert!(!Grant::Exec.covers("eval"));
        assert!(!Grant::EnvInfo.covers("liveApiGetModuleEvents"));
    }

    #[test]
    fn parses_canonical_names() {
        assert_eq!("LIVE_API".parse::<Grant>(), Ok(Grant::LiveApi));
        assert_eq!("live_api".parse::<Grant>(), Err("live_api".to_string()));
        for grant in Grant::ALL {
            assert_eq!(grant.as_str().parse::<Grant>(), Ok(grant));
            assert_eq!(
                serde_json::to_string(&grant).unwrap(),
                format!("\"{}\"", grant.as_str())
            );
        }
    }

    #[test]
    fn tool_allowed_by_any_grant() {
        let grants = [Grant::Eval, Grant::LiveApi];
        assert!(is_tool_allowed("eval", &grants));
        assert!(is_tool_allowed("liveApiGetModuleEvents", &grants));
        assert!(!is_tool_allowed("exec", &grants));
        assert!(!is_tool_allowed("anything", &[]));
    }
}
