//! Model-mapping resolution (§3 ModelMapping, §4.6 step 4b). The Router
//! filters on the *requested* model only (§4.2); the Executor applies this
//! mapping afterwards, once a specific route/provider is already chosen.

use maxx_storage::snapshot::ModelMappingRow;

pub struct MappingScope<'a> {
    pub client_dialect: &'a str,
    pub provider_kind: &'a str,
    pub provider_id: i64,
    pub project_id: i64,
    pub route_id: i64,
}

/// Lookup priority: route > provider > global (§3); within a scope, lowest
/// `priority` wins, ties broken by `id` (§9 open question: the tiebreaker is
/// preserved for stable ordering though not semantically motivated).
pub fn resolve(
    mappings: &[ModelMappingRow],
    scope: &MappingScope<'_>,
    requested_model: &str,
) -> String {
    let best = |scope_name: &str| -> Option<&ModelMappingRow> {
        mappings
            .iter()
            .filter(|m| m.scope == scope_name)
            .filter(|m| m.client_dialect.is_empty() || m.client_dialect == scope.client_dialect)
            .filter(|m| match scope_name {
                "route" => m.route_id == Some(scope.route_id),
                "provider" => {
                    m.provider_id == Some(scope.provider_id)
                        || m.provider_kind.as_deref() == Some(scope.provider_kind)
                }
                _ => m.project_id.is_none() || m.project_id == Some(scope.project_id),
            })
            .filter(|m| glob_match(&m.pattern, requested_model))
            .min_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)))
    };

    best("route")
        .or_else(|| best("provider"))
        .or_else(|| best("global"))
        .map(|m| m.target.clone())
        .unwrap_or_else(|| requested_model.to_string())
}

/// Trailing-`*` glob, exact match otherwise (§3 ModelMapping.pattern, §4.2
/// `supportedModels` wildcard match).
pub fn glob_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(scope: &str, pattern: &str, target: &str, priority: i32, id: i64) -> ModelMappingRow {
        ModelMappingRow {
            id,
            scope: scope.to_string(),
            client_dialect: String::new(),
            provider_kind: None,
            provider_id: None,
            project_id: None,
            route_id: None,
            api_token_id: None,
            pattern: pattern.to_string(),
            target: target.to_string(),
            priority,
        }
    }

    #[test]
    fn route_scope_wins_over_global() {
        let mappings = vec![
            mapping("global", "*", "global-target", 0, 1),
            mapping("route", "gpt-4*", "route-target", 0, 2),
        ];
        let scope = MappingScope {
            client_dialect: "openai",
            provider_kind: "custom",
            provider_id: 1,
            project_id: 0,
            route_id: 2,
        };
        assert_eq!(resolve(&mappings, &scope, "gpt-4-turbo"), "route-target");
    }

    #[test]
    fn ties_break_on_id() {
        let mappings = vec![
            mapping("global", "*", "b", 0, 5),
            mapping("global", "*", "a", 0, 1),
        ];
        let scope = MappingScope {
            client_dialect: "claude",
            provider_kind: "custom",
            provider_id: 1,
            project_id: 0,
            route_id: 1,
        };
        assert_eq!(resolve(&mappings, &scope, "claude-3"), "a");
    }

    #[test]
    fn unmatched_model_passes_through() {
        let scope = MappingScope {
            client_dialect: "claude",
            provider_kind: "custom",
            provider_id: 1,
            project_id: 0,
            route_id: 1,
        };
        assert_eq!(resolve(&[], &scope, "claude-3"), "claude-3");
    }
}
