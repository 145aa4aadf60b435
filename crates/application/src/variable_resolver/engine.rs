//! Reference substitution engine
//!
//! Resolves `$NAME` / `${NAME}` references against an already merged
//! environment. Substitution is a single pass: replacement text is never
//! scanned again, and every lookup goes to the original mapping.

use shipyard_domain::environment::ResolvedEnv;

use super::parser::parse_references;

/// Result of reference substitution for a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    /// The string with all known references substituted.
    pub resolved: String,

    /// Names that were substituted, in order of appearance.
    pub resolved_names: Vec<String>,

    /// Names that were left as literal text.
    pub unresolved: Vec<String>,

    /// Whether every reference was substituted.
    pub is_complete: bool,
}

impl ResolutionResult {
    /// Creates a result for input with no references.
    #[must_use]
    pub fn no_references(input: &str) -> Self {
        Self {
            resolved: input.to_string(),
            resolved_names: Vec::new(),
            unresolved: Vec::new(),
            is_complete: true,
        }
    }

    /// Returns the count of substituted references.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved_names.len()
    }

    /// Returns the count of references left untouched.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }
}

/// Substitutes references using one environment as the source of values.
#[derive(Debug, Clone, Copy)]
pub struct VariableResolver<'a> {
    env: &'a ResolvedEnv,
}

impl<'a> VariableResolver<'a> {
    /// Creates a resolver reading values from `env`.
    #[must_use]
    pub const fn new(env: &'a ResolvedEnv) -> Self {
        Self { env }
    }

    /// Substitutes every known reference in `input`.
    ///
    /// Unknown names are kept verbatim, including their `$` / `${}` syntax.
    #[must_use]
    pub fn resolve(&self, input: &str) -> ResolutionResult {
        let references = parse_references(input);

        if references.is_empty() {
            return ResolutionResult::no_references(input);
        }

        let mut resolved_names = Vec::new();
        let mut unresolved = Vec::new();
        let mut result = String::with_capacity(input.len());
        let mut last_end = 0;

        for var_ref in &references {
            // Append text before this reference
            result.push_str(&input[last_end..var_ref.span.start]);

            if let Some(value) = self.env.get(&var_ref.name) {
                result.push_str(value);
                resolved_names.push(var_ref.name.clone());
            } else {
                result.push_str(&input[var_ref.span.clone()]);
                unresolved.push(var_ref.name.clone());
            }

            last_end = var_ref.span.end;
        }

        result.push_str(&input[last_end..]);

        let is_complete = unresolved.is_empty();
        ResolutionResult {
            resolved: result,
            resolved_names,
            unresolved,
            is_complete,
        }
    }
}

/// Substitutes references in every value of `env`, using `env` itself as the
/// source of values.
///
/// # Examples
///
/// ```
/// use shipyard_application::variable_resolver::substitute;
/// use shipyard_domain::environment::ResolvedEnv;
///
/// let mut env = ResolvedEnv::new();
/// env.insert("POD_ID".into(), "1".into());
/// env.insert("STAGE".into(), "STAGE--$POD_ID--$POD_ID_NOT--${POD_ID}".into());
///
/// let env = substitute(&env);
/// assert_eq!(env["STAGE"], "STAGE--1--$POD_ID_NOT--1");
/// ```
#[must_use]
pub fn substitute(env: &ResolvedEnv) -> ResolvedEnv {
    let resolver = VariableResolver::new(env);
    env.iter()
        .map(|(name, value)| (name.clone(), resolver.resolve(value).resolved))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn env(pairs: &[(&str, &str)]) -> ResolvedEnv {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_no_references() {
        let source = env(&[("A", "1")]);
        let result = VariableResolver::new(&source).resolve("plain text");
        assert_eq!(result, ResolutionResult::no_references("plain text"));
        assert!(result.is_complete);
    }

    #[test]
    fn test_resolve_mixed() {
        let source = env(&[("POD_ID", "1")]);
        let result =
            VariableResolver::new(&source).resolve("STAGE--$POD_ID--$POD_ID_NOT--${POD_ID}");

        assert_eq!(result.resolved, "STAGE--1--$POD_ID_NOT--1");
        assert_eq!(result.resolved_count(), 2);
        assert_eq!(result.unresolved, vec!["POD_ID_NOT"]);
        assert!(!result.is_complete);
    }

    #[test]
    fn test_unknown_braced_reference_is_kept() {
        let source = env(&[]);
        let result = VariableResolver::new(&source).resolve("x-${MISSING}-y");
        assert_eq!(result.resolved, "x-${MISSING}-y");
        assert_eq!(result.unresolved_count(), 1);
    }

    #[test]
    fn test_substitute_env() {
        let source = env(&[
            ("STAGE", "STAGE--$POD_ID--$POD_ID_NOT--${POD_ID}"),
            ("POD_ID", "1"),
            ("X", "Y"),
        ]);

        assert_eq!(
            substitute(&source),
            env(&[("STAGE", "STAGE--1--$POD_ID_NOT--1"), ("POD_ID", "1"), ("X", "Y")])
        );
    }

    #[test]
    fn test_substitution_is_single_pass() {
        let source = env(&[("A", "$B"), ("B", "$C"), ("C", "end")]);

        assert_eq!(
            substitute(&source),
            env(&[("A", "$C"), ("B", "end"), ("C", "end")])
        );
    }

    #[test]
    fn test_self_reference_does_not_loop() {
        let source = env(&[("PATH", "/bin:$PATH")]);
        assert_eq!(substitute(&source)["PATH"], "/bin:/bin:$PATH");
    }

    #[test]
    fn test_empty_env() {
        assert!(substitute(&ResolvedEnv::new()).is_empty());
    }

    fn name() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["A", "B", "C", "POD", "POD_ID"]).prop_map(str::to_string)
    }

    fn value() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                name().prop_map(|n| format!("${n}")),
                name().prop_map(|n| format!("${{{n}}}")),
                "[a-z_ -]{0,4}",
            ],
            0..5,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        /// Insertion order of the source pairs never changes the result.
        #[test]
        fn prop_substitution_is_order_independent(
            pairs in prop::collection::vec((name(), value()), 0..8),
        ) {
            let forward: ResolvedEnv = pairs.iter().cloned().collect();
            // Same last-wins content built from a different insertion order.
            let mut reversed = ResolvedEnv::new();
            for (name, value) in pairs.iter().rev() {
                reversed.entry(name.clone()).or_insert_with(|| value.clone());
            }

            prop_assert_eq!(substitute(&forward), substitute(&reversed));
        }

        /// Every value is substituted using only the original mapping.
        #[test]
        fn prop_each_value_resolves_independently(
            pairs in prop::collection::vec((name(), value()), 0..8),
        ) {
            let source: ResolvedEnv = pairs.into_iter().collect();
            let substituted = substitute(&source);
            let resolver = VariableResolver::new(&source);

            for (name, raw) in &source {
                prop_assert_eq!(&substituted[name], &resolver.resolve(raw).resolved);
            }
        }
    }
}
