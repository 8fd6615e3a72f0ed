//! Variable interpolation for module settings.
//!
//! Supports variables like:
//! - `${name}` - Build name
//! - `${version}` - Current content of the version file
//! - `${os}`, `${arch}` - Components of the current target
//! - `${target}` - Current target (`os_arch`)
//! - `${ext}` - `.exe` on Windows targets, empty otherwise
//! - `${out}` - Output directory of the running module
//! - `${env.VAR_NAME}` - Environment variable
//! - `${timestamp}` - Unix timestamp
//! - `${date}` - ISO date (YYYY-MM-DD)
//! - `${datetime}` - ISO datetime

use crossbuild_core::Target;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Variable context containing all available variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    pub name: String,
    pub version: Option<String>,
    pub target: Option<Target>,
    pub out: Option<String>,
    /// Environment variables
    pub env: HashMap<String, String>,
}

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}").unwrap()
});

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate environment variables from the current process environment.
    pub fn populate_env(&mut self) {
        self.env.extend(std::env::vars());
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["name"] => Some(self.name.clone()),
            ["version"] => self.version.clone(),
            ["os"] => self.target.map(|t| t.os.to_string()),
            ["arch"] => self.target.map(|t| t.arch.to_string()),
            ["target"] => self.target.map(|t| t.to_string()),
            ["ext"] => Some(
                if self.target.is_some_and(|t| t.is_windows()) {
                    ".exe"
                } else {
                    ""
                }
                .to_string(),
            ),
            ["out"] => self.out.clone(),

            ["env", name] => self.env.get(*name).cloned(),

            ["timestamp"] => Some(chrono::Utc::now().timestamp().to_string()),
            ["date"] => Some(chrono::Utc::now().format("%Y-%m-%d").to_string()),
            ["datetime"] => Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),

            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    /// Unknown variables are left untouched.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Interpolate variables in a list of strings.
    pub fn interpolate_vec(&self, inputs: &[String]) -> Vec<String> {
        inputs.iter().map(|s| self.interpolate(s)).collect()
    }

    /// Interpolate the values of a map; keys are kept as written.
    pub fn interpolate_map(&self, map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        map.iter()
            .map(|(k, v)| (k.clone(), self.interpolate(v)))
            .collect()
    }
}

/// Builder for creating VariableContext.
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: VariableContext::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.ctx.name = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.ctx.version = Some(version.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.ctx.target = Some(target);
        self
    }

    pub fn with_out(mut self, out: impl Into<String>) -> Self {
        self.ctx.out = Some(out.into());
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}

impl Default for VariableContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbuild_core::{Arch, Os};

    #[test]
    fn test_target_interpolation() {
        let ctx = VariableContextBuilder::new()
            .with_name("app")
            .with_target(Target::new(Os::Windows, Arch::Arm64))
            .build();

        let result = ctx.interpolate("${name}-${os}-${arch}${ext} (${target})");
        assert_eq!(result, "app-windows-arm64.exe (windows_arm64)");
    }

    #[test]
    fn test_target_variables_unset_without_target() {
        let ctx = VariableContextBuilder::new().with_name("app").build();
        assert_eq!(ctx.interpolate("${name}/${os}${ext}"), "app/${os}");
    }

    #[test]
    fn test_env_variables() {
        let mut ctx = VariableContext::new();
        ctx.env.insert("MY_VAR".to_string(), "hello".to_string());
        ctx.env.insert("ANOTHER".to_string(), "world".to_string());

        let result = ctx.interpolate("${env.MY_VAR} ${env.ANOTHER}!");
        assert_eq!(result, "hello world!");
    }

    #[test]
    fn test_unknown_variable_preserved() {
        let ctx = VariableContext::new();
        let result = ctx.interpolate("Unknown: ${unknown.var}");
        assert_eq!(result, "Unknown: ${unknown.var}");
    }

    #[test]
    fn test_interpolate_vec_and_map() {
        let ctx = VariableContextBuilder::new()
            .with_target(Target::new(Os::Linux, Arch::I386))
            .build();

        let inputs = vec!["-o".to_string(), "bin/${target}".to_string()];
        assert_eq!(ctx.interpolate_vec(&inputs), vec!["-o", "bin/linux_i386"]);

        let env = BTreeMap::from([("GOARCH".to_string(), "${arch}".to_string())]);
        assert_eq!(ctx.interpolate_map(&env)["GOARCH"], "i386");
    }

    #[test]
    fn test_date_variable() {
        let ctx = VariableContext::new();
        let result = ctx.interpolate("${date}");
        assert_eq!(result.len(), 10);
        assert!(result.contains('-'));
    }
}
