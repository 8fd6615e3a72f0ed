//! Build definition parsing.
//!
//! ```kdl
//! name "hello"
//! targets "linux_amd64" "windows_amd64"
//! include-dirs "src"
//! version path="version.txt" type="buildint"
//! module "output" {
//!     module "gobuild"
//!     out-dir "dist"
//! }
//! ```
//!
//! Module bodies are converted into JSON mappings without interpretation: a
//! child with one argument becomes a scalar, several arguments an array,
//! properties or a child block an object, and a block of `-` children an
//! array. A child with no arguments is a `true` flag.

use crate::{ConfigError, ConfigResult};
use crossbuild_core::{BuildConfig, ModuleConfig, Target, VersionConfig, VersionKind};
use kdl::{KdlDocument, KdlNode, KdlValue};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// File name looked up when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "crossbuild.kdl";

/// Read and parse a build definition; relative paths resolve against the
/// file's directory.
pub fn load_build(path: &Path) -> ConfigResult<BuildConfig> {
    let text = std::fs::read_to_string(path)?;
    let root = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    parse_build(&text, std::path::absolute(root)?)
}

/// Parse a build definition from KDL text.
pub fn parse_build(kdl: &str, root: PathBuf) -> ConfigResult<BuildConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut name = String::new();
    let mut targets: Vec<Target> = Vec::new();
    let mut modules: Vec<ModuleConfig> = Vec::new();
    let mut include_dirs = Vec::new();
    let mut version = None;

    for node in doc.nodes() {
        match node.name().value() {
            "name" => {
                name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("name".to_string()))?;
            }
            "targets" => {
                for raw in get_all_string_args(node) {
                    let target: Target = raw.parse().map_err(|e| ConfigError::InvalidValue {
                        field: "targets".to_string(),
                        message: format!("{e}"),
                    })?;
                    if targets.contains(&target) {
                        return Err(ConfigError::Duplicate(format!("target '{target}'")));
                    }
                    targets.push(target);
                }
            }
            "include-dirs" => {
                include_dirs.extend(get_all_string_args(node).into_iter().map(PathBuf::from));
            }
            "version" => {
                version = Some(parse_version(node)?);
            }
            "module" => {
                let module = parse_module(node)?;
                if modules.iter().any(|m| m.name == module.name) {
                    return Err(ConfigError::Duplicate(format!("module '{}'", module.name)));
                }
                modules.push(module);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if name.is_empty() {
        return Err(ConfigError::MissingField("name".to_string()));
    }
    if name.contains(['.', '/', '\\']) {
        return Err(ConfigError::InvalidValue {
            field: "name".to_string(),
            message: format!("'{name}' may not contain '.' or path separators"),
        });
    }
    if targets.is_empty() {
        return Err(ConfigError::MissingField("targets".to_string()));
    }

    Ok(BuildConfig {
        name,
        targets,
        modules,
        include_dirs,
        version,
        root,
    })
}

fn parse_version(node: &KdlNode) -> ConfigResult<VersionConfig> {
    let path = get_string_prop(node, "path")
        .or_else(|| get_first_string_arg(node))
        .ok_or_else(|| ConfigError::MissingField("version path".to_string()))?;
    let kind = match get_string_prop(node, "type") {
        Some(kind) => kind.parse().map_err(|e| ConfigError::InvalidValue {
            field: "version type".to_string(),
            message: format!("{e}"),
        })?,
        None => VersionKind::default(),
    };
    Ok(VersionConfig {
        path: PathBuf::from(path),
        kind,
    })
}

fn parse_module(node: &KdlNode) -> ConfigResult<ModuleConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("module name".to_string()))?;

    let mut config = Map::new();
    for entry in node.entries() {
        if let Some(key) = entry.name() {
            insert_unique(&mut config, &name, key.value(), convert_value(entry.value())?)?;
        }
    }
    if let Some(children) = node.children() {
        match document_to_value(children, &name)? {
            Value::Object(map) => {
                for (key, value) in map {
                    insert_unique(&mut config, &name, &key, value)?;
                }
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: format!("module '{name}'"),
                    message: "module body must be a set of named settings".to_string(),
                });
            }
        }
    }

    Ok(ModuleConfig { name, config })
}

fn document_to_value(doc: &KdlDocument, path: &str) -> ConfigResult<Value> {
    let nodes = doc.nodes();
    if !nodes.is_empty() && nodes.iter().all(|n| n.name().value() == "-") {
        let items = nodes
            .iter()
            .map(|n| node_to_value(n, path))
            .collect::<ConfigResult<Vec<_>>>()?;
        return Ok(Value::Array(items));
    }

    let mut map = Map::new();
    for node in nodes {
        let key = node.name().value();
        let value = node_to_value(node, &format!("{path}.{key}"))?;
        insert_unique(&mut map, path, key, value)?;
    }
    Ok(Value::Object(map))
}

fn node_to_value(node: &KdlNode, path: &str) -> ConfigResult<Value> {
    let mut args = Vec::new();
    let mut props = Map::new();
    for entry in node.entries() {
        let value = convert_value(entry.value())?;
        match entry.name() {
            Some(key) => insert_unique(&mut props, path, key.value(), value)?,
            None => args.push(value),
        }
    }

    if let Some(children) = node.children() {
        let body = document_to_value(children, path)?;
        return match body {
            Value::Object(mut map) if args.is_empty() => {
                for (key, value) in props {
                    insert_unique(&mut map, path, &key, value)?;
                }
                Ok(Value::Object(map))
            }
            Value::Array(items) if args.is_empty() && props.is_empty() => Ok(Value::Array(items)),
            _ => Err(ConfigError::InvalidValue {
                field: path.to_string(),
                message: "cannot mix arguments with a child block".to_string(),
            }),
        };
    }

    match (args.len(), props.is_empty()) {
        (0, true) => Ok(Value::Bool(true)),
        (0, false) => Ok(Value::Object(props)),
        (1, true) => Ok(args.remove(0)),
        (_, true) => Ok(Value::Array(args)),
        (_, false) => Err(ConfigError::InvalidValue {
            field: path.to_string(),
            message: "cannot mix arguments and properties".to_string(),
        }),
    }
}

fn convert_value(value: &KdlValue) -> ConfigResult<Value> {
    if let Some(s) = value.as_string() {
        return Ok(Value::String(s.to_string()));
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(i) = value.as_integer() {
        return i64::try_from(i)
            .map(Value::from)
            .map_err(|_| ConfigError::InvalidValue {
                field: "integer".to_string(),
                message: format!("{i} is out of range"),
            });
    }
    if let Some(f) = value.as_float() {
        return Ok(serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null));
    }
    Ok(Value::Null)
}

fn insert_unique(map: &mut Map<String, Value>, path: &str, key: &str, value: Value) -> ConfigResult<()> {
    if map.contains_key(key) {
        return Err(ConfigError::Duplicate(format!("{path}.{key}")));
    }
    map.insert(key.to_string(), value);
    Ok(())
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbuild_core::{Arch, Os};
    use serde_json::json;

    fn parse(kdl: &str) -> ConfigResult<BuildConfig> {
        parse_build(kdl, PathBuf::from("/project"))
    }

    #[test]
    fn test_parse_simple_build() {
        let kdl = r#"
            name "hello"
            targets "linux_amd64" "windows_amd64"
            include-dirs "src" "assets"
            version path="version.txt" type="semver"

            module "output" {
                module "gobuild"
                out-dir "dist"
            }
        "#;

        let build = parse(kdl).unwrap();
        assert_eq!(build.name, "hello");
        assert_eq!(
            build.targets,
            vec![
                Target::new(Os::Linux, Arch::Amd64),
                Target::new(Os::Windows, Arch::Amd64)
            ]
        );
        assert_eq!(
            build.include_dirs,
            vec![PathBuf::from("src"), PathBuf::from("assets")]
        );
        let version = build.version.as_ref().unwrap();
        assert_eq!(version.kind, VersionKind::Semver);
        assert_eq!(build.version_path(), Some(PathBuf::from("/project/version.txt")));

        let output = build.module("output").unwrap();
        assert_eq!(
            Value::Object(output.config.clone()),
            json!({"module": "gobuild", "out-dir": "dist"})
        );
    }

    #[test]
    fn test_module_body_shapes() {
        let kdl = r#"
            name "shapes"
            targets "linux_arm64"

            module "gobuild" root="." {
                commands {
                    - name="hello" path="./cmd/hello"
                    - name="tool" path="./cmd/tool"
                }
                ldflags "-s" "-w"
                cgo-off #true
                retries 3
                strip
            }
        "#;

        let build = parse(kdl).unwrap();
        let module = build.module("gobuild").unwrap();
        assert_eq!(
            Value::Object(module.config.clone()),
            json!({
                "root": ".",
                "commands": [
                    {"name": "hello", "path": "./cmd/hello"},
                    {"name": "tool", "path": "./cmd/tool"}
                ],
                "ldflags": ["-s", "-w"],
                "cgo-off": true,
                "retries": 3,
                "strip": true
            })
        );
    }

    #[test]
    fn test_missing_name_and_targets() {
        let err = parse(r#"targets "linux_amd64""#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "name"));

        let err = parse(r#"name "x""#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "targets"));
    }

    #[test]
    fn test_invalid_name_and_target() {
        let err = parse(
            r#"name "a.b"
            targets "linux_amd64""#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = parse(
            r#"name "ok"
            targets "linux_sparc""#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown arch: sparc"), "{err}");
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = parse(
            r#"name "dup"
            targets "linux_amd64"
            module "output" { out-dir "a"; }
            module "output" { out-dir "b"; }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate(_)));

        let err = parse(
            r#"name "dup"
            targets "linux_amd64"
            module "output" {
                out-dir "a"
                out-dir "b"
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate(d) if d == "output.out-dir"));

        let err = parse(
            r#"name "dup"
            targets "linux_amd64" "linux_amd64""#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate(_)));
    }

    #[test]
    fn test_unknown_version_type() {
        let err = parse(
            r#"name "v"
            targets "linux_amd64"
            version path="v.txt" type="calver""#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_build_resolves_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "name \"disk\"\ntargets \"darwin_arm64\"\n").unwrap();

        let build = load_build(&path).unwrap();
        assert_eq!(build.name, "disk");
        assert_eq!(build.root, dir.path());
        assert!(build.modules.is_empty());
    }

    #[test]
    fn test_load_build_missing_file() {
        let err = load_build(Path::new("/definitely/not/here.kdl")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
