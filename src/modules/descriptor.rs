/// Module descriptor parsing
///
/// Every module carries a one-line declaration, kept in the same shape the
/// original integration units used:
///
/// ```text
/// // { "id": "hub", "libDeps": ["tokio-tungstenite"], "modDeps": [] }
/// ```
///
/// The line is the first line of the module's `META` string; the leading
/// comment marker is optional.
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct MetaLine {
    #[serde(default)]
    id: Option<String>,

    #[serde(default, rename = "libDeps")]
    lib_deps: Vec<String>,

    #[serde(default, rename = "modDeps")]
    mod_deps: Vec<String>,
}

/// A parsed module declaration. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub lib_deps: Vec<String>,
    pub mod_deps: Vec<String>,
}

impl ModuleDescriptor {
    /// Parse a descriptor from the first line of a module's meta block
    pub fn parse(meta: &str) -> Result<Self, String> {
        let line = meta.lines().next().unwrap_or("");
        let line = line.trim().trim_start_matches("//").trim();

        let parsed: MetaLine = serde_json::from_str(line)
            .map_err(|_| format!("Cannot parse module meta \"{}\"", line))?;

        let id = match parsed.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err("Metadata field \"id\" missing".to_string()),
        };

        Ok(Self {
            id,
            lib_deps: parsed.lib_deps,
            mod_deps: parsed.mod_deps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_descriptor() {
        let meta = r#"// { "id": "display", "libDeps": ["axum"], "modDeps": ["hub"] }"#;
        let descriptor = ModuleDescriptor::parse(meta).unwrap();
        assert_eq!(descriptor.id, "display");
        assert_eq!(descriptor.lib_deps, vec!["axum".to_string()]);
        assert_eq!(descriptor.mod_deps, vec!["hub".to_string()]);
    }

    #[test]
    fn test_parse_minimal_descriptor() {
        let descriptor = ModuleDescriptor::parse(r#"{ "id": "hub" }"#).unwrap();
        assert_eq!(descriptor.id, "hub");
        assert!(descriptor.lib_deps.is_empty());
        assert!(descriptor.mod_deps.is_empty());
    }

    #[test]
    fn test_parse_uses_first_line_only() {
        let meta = "// { \"id\": \"hub\" }\nanything below is ignored";
        assert!(ModuleDescriptor::parse(meta).is_ok());
    }

    #[test]
    fn test_missing_id_rejected() {
        let err = ModuleDescriptor::parse(r#"{ "libDeps": [] }"#).unwrap_err();
        assert!(err.contains("id"));
    }

    #[test]
    fn test_malformed_meta_names_content() {
        let err = ModuleDescriptor::parse("// not json at all").unwrap_err();
        assert!(err.contains("not json at all"));
    }
}
