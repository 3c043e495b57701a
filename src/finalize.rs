//! Finalize Module for the template compiler
//!
//! Names the generated type and file, and appends the source-map table to the
//! generated module.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::{output_file_name, FINGERPRINT_LEN};
use crate::codegen::{GeneratedCode, SourceMapping};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledUnit {
    pub source_path: String,
    pub type_name: String,
    pub output_file_name: String,
    /// Full SHA-256 of the template source.
    pub source_file_hash: String,
    pub generated_source: String,
    pub source_map: Vec<SourceMapping>,
}

impl CompiledUnit {
    pub fn fingerprint(&self) -> &str {
        &self.source_file_hash[..FINGERPRINT_LEN.min(self.source_file_hash.len())]
    }
}

/// Make `raw` a valid identifier: invalid chars become `_`, and a leading
/// digit gets a `_` prefix.
fn sanitize_identifier(raw: &str) -> String {
    let mut ident: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// `Pages/Counter.razor` -> `Counter`
pub fn derive_type_name(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_identifier(&stem)
}

/// `App` + `Pages/Admin/Users.razor` -> `App.Pages.Admin`
pub fn derive_namespace(root_namespace: &str, path: &str) -> String {
    let mut segments: Vec<String> = root_namespace
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(parent) = Path::new(path).parent() {
        for component in parent.components() {
            if let std::path::Component::Normal(name) = component {
                segments.push(sanitize_identifier(&name.to_string_lossy()));
            }
        }
    }

    if segments.is_empty() {
        "Generated".to_string()
    } else {
        segments.join(".")
    }
}

/// Comment table mapping generated lines back to the template.
pub fn source_map_table(file_path: &str, mappings: &[SourceMapping]) -> String {
    let mut table = String::from("// Source map: generated line -> template location\n");
    for m in mappings {
        table.push_str(&format!(
            "// {} -> {}:{}:{}\n",
            m.generated_line, file_path, m.source_line, m.source_column
        ));
    }
    table
}

pub fn finalize_unit(
    source_path: &str,
    type_name: String,
    source_file_hash: String,
    generated: GeneratedCode,
    output_extension: &str,
) -> CompiledUnit {
    let stem = Path::new(source_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| type_name.clone());
    let fingerprint = &source_file_hash[..FINGERPRINT_LEN.min(source_file_hash.len())];
    let output_file_name = output_file_name(&stem, fingerprint, output_extension);

    let mut generated_source = generated.source;
    generated_source.push_str(&source_map_table(source_path, &generated.source_map));

    CompiledUnit {
        source_path: source_path.to_string(),
        type_name,
        output_file_name,
        source_file_hash,
        generated_source,
        source_map: generated.source_map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_type_name() {
        assert_eq!(derive_type_name("Pages/Counter.razor"), "Counter");
        assert_eq!(derive_type_name("my-widget.razor"), "my_widget");
        assert_eq!(derive_type_name("404.razor"), "_404");
    }

    #[test]
    fn test_derive_namespace() {
        assert_eq!(derive_namespace("App", "Pages/Admin/Users.razor"), "App.Pages.Admin");
        assert_eq!(derive_namespace("App", "Index.razor"), "App");
        assert_eq!(derive_namespace("", "Index.razor"), "Generated");
    }

    #[test]
    fn test_finalize_appends_source_map() {
        let generated = GeneratedCode {
            source: "class X {}\n".to_string(),
            source_map: vec![SourceMapping {
                generated_line: 1,
                source_line: 3,
                source_column: 5,
            }],
        };
        let unit = finalize_unit(
            "Pages/X.razor",
            "X".to_string(),
            "0123456789abcdef".to_string(),
            generated,
            "g.cs",
        );
        assert_eq!(unit.output_file_name, "X.01234567.g.cs");
        assert_eq!(unit.fingerprint(), "01234567");
        assert!(unit
            .generated_source
            .ends_with("// 1 -> Pages/X.razor:3:5\n"));
    }
}
