use handlebars::{handlebars_helper, Handlebars};
use serde_json::Value;
use tracing::info;

use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn create_path_if_not_exists(path: &str) -> anyhow::Result<()> {
    // strip the file name
    let path = Path::new(path)
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid path: no parent directory for '{}'", path))?;
    if !path.as_os_str().is_empty() && !path.exists() {
        info!("Creating path: {:?}", path);
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn write_string_to_file(filename: &str, content: &str) -> anyhow::Result<()> {
    create_path_if_not_exists(filename)?;
    let path = Path::new(filename);
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Escapes a string for use inside a double-quoted DOT identifier.
pub fn dot_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

pub fn get_handlebars() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();

    handlebars_helper!(exists: |v: Value| {
        !v.is_null() &&
        match v {
            serde_json::Value::String(s) => {
                !s.is_empty() && s != "null"
            }
            _ => true,
        }
    });
    handlebars.register_helper("exists", Box::new(exists));

    handlebars_helper!(isnull: |v: Value| v.is_null());
    handlebars.register_helper("isnull", Box::new(isnull));

    handlebars_helper!(stringeq: |s1: String, s2: String| s1.eq(&s2));
    handlebars.register_helper("stringeq", Box::new(stringeq));

    handlebars_helper!(is_empty: |v: Value| {
        match v {
            serde_json::Value::Array(arr) => arr.is_empty(),
            _ => false,
        }
    });
    handlebars.register_helper("is_empty", Box::new(is_empty));

    handlebars_helper!(is_exposed: |status: String| status != "not-exposed");
    handlebars.register_helper("is_exposed", Box::new(is_exposed));

    handlebars_helper!(dot_quote: |s: String| dot_escape(&s));
    handlebars.register_helper("dot_quote", Box::new(dot_quote));

    handlebars
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handlebars_can_render() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template("Hello {{name}}", &json!({"name": "foo"}))
            .expect("This to render");
        assert_eq!(res, "Hello foo");
    }

    #[test]
    fn handlebars_can_iterate_objects() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(
                r#"{{#each nodes as |node|}}
{{node.id}} {{node.status}}
{{/each}}"#,
                &json!({"nodes": [
                    { "id": "vm1", "status": "transitively-exposed" },
                    { "id": "nic1", "status": "not-exposed" }
                ]}),
            )
            .expect("This to render");
        assert_eq!(res, "vm1 transitively-exposed\nnic1 not-exposed\n");
    }

    #[test]
    fn handlebars_helper_is_exposed_can_render() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(
                r#"{{#each nodes as |node|}}{{#if (is_exposed node.status)}}{{node.id}};{{/if}}{{/each}}"#,
                &json!({"nodes": [
                    { "id": "st1", "status": "directly-exposed" },
                    { "id": "disk1", "status": "not-exposed" },
                    { "id": "vm1", "status": "transitively-exposed" }
                ]}),
            )
            .expect("This to render");
        assert_eq!(res, "st1;vm1;");
    }

    #[test]
    fn handlebars_helper_exists_skips_empty_strings() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(
                r#"{{#if (exists node.power_state)}}{{node.power_state}}{{else}}n/a{{/if}}"#,
                &json!({"node": { "power_state": "" }}),
            )
            .expect("This to render");
        assert_eq!(res, "n/a");
    }

    #[test]
    fn dot_quote_escapes() {
        assert_eq!(dot_escape(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(r#""{{{dot_quote name}}}""#, &json!({"name": "x\"y"}))
            .expect("This to render");
        assert_eq!(res, r#""x\"y""#);
    }

    #[test]
    fn write_string_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/nested/graph.json");
        write_string_to_file(target.to_str().unwrap(), "{}").unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), "{}");
    }
}
