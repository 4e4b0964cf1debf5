// Catalog loading tests - files on disk, custom transforms, env expansion

use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use toolwire_core::config::{load_config, load_config_with};
use toolwire_core::{ActionKind, ConfigError, TransformRegistry};
use serde_json::{Value, json};

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("toolwire.toml");
    fs::write(&path, content).expect("Failed to write config");
    path
}

#[test]
fn returns_error_when_file_not_found() {
    let result = load_config(Some(Path::new("/nonexistent/path/toolwire.toml")));
    assert!(matches!(result, Err(ConfigError::NotFound { .. })));
}

#[test]
fn host_registered_transforms_are_resolved() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
base_url = "http://localhost:7860"

[[tools]]
id = "image"

[tools.api.generate]
path = "/txt2img"
request = "sd_payload"
response = "first_image"
"#,
    );

    assert!(matches!(
        load_config(Some(&path)),
        Err(ConfigError::UnknownTransform { kind: "request", .. })
    ));

    let mut registry = TransformRegistry::with_builtins();
    registry.register_request("sd_payload", |params| json!({"prompt": params.get("input")}));
    registry.register_response("first_image", |reply| {
        reply["images"].get(0).cloned().unwrap_or(Value::Null)
    });
    let config = load_config_with(Some(&path), &registry).expect("config");

    let tool = config.catalog.get("image").expect("tool");
    let endpoint = &tool.api[ActionKind::Generate.as_str()];
    let params = json!({"input": "a lighthouse"}).as_object().cloned().unwrap();
    assert_eq!(endpoint.build_body(&params), json!({"prompt": "a lighthouse"}));
    assert_eq!(
        endpoint.transform_response(json!({"images": ["b64"]})),
        json!("b64")
    );
}

#[test]
#[serial]
fn data_dir_expands_environment_variables() {
    unsafe {
        std::env::set_var("TOOLWIRE_IT_ROOT", "/srv/toolwire");
    }
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
base_url = "http://localhost"
data_dir = "${TOOLWIRE_IT_ROOT}/state"

[[tools]]
id = "chat"
"#,
    );

    let config = load_config(Some(&path)).expect("config");
    assert_eq!(config.settings.data_dir, PathBuf::from("/srv/toolwire/state"));
    assert_eq!(
        config.settings.session_dir(),
        PathBuf::from("/srv/toolwire/state/session")
    );
    unsafe {
        std::env::remove_var("TOOLWIRE_IT_ROOT");
    }
}

#[test]
fn user_messages_are_localised() {
    assert_eq!(
        ConfigError::NoTools.user_message(),
        "Aucun outil n'est configuré."
    );
}
