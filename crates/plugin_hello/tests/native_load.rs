//! Loads the built `plugin_hello` library through discovery, the same way the
//! host does at startup.

use extension_host::{Bootstrap, BootstrapOptions};
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::PathBuf;
use tempfile::TempDir;

/// The cdylib cargo built next to this test binary
fn built_library() -> PathBuf {
    let file_name = format!("{}plugin_hello{}", DLL_PREFIX, DLL_SUFFIX);
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();

    [deps.to_path_buf(), deps.parent().unwrap().to_path_buf()]
        .into_iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| panic!("{} not found next to {}", file_name, exe.display()))
}

#[tokio::test]
async fn test_discovers_installs_and_uninstalls_native_plugin() {
    let library = built_library();
    let file_name = library.file_name().unwrap().to_string_lossy().to_string();

    let project = TempDir::new().unwrap();
    let plugin_dir = project.path().join("plugins/hello");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::copy(&library, plugin_dir.join(&file_name)).unwrap();
    std::fs::write(
        plugin_dir.join("package.json"),
        format!(r#"{{"name": "hello", "version": "0.1.0", "main": "./{}"}}"#, file_name),
    )
    .unwrap();

    let app = Bootstrap::new()
        .initialize(BootstrapOptions::new(project.path()))
        .unwrap();

    let report = app.load_project_plugins().await.unwrap();
    assert!(report.skipped.is_empty(), "skipped: {:?}", report.skipped);
    assert_eq!(report.installed, vec!["hello"]);

    let plugin = app.plugin_manager.get("hello").unwrap();
    assert_eq!(plugin.display_name(), "Hello");
    assert_eq!(plugin.category(), "samples");

    app.shutdown().await;
    assert!(app.plugin_manager.is_empty());
    assert!(app.plugins.loaded_plugins().is_empty());
}
