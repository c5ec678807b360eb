//! End-to-end tests for `protocol = "stdio"` plugins.
//!
//! Each test writes a small `/bin/sh` JSON-RPC server into a temporary plugin
//! directory and drives it through the real binder, environment manager and
//! registry.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use dragnet::capability::stdio::StdioBinder;
use dragnet::capability::{BindContext, CapabilityBinder};
use dragnet::descriptor::{DESCRIPTOR_FILE, PluginDescriptor};
use dragnet::environment::{EnvironmentManager, HostEnvironment};
use dragnet::{AdminApi, CapabilityError, DragnetConfig, PluginStatus, SearchRequest};
use std::path::Path;
use std::time::Duration;

/// Answers handshake, search and health. The keyword `crash` makes the
/// process exit without replying.
const PLUGIN_SCRIPT: &str = r#"
while IFS= read -r line; do
    id=$(echo "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
    case "$line" in
        *plugin.handshake*)
            printf '{"jsonrpc":"2.0","result":{"name":"%s","version":"0.3.1"},"id":%s}\n' "$DRAGNET_PLUGIN_NAME" "$id"
            ;;
        *'"keyword":"crash"'*)
            exit 3
            ;;
        *plugin.search*)
            kw=$(echo "$line" | sed 's/.*"keyword":"\([^"]*\)".*/\1/')
            printf '{"jsonrpc":"2.0","method":"plugin.log","params":{"msg":"searching"}}\n'
            printf '{"jsonrpc":"2.0","result":[{"platform":"shfeed","content":"Nothing here. All about %s today. Unrelated tail.","url":"https://example.com/1"}],"id":%s}\n' "$kw" "$id"
            ;;
        *plugin.health*)
            printf '{"jsonrpc":"2.0","result":{"status":"ok"},"id":%s}\n' "$id"
            ;;
        *)
            printf '{"jsonrpc":"2.0","error":{"code":-32601,"message":"method not found"},"id":%s}\n' "$id"
            ;;
    esac
done
"#;

fn write_plugin(root: &Path, name: &str, script: &str) -> std::path::PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(dir.join("plugin.sh"), script).expect("write script");
    std::fs::write(
        dir.join(DESCRIPTOR_FILE),
        format!(
            r#"name = "{name}"
version = "0.3.1"
language = "shell"
type = "api"

[environment]
runtime = "sh"
entry = "plugin.sh"

[communication]
protocol = "stdio"

[settings]
region = "eu"
"#
        ),
    )
    .expect("write descriptor");
    dir
}

#[tokio::test]
async fn capability_handshakes_searches_and_reports_health() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = write_plugin(root.path(), "shfeed", PLUGIN_SCRIPT);
    let descriptor = PluginDescriptor::load(&dir).expect("descriptor");
    let environment = HostEnvironment::new()
        .ensure_environment(&descriptor)
        .expect("sh on PATH");

    let capability = StdioBinder::new(Duration::from_secs(5))
        .bind(&BindContext {
            descriptor: &descriptor,
            plugin_dir: &dir,
            environment: &environment,
        })
        .expect("bind");

    assert!(capability.health_check().await.expect("health"));

    let results = capability.search("rust").await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].platform, "shfeed");
    assert!(results[0].content.contains("All about rust today"));
    assert_eq!(results[0].url.as_deref(), Some("https://example.com/1"));
}

#[tokio::test]
async fn crashed_process_is_restarted_on_next_call() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = write_plugin(root.path(), "shfeed", PLUGIN_SCRIPT);
    let descriptor = PluginDescriptor::load(&dir).expect("descriptor");
    let environment = HostEnvironment::new()
        .ensure_environment(&descriptor)
        .expect("sh on PATH");
    let capability = StdioBinder::new(Duration::from_secs(5))
        .bind(&BindContext {
            descriptor: &descriptor,
            plugin_dir: &dir,
            environment: &environment,
        })
        .expect("bind");

    let err = capability.search("crash").await.unwrap_err();
    assert!(matches!(err, CapabilityError::Process(_)), "{err}");

    let results = capability.search("tokio").await.expect("search after restart");
    assert!(results[0].content.contains("tokio"));
}

#[tokio::test]
async fn handshake_name_mismatch_fails_the_call() {
    let root = tempfile::tempdir().expect("tempdir");
    let script = PLUGIN_SCRIPT.replace("\"$DRAGNET_PLUGIN_NAME\"", "\"impostor\"");
    let dir = write_plugin(root.path(), "shfeed", &script);
    let descriptor = PluginDescriptor::load(&dir).expect("descriptor");
    let environment = HostEnvironment::new()
        .ensure_environment(&descriptor)
        .expect("sh on PATH");
    let capability = StdioBinder::new(Duration::from_secs(5))
        .bind(&BindContext {
            descriptor: &descriptor,
            plugin_dir: &dir,
            environment: &environment,
        })
        .expect("bind");

    let err = capability.search("rust").await.unwrap_err();
    assert!(err.to_string().contains("handshake name mismatch"), "{err}");
}

#[tokio::test]
async fn missing_entry_file_is_skipped_at_discovery() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = write_plugin(root.path(), "shfeed", PLUGIN_SCRIPT);
    std::fs::remove_file(dir.join("plugin.sh")).expect("remove script");

    let api = AdminApi::from_config(&DragnetConfig {
        plugin_dir: root.path().to_path_buf(),
        ..Default::default()
    })
    .expect("api");
    let report = api.discover().await.expect("discover");
    assert!(report.loaded.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("not found"));
}

#[tokio::test]
async fn admin_api_searches_through_a_stdio_plugin() {
    let root = tempfile::tempdir().expect("tempdir");
    write_plugin(root.path(), "shfeed", PLUGIN_SCRIPT);

    let api = AdminApi::from_config(&DragnetConfig {
        plugin_dir: root.path().to_path_buf(),
        ..Default::default()
    })
    .expect("api");
    let report = api.discover().await.expect("discover");
    assert_eq!(report.loaded, vec!["shfeed".to_owned()]);

    let start = api.start_plugin("shfeed").await;
    assert!(start.is_success(), "{}", start.message);

    let response = api
        .search(&SearchRequest::new("rust"))
        .await
        .expect("search");
    assert!(response.error.is_none(), "{:?}", response.error);
    assert_eq!(response.results.len(), 1);
    let hit = &response.results[0];
    assert_eq!(hit.platform, "shfeed");
    assert_eq!(hit.content, "Nothing here All about rust today Unrelated tail");
    assert_eq!(hit.url.as_deref(), Some("https://example.com/1"));

    let listed = api.list_active_plugins().expect("list");
    assert_eq!(listed[0].status, PluginStatus::Running);
    let stats = api.get_plugin_stats("shfeed").expect("stats");
    assert_eq!(stats.total_requests, 1);
}
