//! End-to-end tests for module editors and editing sessions.
mod common;
use async_trait::async_trait;
use blockform::catalog::BlockSchema;
use blockform::error::{StoreError, ValidationError};
use blockform::prelude::*;
use blockform::render::{ModuleRole, ModuleView};
use common::*;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

fn module_view<'a>(widget: &'a Widget, path: &Path) -> &'a ModuleView {
    let found = widget
        .find(path)
        .unwrap_or_else(|| panic!("nothing rendered at '{}'", path));
    match found {
        Widget::Module(view) => view,
        Widget::BlockSlot {
            instance: Some(instance),
            ..
        } => match instance.as_ref() {
            Widget::Module(view) => view,
            other => panic!("expected a module in the slot, got {}", other.kind_name()),
        },
        other => panic!("expected a module at '{}', got {}", path, other.kind_name()),
    }
}

fn module_widget(widget: &Widget, path: &Path) -> Widget {
    Widget::Module(module_view(widget, path).clone())
}

fn action_request() -> AddBlockRequest {
    AddBlockRequest {
        category: BlockCategory::Action,
        target: root_path("actions"),
        is_array: true,
    }
}

/// A catalog whose schema fetches wait until the test releases them.
struct GatedCatalog {
    inner: StaticCatalog,
    gate: Notify,
}

#[async_trait]
impl BlockCatalog for GatedCatalog {
    async fn list_blocks(
        &self,
        category: BlockCategory,
        include_schema: bool,
    ) -> std::result::Result<Vec<BlockDefinition>, FetchError> {
        self.inner.list_blocks(category, include_schema).await
    }

    async fn block_schema(&self, name: &str) -> std::result::Result<BlockSchema, FetchError> {
        self.gate.notified().await;
        self.inner.block_schema(name).await
    }

    async fn root_schema(&self) -> std::result::Result<BlockDefinition, FetchError> {
        self.inner.root_schema().await
    }
}

#[tokio::test]
async fn test_open_root_renders_every_declared_field() {
    let session = open_session();
    let root = session.open_root().await.unwrap();

    assert_eq!(root.mode(), EditMode::Structured);
    let widget = root.hydrate().await;
    assert_eq!(
        field_keys(&widget),
        vec![
            "message", "retries", "enabled", "level", "tags", "trigger", "actions", "settings",
            "metadata"
        ]
    );
    assert!(widget.pending_modules().is_empty());
}

#[tokio::test]
async fn test_add_logger_action_through_picker() {
    let session = open_session();
    let root = session.open_root().await.unwrap();

    let widget = root.hydrate().await;
    let add = affordance(&widget, "Add action");
    let request = AddBlockRequest::from_affordance(&add).unwrap();
    assert_eq!(request, action_request());

    let mut picker = root.open_picker(&request).await;
    assert!(picker.error().is_none());
    assert_eq!(picker.entries().len(), 2);
    picker.set_query("LOG");
    let visible: Vec<&str> = picker.visible().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(visible, vec!["loggerAction"]);

    let logger = picker.select("loggerAction").unwrap();
    let inserted = root.insert_block(&request, &logger).unwrap();
    assert_eq!(inserted, root_path("actions").index(0));

    let widget = root.hydrate().await;
    let view = module_view(&widget, &inserted);
    assert_eq!(
        view.role,
        ModuleRole::Block {
            category: BlockCategory::Action,
            name: Some("loggerAction".to_string())
        }
    );
    assert!(view.removable);
    assert_eq!(field_keys(&module_widget(&widget, &inserted)), vec!["message", "level"]);

    root.input(&inserted.child("message"), FieldInput::Text("Hello".into()));
    root.input(&inserted.child("level"), FieldInput::Select("warn".into()));

    let value = root.value().unwrap();
    assert_eq!(
        value,
        json!({
            "actions": [
                { "action": "logger", "alias": "Logger", "message": "Hello", "level": "warn" }
            ]
        })
    );
    assert_eq!(
        to_yaml(&value),
        "actions:\n- action: logger\n  alias: Logger\n  message: Hello\n  level: warn\n"
    );
}

#[tokio::test]
async fn test_removing_a_block_drops_shifted_schemas() {
    let catalog = Arc::new(CountingCatalog::new(test_catalog()));
    let session = EditorSession::new(EditorConfig::default(), catalog.clone());
    let root = session.open_root().await.unwrap();

    root.insert_block(&action_request(), &logger_action()).unwrap();
    root.insert_block(&action_request(), &http_action()).unwrap();
    root.hydrate().await;
    assert_eq!(catalog.schema_calls(), 2);

    let first = root_path("actions").index(0);
    let removed = root.remove_block(&first).unwrap();
    assert_eq!(removed, json!({ "action": "logger", "alias": "Logger" }));
    assert!(!session.cache().contains(&first));
    assert!(!session.cache().contains(&root_path("actions").index(1)));

    // The HTTP action now sits at index 0 and must not inherit the logger schema.
    let widget = root.hydrate().await;
    assert_eq!(field_keys(&module_widget(&widget, &first)), vec!["url", "method"]);
    assert_eq!(
        session.editor(first.clone()).block_name().as_deref(),
        Some("httpAction")
    );
    assert_eq!(catalog.schema_calls(), 3);
    assert_eq!(
        session.store().get(&root_path("actions")),
        Some(json!([{ "action": "http", "alias": "HTTP Request" }]))
    );
}

#[tokio::test]
async fn test_single_block_slot_assign_and_remove() {
    let session = open_session();
    let root = session.open_root().await.unwrap();

    let widget = root.hydrate().await;
    let add = affordance(&widget, "Add trigger");
    let picker = root
        .activate(&add)
        .await
        .unwrap()
        .expect("block controls open a picker");
    let cron = picker.select("cronTrigger").unwrap();
    let request = AddBlockRequest::from_affordance(&add).unwrap();
    assert!(!request.is_array);

    let slot = root.insert_block(&request, &cron).unwrap();
    assert_eq!(slot, root_path("trigger"));
    assert_eq!(
        session.store().get(&slot),
        Some(json!({ "trigger": "cron", "alias": "Cron" }))
    );

    let widget = root.hydrate().await;
    assert!(widget.affordances().iter().all(|a| a.label != "Add trigger"));
    assert_eq!(field_keys(&module_widget(&widget, &slot)), vec!["expression"]);

    root.remove_block(&slot).unwrap();
    assert_eq!(session.store().get(&slot), None);
    assert!(!session.cache().contains(&slot));
    let widget = root.hydrate().await;
    affordance(&widget, "Add trigger");
}

#[tokio::test]
async fn test_generic_items_are_appended_without_picker() {
    let session = open_session();
    let root = session.open_root().await.unwrap();

    let widget = root.hydrate().await;
    let add = affordance(&widget, "+ Add Item");
    assert_eq!(add.target, root_path("tags"));
    assert!(root.activate(&add).await.unwrap().is_none());
    assert_eq!(session.store().get(&root_path("tags")), Some(json!([""])));

    root.input(&root_path("tags").index(0), FieldInput::Text("ops".into()));
    root.append_item(&root_path("tags"), json!("prod")).unwrap();
    assert_eq!(root.remove_item(&root_path("tags"), 0).unwrap(), json!("ops"));
    assert_eq!(session.store().get(&root_path("tags")), Some(json!(["prod"])));
}

#[tokio::test]
async fn test_mode_round_trip_without_edits_writes_nothing() {
    let document = json!({ "message": "hello", "retries": 2 });
    let session = session_with_root(document.clone());
    let root = session.open_root().await.unwrap();

    root.switch_mode(EditMode::Json).unwrap();
    assert_eq!(
        root.text().as_deref(),
        Some("{\n  \"message\": \"hello\",\n  \"retries\": 2\n}")
    );

    root.switch_mode(EditMode::Yaml).unwrap();
    assert_eq!(root.text().as_deref(), Some("message: hello\nretries: 2\n"));

    root.switch_mode(EditMode::Structured).unwrap();
    assert_eq!(root.mode(), EditMode::Structured);
    assert_eq!(root.text(), None);
    assert_eq!(root.value(), Some(document));
    assert!(!session.store().is_dirty(&Path::root()));
}

#[tokio::test]
async fn test_invalid_text_never_reaches_the_store() {
    let session = session_with_root(json!({ "message": "hello" }));
    let root = session.open_root().await.unwrap();
    root.switch_mode(EditMode::Json).unwrap();

    let error = root.input_text("{ \"message\": ").unwrap_err();
    assert!(matches!(error, EditorError::Parse(ParseError::Json(_))));
    assert!(root.parse_error().is_some());
    assert_eq!(root.value(), Some(json!({ "message": "hello" })));

    match module_widget(&root.render(), &Path::root()) {
        Widget::Module(ModuleView {
            body: ModuleBody::Text {
                format,
                error: Some(_),
                ..
            },
            ..
        }) => assert_eq!(format, TextFormat::Json),
        other => panic!("expected a JSON text body with an error, got {:?}", other),
    }

    let refused = root.switch_mode(EditMode::Structured);
    assert!(matches!(refused, Err(EditorError::Parse(_))));
    assert_eq!(root.mode(), EditMode::Json);

    root.input_text("{ \"message\": \"bye\" }").unwrap();
    assert!(root.parse_error().is_none());
    assert_eq!(root.value(), Some(json!({ "message": "bye" })));
    assert!(session.store().is_dirty(&Path::root()));

    root.switch_mode(EditMode::Structured).unwrap();
    let widget = root.render();
    assert!(matches!(
        widget.find(&root_path("message")),
        Some(Widget::Text { value, .. }) if value == "bye"
    ));
}

#[tokio::test]
async fn test_text_input_is_ignored_in_structured_mode() {
    let session = session_with_root(json!({ "message": "hello" }));
    let root = session.open_root().await.unwrap();

    assert!(root.input_text("not even json").is_ok());
    assert_eq!(root.value(), Some(json!({ "message": "hello" })));
}

#[tokio::test]
async fn test_yaml_edit_of_nested_block() {
    let session = open_session();
    let root = session.open_root().await.unwrap();
    let path = root.insert_block(&action_request(), &logger_action()).unwrap();
    root.hydrate().await;

    let block = session.editor(path.clone());
    block.switch_mode(EditMode::Yaml).unwrap();
    assert_eq!(block.text().as_deref(), Some("action: logger\nalias: Logger\n"));

    block
        .input_text("action: logger\nalias: Logger\nmessage: from yaml\n")
        .unwrap();
    block.switch_mode(EditMode::Structured).unwrap();

    let widget = root.render();
    assert!(matches!(
        widget.find(&path.child("message")),
        Some(Widget::Text { value, .. }) if value == "from yaml"
    ));
}

#[tokio::test]
async fn test_block_type_changed_in_its_own_text_gets_new_schema() {
    let catalog = Arc::new(CountingCatalog::new(test_catalog()));
    let session = EditorSession::new(EditorConfig::default(), catalog.clone());
    let root = session.open_root().await.unwrap();
    let path = root.insert_block(&action_request(), &logger_action()).unwrap();
    root.hydrate().await;
    assert_eq!(catalog.schema_calls(), 1);

    let block = session.editor(path.clone());
    block.switch_mode(EditMode::Json).unwrap();
    block
        .input_text("{ \"action\": \"http\", \"alias\": \"HTTP Request\" }")
        .unwrap();
    block.switch_mode(EditMode::Structured).unwrap();

    let widget = root.hydrate().await;
    assert_eq!(field_keys(&module_widget(&widget, &path)), vec!["url", "method"]);
    assert_eq!(block.block_name().as_deref(), Some("httpAction"));
    assert_eq!(catalog.schema_calls(), 2);
}

#[tokio::test]
async fn test_block_type_changed_from_outside_gets_new_schema() {
    let session = open_session();
    let root = session.open_root().await.unwrap();
    let path = root.insert_block(&action_request(), &logger_action()).unwrap();
    root.hydrate().await;

    root.switch_mode(EditMode::Json).unwrap();
    root.input_text(r#"{ "actions": [{ "action": "http", "alias": "HTTP Request" }] }"#)
        .unwrap();
    root.switch_mode(EditMode::Structured).unwrap();

    let widget = root.hydrate().await;
    assert_eq!(field_keys(&module_widget(&widget, &path)), vec!["url", "method"]);
    assert!(matches!(
        &module_view(&widget, &path).role,
        ModuleRole::Block { name: Some(name), .. } if name == "httpAction"
    ));

    root.input(
        &path,
        FieldInput::Value(json!({ "action": "logger", "alias": "Logger" })),
    );
    let widget = root.hydrate().await;
    assert_eq!(field_keys(&module_widget(&widget, &path)), vec!["message", "level"]);
    assert_eq!(
        session.editor(path).block_name().as_deref(),
        Some("loggerAction")
    );
}

#[tokio::test]
async fn test_moving_blocks_keeps_their_own_schemas() {
    let catalog = Arc::new(CountingCatalog::new(test_catalog()));
    let session = EditorSession::new(EditorConfig::default(), catalog.clone());
    let root = session.open_root().await.unwrap();
    let actions = root_path("actions");

    root.insert_block(&action_request(), &logger_action()).unwrap();
    root.insert_block(&action_request(), &http_action()).unwrap();
    root.hydrate().await;
    assert_eq!(catalog.schema_calls(), 2);

    root.move_block(&actions, 0, 1).unwrap();
    assert_eq!(
        session.store().get(&actions),
        Some(json!([
            { "action": "http", "alias": "HTTP Request" },
            { "action": "logger", "alias": "Logger" }
        ]))
    );
    assert!(!session.cache().contains(&actions.index(0)));
    assert!(!session.cache().contains(&actions.index(1)));

    let widget = root.hydrate().await;
    assert_eq!(field_keys(&module_widget(&widget, &actions.index(0))), vec!["url", "method"]);
    assert_eq!(
        field_keys(&module_widget(&widget, &actions.index(1))),
        vec!["message", "level"]
    );
    assert_eq!(catalog.schema_calls(), 4);

    // Staying in place touches nothing.
    root.move_block(&actions, 1, 1).unwrap();
    assert!(session.cache().contains(&actions.index(1)));

    assert!(matches!(
        root.move_block(&actions, 0, 2),
        Err(EditorError::Store(StoreError::IndexOutOfBounds { index: 2, len: 2, .. }))
    ));
}

#[tokio::test]
async fn test_number_input_coercion() {
    let session = open_session();
    let root = session.open_root().await.unwrap();
    let retries = root_path("retries");

    let cases = [
        ("42", json!(42)),
        (" 7 ", json!(7)),
        ("4.5", json!(4.5)),
        ("", json!(null)),
        ("abc", json!(null)),
        ("NaN", json!(null)),
        ("inf", json!(null)),
    ];
    for (raw, expected) in cases {
        assert!(root.input(&retries, FieldInput::Number(raw.to_string())));
        assert_eq!(session.store().get(&retries), Some(expected), "input {:?}", raw);
    }
}

#[tokio::test]
async fn test_raw_json_field_keeps_previous_value_on_bad_text() {
    let session = open_session();
    let root = session.open_root().await.unwrap();
    let matrix = root_path("matrix");

    assert!(root.input(&matrix, FieldInput::RawJson("[[1, 2]]".into())));
    assert!(!root.input(&matrix, FieldInput::RawJson("[[1,".into())));
    assert_eq!(session.store().get(&matrix), Some(json!([[1, 2]])));
}

#[tokio::test]
async fn test_checkbox_and_value_inputs_mark_the_field() {
    let session = open_session();
    let root = session.open_root().await.unwrap();
    let enabled = root_path("enabled");

    root.input(&enabled, FieldInput::Checked(true));
    assert_eq!(session.store().get(&enabled), Some(json!(true)));
    assert!(session.store().is_touched(&enabled));
    assert!(session.store().validation_requested(&enabled));

    root.input(&root_path("settings"), FieldInput::Value(json!({ "timeout": 2.5 })));
    let widget = root.render();
    assert!(matches!(
        widget.find(&root_path("settings").child("timeout")),
        Some(Widget::Number { value: Some(v), integer: false, .. }) if *v == 2.5
    ));
}

#[tokio::test]
async fn test_schema_fetch_failure_falls_back_to_json() {
    let catalog = Arc::new(CountingCatalog::failing(test_catalog()));
    let session = EditorSession::new(EditorConfig::default(), catalog.clone());
    let root = session.open_root().await.unwrap();
    let path = root.insert_block(&action_request(), &logger_action()).unwrap();

    let widget = root.hydrate().await;
    assert_eq!(catalog.schema_calls(), 1);

    let view = module_view(&widget, &path);
    assert!(view.error.as_deref().is_some_and(|e| e.contains("HTTP 500")));
    assert!(matches!(
        view.body,
        ModuleBody::Text {
            format: TextFormat::Json,
            ..
        }
    ));

    let block = session.editor(path.clone());
    assert_eq!(block.mode(), EditMode::Json);
    assert!(block.fetch_error().is_some());
    assert!(block.text().unwrap().contains("\"action\": \"logger\""));

    // The raw editor still edits the block.
    block
        .input_text("{ \"action\": \"logger\", \"alias\": \"Logger\", \"message\": \"raw\" }")
        .unwrap();
    assert_eq!(
        session.store().get(&path.child("message")),
        Some(json!("raw"))
    );
}

#[tokio::test]
async fn test_unknown_block_name_falls_back_to_json() {
    let session = open_session();
    let root = session.open_root().await.unwrap();
    let ghost = BlockDefinition::new("ghostAction").with_label("Ghost");
    let path = root.insert_block(&action_request(), &ghost).unwrap();

    root.hydrate().await;
    let block = session.editor(path);
    assert_eq!(block.mode(), EditMode::Json);
    assert!(block.fetch_error().unwrap().contains("ghostAction"));
}

#[tokio::test]
async fn test_block_fields_hide_category_and_alias() {
    let catalog = test_catalog().with_block(
        BlockCategory::Action,
        BlockDefinition::new("scriptAction")
            .with_label("Script")
            .with_schema(json!({ "type": "object", "additionalProperties": {} })),
    );
    let session = EditorSession::new(EditorConfig::default(), Arc::new(catalog));
    let root = session.open_root().await.unwrap();
    let script = BlockDefinition::new("scriptAction").with_label("Script");
    let path = root.insert_block(&action_request(), &script).unwrap();
    root.input(&path.child("code"), FieldInput::Text("echo".into()));

    let widget = root.hydrate().await;
    assert_eq!(field_keys(&module_widget(&widget, &path)), vec!["code"]);
}

#[tokio::test]
async fn test_dynamic_property_materializes_typed_default() {
    let session = open_session();
    let root = session.open_root().await.unwrap();
    root.hydrate().await;

    let metadata_path = root_path("metadata");
    let metadata = session.editor(metadata_path.clone());
    metadata
        .add_dynamic_property("owner", PrimitiveKind::String)
        .unwrap();
    metadata
        .add_dynamic_property("priority", PrimitiveKind::Integer)
        .unwrap();

    assert_eq!(
        session.store().get(&metadata_path),
        Some(json!({ "owner": "", "priority": 0 }))
    );
    assert!(session.store().is_dirty(&metadata_path.child("owner")));
    assert!(!session.store().is_touched(&metadata_path.child("owner")));

    let widget = root.render();
    assert_eq!(
        field_keys(&module_widget(&widget, &metadata_path)),
        vec!["owner", "priority"]
    );
    assert!(matches!(
        widget.find(&metadata_path.child("priority")),
        Some(Widget::Number { integer: true, .. })
    ));

    assert!(matches!(
        metadata.add_dynamic_property("owner", PrimitiveKind::Boolean),
        Err(EditorError::Validation(ValidationError::DuplicateKey(_)))
    ));
    assert!(matches!(
        metadata.add_dynamic_property("  ", PrimitiveKind::Boolean),
        Err(EditorError::Validation(ValidationError::EmptyKey))
    ));
}

#[tokio::test]
async fn test_mount_finishing_after_removal_changes_nothing() {
    let catalog = Arc::new(GatedCatalog {
        inner: test_catalog(),
        gate: Notify::new(),
    });
    let session = EditorSession::new(EditorConfig::default(), catalog.clone());
    let root = session.open_root().await.unwrap();
    let path = root.insert_block(&action_request(), &logger_action()).unwrap();

    let block = session.editor(path.clone());
    let mount = block.mount(ModuleDescriptor::block(BlockCategory::Action));
    let remove_then_release = async {
        tokio::task::yield_now().await;
        assert!(session.cache().is_loading(&path));
        root.remove_block(&path).unwrap();
        catalog.gate.notify_one();
    };

    let (mode, ()) = tokio::join!(mount, remove_then_release);

    assert_eq!(mode, EditMode::Structured);
    assert!(!session.cache().contains(&path));
    assert!(!session.cache().is_loading(&path));
    assert!(block.fetch_error().is_none());
    assert_eq!(block.block_name(), None);
    assert_eq!(session.store().get(&root_path("actions")), Some(json!([])));
}

#[tokio::test]
async fn test_remounting_reuses_cached_schema() {
    let catalog = Arc::new(CountingCatalog::new(test_catalog()));
    let session = EditorSession::new(EditorConfig::default(), catalog.clone());
    let root = session.open_root().await.unwrap();
    let path = root.insert_block(&action_request(), &logger_action()).unwrap();

    let block = session.editor(path.clone());
    block.mount(ModuleDescriptor::named("loggerAction")).await;
    block.mount(ModuleDescriptor::named("loggerAction")).await;
    assert_eq!(catalog.schema_calls(), 1);
}

#[tokio::test]
async fn test_refetch_policy_fetches_on_every_mount() {
    let catalog = Arc::new(CountingCatalog::new(test_catalog()));
    let config = EditorConfig::default().with_cache_policy(CachePolicy::AlwaysRefetch);
    let session = EditorSession::new(config, catalog.clone());
    let root = session.open_root().await.unwrap();
    let path = root.insert_block(&action_request(), &logger_action()).unwrap();

    let block = session.editor(path.clone());
    block.mount(ModuleDescriptor::named("loggerAction")).await;
    block.mount(ModuleDescriptor::named("loggerAction")).await;
    assert_eq!(catalog.schema_calls(), 2);
}

#[tokio::test]
async fn test_picker_reopens_fetch_again() {
    let catalog = Arc::new(CountingCatalog::new(test_catalog()));
    let session = EditorSession::new(EditorConfig::default(), catalog.clone());
    let root = session.open_root().await.unwrap();

    root.open_picker(&action_request()).await;
    root.open_picker(&action_request()).await;
    assert_eq!(catalog.list_calls(), 2);
}

#[tokio::test]
async fn test_existing_document_hydrates_all_blocks() {
    let session = session_with_root(json!({
        "trigger": { "trigger": "cron", "alias": "Nightly", "expression": "0 0 * * *" },
        "actions": [{ "action": "logger", "alias": "Log it", "message": "m" }]
    }));
    let root = session.open_root().await.unwrap();

    let widget = root.hydrate().await;
    assert!(widget.pending_modules().is_empty());

    let outline = WidgetOutline::format(&widget);
    assert!(outline.contains("module root.actions[0] (action loggerAction) [remove]"));
    assert!(outline.contains("module root.trigger (trigger cronTrigger) [remove]"));
    assert!(matches!(
        widget.find(&root_path("actions").index(0).child("message")),
        Some(Widget::Text { value, .. }) if value == "m"
    ));
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let first = open_session();
    let second = open_session();
    let first_root = first.open_root().await.unwrap();
    let second_root = second.open_root().await.unwrap();

    first_root.input(&root_path("message"), FieldInput::Text("only here".into()));
    first_root
        .insert_block(&action_request(), &logger_action())
        .unwrap();
    first_root.hydrate().await;

    assert_eq!(second_root.value(), None);
    assert!(!second.cache().contains(&root_path("actions").index(0)));
    assert!(first.cache().contains(&root_path("actions").index(0)));
}
