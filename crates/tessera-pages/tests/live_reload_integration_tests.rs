//! Live reload integration tests
//!
//! Success Criteria:
//! 1. A changed template re-renders every node using it
//! 2. Templates including a changed template are re-rendered too
//! 3. A deleted template renders fallback markup
//! 4. The reloader loop stops on shutdown

use rstest::*;
use std::sync::Arc;
use std::time::Duration;
use tessera_pages::live_reload::{ChangeKind, LiveReloader};
use tessera_pages::template::MemoryTemplateSource;
use tessera_pages::{Engine, NewComponent, NodeId};

#[fixture]
fn source() -> Arc<MemoryTemplateSource> {
	Arc::new(
		MemoryTemplateSource::new()
			.with("header", "<h1>v1</h1>")
			.with("page", "<div>{{@include header}}<p>body</p></div>")
			.with("badge", "<b>new</b>"),
	)
}

async fn mounted(source: &Arc<MemoryTemplateSource>) -> (Engine, NodeId, NodeId) {
	let mut engine = Engine::new(source.clone());
	let page = engine
		.create_component(NewComponent::new("page").id("page"))
		.unwrap();
	let badge = engine
		.create_component(NewComponent::new("badge").id("badge"))
		.unwrap();
	engine.run_until_idle().await;
	(engine, page, badge)
}

#[rstest]
#[tokio::test]
async fn test_modified_include_rerenders_including_nodes(source: Arc<MemoryTemplateSource>) {
	let (mut engine, page, badge) = mounted(&source).await;
	let reloader = LiveReloader::new(source.clone(), Duration::from_millis(10));
	assert_eq!(engine.text_of(&page).as_deref(), Some("v1body"));
	let badge_renders = engine.render_count(&badge);

	source.insert("header", "<h1>v2</h1>");
	let changes = reloader.poll_once(&mut engine).await;

	assert_eq!(changes.len(), 1);
	assert_eq!(changes[0].kind, ChangeKind::Modified);
	assert_eq!(engine.text_of(&page).as_deref(), Some("v2body"));
	assert_eq!(engine.render_count(&badge), badge_renders);
}

#[rstest]
#[tokio::test]
async fn test_deleted_template_renders_fallback(source: Arc<MemoryTemplateSource>) {
	let (mut engine, page, _) = mounted(&source).await;
	let reloader = LiveReloader::new(source.clone(), Duration::from_millis(10));

	source.remove("page");
	let changes = reloader.poll_once(&mut engine).await;

	assert_eq!(changes[0].kind, ChangeKind::Deleted);
	let markup = engine.markup_of(&page).unwrap();
	assert!(markup.contains(r#"data-missing-template="page""#));
}

#[rstest]
#[tokio::test]
async fn test_empty_poll_changes_nothing(source: Arc<MemoryTemplateSource>) {
	let (mut engine, page, _) = mounted(&source).await;
	let reloader = LiveReloader::new(source.clone(), Duration::from_millis(10));
	let renders = engine.render_count(&page);

	assert!(reloader.poll_once(&mut engine).await.is_empty());
	assert_eq!(engine.render_count(&page), renders);
}

#[rstest]
#[tokio::test]
async fn test_run_until_applies_changes_and_stops(source: Arc<MemoryTemplateSource>) {
	let (mut engine, _, badge) = mounted(&source).await;
	let reloader = LiveReloader::new(source.clone(), Duration::from_millis(5));

	source.insert("badge", "<b>hot</b>");
	reloader
		.run_until(&mut engine, tokio::time::sleep(Duration::from_millis(50)))
		.await;

	assert_eq!(engine.text_of(&badge).as_deref(), Some("hot"));
}
