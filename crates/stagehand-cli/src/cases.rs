//! The demo application and the suite that drives it.
//!
//! The app is a main menu with a play button, a status label, a name field,
//! a scrolling level list and one world object. Every case leaves the menu
//! the way it found it so the cases can run in any order.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use stagehand::{
    ElementId, Failure, LegacyKey, Outcome, PlayTest, Rect, TestDefinition, Tester,
    input::KeyOp,
    mimic::MimicApp,
    suite::{ParamKind, ParamSlot, ParamValue, Registry},
    ui::ElementKind,
};

/// Deadline for the demo's UI waits.
const UI_TIMEOUT: Duration = Duration::from_secs(5);

/// Rows in the level list.
const LEVELS: u32 = 12;

/// Height of one level row.
const ROW_HEIGHT: f32 = 50.0;

/// Names typed by the parameterized name case.
const PLAYERS: [&str; 3] = ["Ada", "Grace", "Linus"];

/// Set the status label of `app`, if it is still alive.
fn set_status(app: &Weak<MimicApp>, status: ElementId, text: &'static str) {
    if let Some(app) = app.upgrade() {
        app.set_text(status, text);
    }
}

/// Build the demo menu.
pub fn build_app() -> Arc<MimicApp> {
    let app = Arc::new(MimicApp::new());
    let menu = app.add_root("MainMenu", ElementKind::Panel, Rect::new(0.0, 0.0, 800.0, 600.0));
    let status = app.add_child(menu, "Status", ElementKind::Label, Rect::new(350.0, 520.0, 100.0, 20.0));
    app.set_text(status, "Idle");

    let play = app.add_child(menu, "PlayButton", ElementKind::Button, Rect::new(350.0, 450.0, 100.0, 40.0));
    app.set_text(play, "Play");
    let weak = Arc::downgrade(&app);
    app.on_click(play, move |_| set_status(&weak, status, "Playing"));

    app.add_child(menu, "PlayerName", ElementKind::TextField, Rect::new(300.0, 380.0, 200.0, 30.0));

    let list = app.add_child(menu, "Levels", ElementKind::ScrollView, Rect::new(50.0, 50.0, 200.0, 300.0));
    app.make_scrollable(list, LEVELS as f32 * ROW_HEIGHT);
    let top = 350.0;
    for i in 1..=LEVELS {
        let y = top - i as f32 * ROW_HEIGHT;
        let row = app.add_child(list, &format!("Level {i}"), ElementKind::Button, Rect::new(50.0, y, 200.0, ROW_HEIGHT));
        app.set_text(row, &format!("Level {i}"));
    }

    let chest = app.add_world_object("Chest", Rect::new(600.0, 280.0, 60.0, 40.0));
    let weak = Arc::downgrade(&app);
    app.on_click(chest, move |_| set_status(&weak, status, "Chest opened"));
    app.mark_loaded("menu_atlas");
    app
}

/// Look up a named element or fail.
fn require(t: &Tester, name: &str) -> Outcome<ElementId> {
    t.find(name)
        .ok_or_else(|| t.check().fail(&format!("'{name}' not found")))
}

/// Current text of the status label.
fn status_text(t: &Tester) -> Option<String> {
    let id = t.find("Status")?;
    t.ui().element(id)?.text
}

/// Put the status label back to idle.
fn reset_status(app: &MimicApp, t: &Tester) -> Outcome<()> {
    let status = require(t, "Status")?;
    app.set_text(status, "Idle");
    Ok(())
}

/// The main menu comes up visible.
#[derive(Default)]
struct MenuVisible;

#[async_trait]
impl PlayTest for MenuVisible {
    async fn run(&mut self, t: &Tester) -> Outcome<()> {
        let menu = t.wait_for_ui_visible("MainMenu", UI_TIMEOUT).await?;
        t.check().is_visible(menu, None)?;
        t.check().asset_loaded("menu_atlas", None)
    }
}

/// Clicking Play updates the status label.
struct StartGame {
    /// App whose label is reset.
    app: Arc<MimicApp>,
}

#[async_trait]
impl PlayTest for StartGame {
    async fn set_up(&mut self, t: &Tester) -> Outcome<()> {
        reset_status(&self.app, t)
    }

    async fn run(&mut self, t: &Tester) -> Outcome<()> {
        t.step("click play");
        let clicked = t.pointer().click_button_with_text("Play").await?;
        t.check().is_some(clicked, Some("play button was not clicked"))?;
        t.wait()
            .until(|| status_text(t).as_deref() == Some("Playing"), Some(UI_TIMEOUT))
            .await
    }

    async fn tear_down(&mut self, t: &Tester) -> Outcome<()> {
        reset_status(&self.app, t)
    }
}

/// Typing a player name into the name field.
#[derive(Default)]
struct EnterName {
    /// Injected player name.
    player: String,
}

#[async_trait]
impl PlayTest for EnterName {
    async fn set_up(&mut self, t: &Tester) -> Outcome<()> {
        let field = require(t, "PlayerName")?;
        t.text().clear(Some(field));
        Ok(())
    }

    async fn run(&mut self, t: &Tester) -> Outcome<()> {
        t.step(&format!("type {}", self.player));
        let typed = t.text().type_into("PlayerName", &self.player).await?;
        t.check().is_true(typed, Some("name field took no input"))?;
        let field = require(t, "PlayerName")?;
        let text = t.ui().element(field).and_then(|info| info.text);
        t.check().are_equal(Some(self.player.clone()), text, None)?;
        t.text().submit(Some(field)).await?;
        Ok(())
    }

    async fn tear_down(&mut self, t: &Tester) -> Outcome<()> {
        t.text().clear(None);
        Ok(())
    }

    fn params(&self) -> Vec<ParamSlot> {
        vec![ParamSlot::new("player", ParamKind::Text)]
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> bool {
        match (name, value) {
            ("player", ParamValue::Text(v)) => {
                self.player = v.clone();
                true
            }
            _ => false,
        }
    }
}

/// The last level is scrolled into view before it is clicked.
#[derive(Default)]
struct LastLevel;

#[async_trait]
impl PlayTest for LastLevel {
    async fn run(&mut self, t: &Tester) -> Outcome<()> {
        let target = require(t, &format!("Level {LEVELS}"))?;
        let clicked = t.pointer().click_on(target).await?;
        t.check()
            .are_equal(Some(target), clicked, Some("last level was not clicked"))
    }

    async fn tear_down(&mut self, t: &Tester) -> Outcome<()> {
        let list = require(t, "Levels")?;
        t.pointer().scroll_to_top(list, 0.2).await
    }
}

/// Clicking the chest in the world opens it.
struct OpenChest {
    /// App whose label is reset.
    app: Arc<MimicApp>,
}

#[async_trait]
impl PlayTest for OpenChest {
    async fn set_up(&mut self, t: &Tester) -> Outcome<()> {
        reset_status(&self.app, t)
    }

    async fn run(&mut self, t: &Tester) -> Outcome<()> {
        let chest = require(t, "Chest")?;
        let clicked = t.pointer().click_world_object(chest).await?;
        t.check().is_some(clicked, Some("chest is not on screen"))?;
        t.wait()
            .until(|| status_text(t).as_deref() == Some("Chest opened"), Some(UI_TIMEOUT))
            .await
    }

    async fn tear_down(&mut self, t: &Tester) -> Outcome<()> {
        reset_status(&self.app, t)
    }
}

/// Escape goes down, is held, and comes back up.
#[derive(Default)]
struct PauseKey;

#[async_trait]
impl PlayTest for PauseKey {
    async fn run(&mut self, t: &Tester) -> Outcome<()> {
        let op = t.keys().press(LegacyKey::Escape, 0.2).await?;
        if op == KeyOp::Unavailable {
            return Err(Failure::other("no keyboard backend"));
        }
        t.check().are_equal(KeyOp::Sent, op, None)?;
        t.check()
            .is_false(t.harness().keyboard().is_down(LegacyKey::Escape), Some("escape stuck down"))
    }
}

/// No element references an unresolved asset.
#[derive(Default)]
struct AssetsResolved;

#[async_trait]
impl PlayTest for AssetsResolved {
    async fn run(&mut self, t: &Tester) -> Outcome<()> {
        t.check().no_missing_assets(None)
    }
}

/// Register the demo suite for `app`.
pub fn registry(app: &Arc<MimicApp>) -> Arc<Registry> {
    let registry = Arc::new(Registry::new("demo"));
    registry.register(TestDefinition::of::<MenuVisible>("menu_visible").with_tags(&["smoke", "ui"]));
    let shared = app.clone();
    registry.register(
        TestDefinition::new("start_game", move || Box::new(StartGame { app: shared.clone() }))
            .with_tags(&["smoke", "ui"]),
    );
    registry.register(
        TestDefinition::of::<EnterName>("enter_name")
            .with_tags(&["ui", "text"])
            .with_data(Some("player"), PLAYERS.iter().map(|p| ParamValue::from(*p)).collect()),
    );
    registry.register(TestDefinition::of::<LastLevel>("last_level").with_tags(&["ui", "scroll"]));
    let shared = app.clone();
    registry.register(
        TestDefinition::new("open_chest", move || Box::new(OpenChest { app: shared.clone() })).with_tags(&["world"]),
    );
    registry.register(TestDefinition::of::<PauseKey>("pause_key").with_tags(&["input"]));
    registry.register(TestDefinition::of::<AssetsResolved>("assets_resolved").with_tags(&["smoke", "health"]));
    registry
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stagehand::{
        Harness, Suite,
        config::HarnessConfig,
        input::{EventQueueKeyboard, InputDevices},
        mimic::{MimicKeyboard, MimicTextAdapter},
        runner::CaseStatus,
        suite::{Discovery, TagFilter, TestSource, definition::expand},
        ui::{Substrate, UiSurface},
    };
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn suite(dir: &TempDir) -> (Suite, Arc<MimicApp>) {
        let app = build_app();
        let keyboard = Arc::new(MimicKeyboard::new());
        let event_queue: Arc<dyn EventQueueKeyboard> = keyboard.clone();
        let harness = Harness::builder(Substrate::from_app(app.clone()))
            .with_config(HarnessConfig {
                reports_dir: dir.path().to_path_buf(),
                ..HarnessConfig::default()
            })
            .with_devices(InputDevices {
                polling: None,
                event_queue: Some(event_queue),
            })
            .with_text_adapter(Arc::new(MimicTextAdapter::new(app.clone())))
            .build()
            .unwrap();
        keyboard.attach(harness.host());
        let discovery = Discovery::new(false).with_resources(registry(&app));
        (Suite::new(harness, discovery), app)
    }

    #[test]
    fn parameterized_names_expand() {
        let app = build_app();
        let names: Vec<String> = registry(&app)
            .definitions()
            .iter()
            .filter(|d| d.name == "enter_name")
            .flat_map(expand)
            .map(|c| c.display_name())
            .collect();
        assert_eq!(names, ["enter_name [Ada]", "enter_name [Grace]", "enter_name [Linus]"]);
    }

    #[tokio::test(start_paused = true)]
    async fn demo_suite_passes() {
        let dir = TempDir::new().unwrap();
        let (suite, app) = suite(&dir);
        let stop = CancellationToken::new();
        suite
            .harness()
            .host()
            .spawn_driver(Duration::from_millis(10), stop.clone());

        let outcome = suite.run(None).await.unwrap();
        assert_eq!(outcome.report.total_tests, 9);
        assert_eq!(outcome.report.failed, 0, "{:#?}", outcome.report.results);
        assert_eq!(outcome.exit_code(), 0);
        assert!(dir.path().join("test-results.json").exists());
        assert_eq!(app.overlay_instances(), 0);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn smoke_tag_selects_three_cases() {
        let dir = TempDir::new().unwrap();
        let (suite, app) = suite(&dir);
        let stop = CancellationToken::new();
        suite
            .harness()
            .host()
            .spawn_driver(Duration::from_millis(10), stop.clone());

        let logo = app.add_child(
            app.roots()[0],
            "Logo",
            ElementKind::Image,
            Rect::new(10.0, 10.0, 10.0, 10.0),
        );
        app.set_missing_asset(logo, true);
        let filter = TagFilter::parse("smoke");
        let outcome = suite.run(filter.as_ref()).await.unwrap();
        let names: Vec<&str> = outcome.report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["menu_visible", "start_game", "assets_resolved"]);
        assert_eq!(outcome.report.failed, 1);
        let failed = &outcome.report.results[2];
        assert!(failed.error_message.as_deref().unwrap().contains("Logo"));
        assert_eq!(CaseStatus::Failed.label(), "FAILED");
        stop.cancel();
    }
}
