use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tile_engine::{
    collision_slide, compile_entity_defs, resolve_app_paths, AppPaths, Command, ControlMode,
    Controller, EntityId, EntityRegistry, FrameClock, InputEvents, LevelPack, RecordingRenderer,
    Scene, Segment, Vec2, PLAYER_PRESET,
};
use tracing::{debug, error, info};

use super::bootstrap::GameConfig;
use super::input_script::InputScript;

pub(crate) type RunResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) level: String,
    pub(crate) frames: u32,
    pub(crate) ticks: u64,
    pub(crate) player_position: Vec2,
    pub(crate) last_frame_tiles: usize,
    pub(crate) last_frame_entities: usize,
}

pub(crate) fn run(config: GameConfig) -> ExitCode {
    let result = resolve_app_paths()
        .map_err(|err| err.to_string())
        .and_then(|paths| run_headless(&config, &paths));
    match result {
        Ok(summary) => {
            info!(
                level = %summary.level,
                frames = summary.frames,
                ticks = summary.ticks,
                player_x = summary.player_position.x,
                player_y = summary.player_position.y,
                tiles_drawn = summary.last_frame_tiles,
                entities_drawn = summary.last_frame_entities,
                "run_complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

/// Loads content from `paths`, then drives the scene for `config.frames`
/// frames of scripted input.
pub(crate) fn run_headless(config: &GameConfig, paths: &AppPaths) -> RunResult<RunSummary> {
    let mut registry = EntityRegistry::with_builtin_presets();
    for def in compile_entity_defs(&paths.defs_dir).map_err(|err| err.to_string())? {
        registry.register_def(def);
    }

    let pack = LevelPack::load_dir(&paths.levels_dir).map_err(|err| err.to_string())?;
    let level = match &config.level {
        Some(name) => pack.get(name).map_err(|err| err.to_string())?,
        None => pack
            .first()
            .ok_or_else(|| format!("no levels in {}", paths.levels_dir.display()))?,
    };
    let scene = Scene::from_level(level, Arc::new(registry), &config.scene)
        .map_err(|err| format!("load level '{}': {err}", level.name))?;

    let script_path = paths.scripts_dir.join(&config.script);
    let script = if script_path.is_file() {
        let script = InputScript::load(&script_path)?;
        debug!(
            path = %script_path.display(),
            steps = script.steps.len(),
            scripted_frames = script.total_frames(),
            "input_script_loaded"
        );
        script
    } else {
        debug!(path = %script_path.display(), "input_script_missing");
        InputScript::default()
    };
    let frame_dt = Duration::from_millis(script.frame_ms.max(1));

    let mut session = GameSession::new(scene, FrameClock::new(config.clock))?;
    let mut renderer = RecordingRenderer::new();
    for frame in 0..config.frames {
        session.frame(frame_dt, &script.events_for_frame(u64::from(frame)))?;
        session.render(&mut renderer)?;
    }

    Ok(RunSummary {
        level: session.scene.name().to_string(),
        frames: config.frames,
        ticks: session.clock.total_ticks(),
        player_position: session.player_position()?,
        last_frame_tiles: renderer.tile_count(),
        last_frame_entities: renderer.entity_ids().len(),
    })
}

/// The player-controlled view of one scene.
pub(crate) struct GameSession {
    pub(crate) scene: Scene,
    pub(crate) controller: Controller,
    pub(crate) clock: FrameClock,
    pub(crate) player: EntityId,
}

impl GameSession {
    /// Spawns the player at the map center when the level has none.
    pub(crate) fn new(mut scene: Scene, clock: FrameClock) -> RunResult<Self> {
        let default_id = scene.registry().default_id(PLAYER_PRESET).map(EntityId::from);
        let player = match default_id {
            Some(id) if scene.contains_entity(&id) => id,
            _ => {
                let map = scene.tilemap();
                let spawn = Vec2::new(map.pixel_width() * 0.5, map.pixel_height() * 0.5);
                let id = scene
                    .spawn_entity(PLAYER_PRESET, None, spawn)
                    .map_err(|err| format!("spawn player: {err}"))?;
                info!(player = %id, x = spawn.x, y = spawn.y, "player_spawned");
                id
            }
        };
        scene
            .center_camera_on_entity(&player)
            .map_err(|err| err.to_string())?;

        Ok(Self {
            scene,
            controller: Controller::new(ControlMode::Keyboard),
            clock,
            player,
        })
    }

    pub(crate) fn frame(&mut self, frame_dt: Duration, events: &InputEvents) -> RunResult<()> {
        let plan = self.clock.advance(frame_dt);
        self.controller.capture(events);
        for _ in 0..plan.ticks_to_run {
            self.tick()?;
        }
        self.scene
            .center_camera_on_entity(&self.player)
            .map_err(|err| err.to_string())
    }

    pub(crate) fn render(&self, renderer: &mut RecordingRenderer) -> RunResult<()> {
        renderer.begin_frame();
        self.scene
            .draw_tiles(renderer)
            .map_err(|err| err.to_string())?;
        self.scene.draw_in_view(renderer);
        Ok(())
    }

    pub(crate) fn player_position(&self) -> RunResult<Vec2> {
        self.scene
            .get_entity(&self.player)
            .map(|player| player.position())
            .map_err(|err| err.to_string())
    }

    /// One fixed update: cooldowns, then movement. A blocked move slides
    /// along the wall it hit, so pushing diagonally into a wall still moves
    /// the player along it.
    fn tick(&mut self) -> RunResult<()> {
        self.tick_dodge_cooldown()?;

        let direction = self.controller.movement_direction();
        let dodging = self.controller.is_active(Command::Dodge) && self.start_dodge()?;
        let speed_key = if dodging { "dodgeSpeed" } else { "speed" };
        let speed = self.number_attribute(speed_key)?.unwrap_or(0.0) as f32;

        let moved = self.step(Vec2::new(direction.x * speed, direction.y * speed))?;

        self.set_attribute("dx", f64::from(moved.x))?;
        self.set_attribute("dy", f64::from(moved.y))?;
        let state = match (dodging, moved != Vec2::ZERO) {
            (true, _) => "dodging",
            (false, true) => "walking",
            (false, false) => "idle",
        };
        self.set_attribute("state", state)?;
        if let Some(facing) = self.controller.latest_movement().and_then(facing_name) {
            self.set_attribute("direction", facing)?;
        }
        Ok(())
    }

    /// Moves the player by `movement` or as much of it as the walls allow
    /// and returns the distance actually moved.
    fn step(&mut self, movement: Vec2) -> RunResult<Vec2> {
        if movement == Vec2::ZERO || self.try_move(movement)? {
            return Ok(movement);
        }
        if let Some(slide) = self.wall_slide(movement)? {
            if slide != Vec2::ZERO && self.try_move(slide)? {
                return Ok(slide);
            }
        }
        // The ray only leaves the leading corner; corner clips fall back to
        // one axis at a time.
        let x = Vec2::new(movement.x, 0.0);
        let y = Vec2::new(0.0, movement.y);
        let moved_x = x != Vec2::ZERO && self.try_move(x)?;
        let moved_y = y != Vec2::ZERO && self.try_move(y)?;
        Ok(Vec2::new(
            if moved_x { movement.x } else { 0.0 },
            if moved_y { movement.y } else { 0.0 },
        ))
    }

    /// Casts `movement` from the player's leading corner and projects it
    /// onto the first wall edge struck.
    fn wall_slide(&self, movement: Vec2) -> RunResult<Option<Vec2>> {
        let rect = self
            .scene
            .get_entity(&self.player)
            .map_err(|err| err.to_string())?
            .rect();
        let lead = Vec2::new(
            match movement.x {
                x if x > 0.0 => rect.top_right().x,
                x if x < 0.0 => rect.top_left().x,
                _ => rect.center().x,
            },
            match movement.y {
                y if y > 0.0 => rect.bottom_left().y,
                y if y < 0.0 => rect.top_left().y,
                _ => rect.center().y,
            },
        );
        let ray = Segment::new(lead, lead.offset(movement.x, movement.y));
        let hit = self.scene.raycast(&ray).map_err(|err| err.to_string())?;
        Ok(hit.map(|hit| {
            debug!(tile = hit.tile, edge = ?hit.edge, "move_slide");
            collision_slide(movement, &hit.surface)
        }))
    }

    fn try_move(&mut self, movement: Vec2) -> RunResult<bool> {
        let player = self
            .scene
            .get_entity(&self.player)
            .map_err(|err| err.to_string())?;
        let target = player.position().offset(movement.x, movement.y);
        let blocked = self
            .scene
            .rect_collides_with_walls(&player.rect_at(target))
            .map_err(|err| err.to_string())?;
        if blocked {
            debug!(x = target.x, y = target.y, "move_blocked");
            return Ok(false);
        }
        self.scene
            .move_entity(&self.player, target)
            .map_err(|err| err.to_string())?;
        Ok(true)
    }

    fn start_dodge(&mut self) -> RunResult<bool> {
        let ready = self
            .scene
            .get_entity_attribute(&self.player, "canDodge")
            .map_err(|err| err.to_string())?
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if !ready {
            return Ok(false);
        }
        let cooldown = self.number_attribute("dodgeCooldown")?.unwrap_or(0.0);
        self.set_attribute("canDodge", false)?;
        self.set_attribute("dodgeCooldownLeft", cooldown)?;
        Ok(true)
    }

    fn tick_dodge_cooldown(&mut self) -> RunResult<()> {
        let Some(left) = self.number_attribute("dodgeCooldownLeft")? else {
            return Ok(());
        };
        if left <= 0.0 {
            return Ok(());
        }
        let elapsed_ms = self.clock.fixed_dt().as_secs_f64() * 1000.0;
        let remaining = self
            .scene
            .increment_entity_attribute(&self.player, "dodgeCooldownLeft", -elapsed_ms)
            .map_err(|err| err.to_string())?;
        if remaining.as_f64().unwrap_or(0.0) <= 0.0 {
            self.set_attribute("canDodge", true)?;
        }
        Ok(())
    }

    fn set_attribute(&mut self, key: &str, value: impl Into<Value>) -> RunResult<()> {
        self.scene
            .set_entity_attribute(&self.player, key, value)
            .map_err(|err| err.to_string())
    }

    fn number_attribute(&self, key: &str) -> RunResult<Option<f64>> {
        Ok(self
            .scene
            .get_entity_attribute(&self.player, key)
            .map_err(|err| err.to_string())?
            .and_then(|value| value.as_f64()))
    }
}

fn facing_name(command: Command) -> Option<&'static str> {
    match command {
        Command::MoveUp => Some("up"),
        Command::MoveDown => Some("down"),
        Command::MoveLeft => Some("left"),
        Command::MoveRight => Some("right"),
        Command::Dodge => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;
    use tile_engine::{FrameClockConfig, LevelData, SceneConfig, KEYBOARD_DEVICE};

    use super::*;

    fn level(entities: Value) -> LevelData {
        // 6x6 floor ringed by walls.
        let mut tiles = Vec::new();
        for y in 0..6 {
            for x in 0..6 {
                let edge = x == 0 || y == 0 || x == 5 || y == 5;
                tiles.push(if edge { "01-00-WA" } else { "00-00-FL" });
            }
        }
        serde_json::from_value(json!({
            "name": "yard",
            "width": 6,
            "height": 6,
            "tileData": tiles,
            "spriteSheet": "yard_tiles",
            "entities": entities
        }))
        .expect("level")
    }

    fn session(entities: Value) -> GameSession {
        let config = SceneConfig {
            view_width: 96.0,
            view_height: 96.0,
            default_tile_size: 32.0,
        };
        let scene = Scene::from_level(
            &level(entities),
            Arc::new(EntityRegistry::with_builtin_presets()),
            &config,
        )
        .expect("scene");
        let clock = FrameClock::new(FrameClockConfig {
            target_tps: 60,
            ..FrameClockConfig::default()
        });
        GameSession::new(scene, clock).expect("session")
    }

    fn keys(tokens: &[&str]) -> InputEvents {
        let mut events = InputEvents::new();
        events.insert(
            KEYBOARD_DEVICE.to_string(),
            tokens.iter().map(|token| token.to_string()).collect(),
        );
        events
    }

    fn one_tick() -> Duration {
        Duration::from_secs_f64(1.0 / 60.0)
    }

    #[test]
    fn missing_player_is_spawned_at_map_center() {
        let session = session(json!([]));
        assert_eq!(session.player.as_str(), "player");
        assert_eq!(
            session.player_position().expect("pos"),
            Vec2::new(96.0, 96.0)
        );
    }

    #[test]
    fn level_player_is_reused() {
        let session = session(json!([{"name": "player", "x": 40, "y": 50}]));
        assert_eq!(session.scene.entity_count(), 1);
        assert_eq!(
            session.player_position().expect("pos"),
            Vec2::new(40.0, 50.0)
        );
    }

    #[test]
    fn held_key_moves_player_by_speed_per_tick() {
        let mut session = session(json!([{"name": "player", "x": 64, "y": 64}]));
        session.frame(one_tick(), &keys(&["right"])).expect("frame");
        assert_eq!(
            session.player_position().expect("pos"),
            Vec2::new(67.0, 64.0)
        );
        let player = session.scene.get_entity(&session.player).expect("player");
        assert_eq!(player.attribute("state"), Some(&json!("walking")));
        assert_eq!(player.attribute("direction"), Some(&json!("right")));
    }

    #[test]
    fn walls_block_movement() {
        let mut session = session(json!([{"name": "player", "x": 32, "y": 32}]));
        for _ in 0..5 {
            session.frame(one_tick(), &keys(&["up", "left"])).expect("frame");
        }
        assert_eq!(
            session.player_position().expect("pos"),
            Vec2::new(32.0, 32.0)
        );
        let player = session.scene.get_entity(&session.player).expect("player");
        assert_eq!(player.attribute("state"), Some(&json!("idle")));
    }

    #[test]
    fn diagonal_push_into_wall_slides_along_it() {
        let mut session = session(json!([{"name": "player", "x": 32, "y": 64}]));
        session.frame(one_tick(), &keys(&["up", "left"])).expect("frame");
        assert_eq!(
            session.player_position().expect("pos"),
            Vec2::new(32.0, 61.0)
        );
        let player = session.scene.get_entity(&session.player).expect("player");
        assert_eq!(player.attribute("dx"), Some(&json!(0.0)));
        assert_eq!(player.attribute("dy"), Some(&json!(-3.0)));
        assert_eq!(player.attribute("state"), Some(&json!("walking")));
    }

    #[test]
    fn dodge_uses_dodge_speed_then_cools_down() {
        let mut session = session(json!([{"name": "player", "x": 64, "y": 64}]));
        session
            .frame(one_tick(), &keys(&["down", "space"]))
            .expect("frame");
        assert_eq!(
            session.player_position().expect("pos"),
            Vec2::new(64.0, 68.0)
        );
        let player = session.scene.get_entity(&session.player).expect("player");
        assert_eq!(player.attribute("canDodge"), Some(&json!(false)));

        session
            .frame(one_tick(), &keys(&["down", "space"]))
            .expect("frame");
        assert_eq!(
            session.player_position().expect("pos"),
            Vec2::new(64.0, 71.0)
        );

        for _ in 0..30 {
            session.frame(one_tick(), &InputEvents::new()).expect("frame");
        }
        let player = session.scene.get_entity(&session.player).expect("player");
        assert_eq!(player.attribute("canDodge"), Some(&json!(true)));
    }

    #[test]
    fn render_draws_visible_tiles_and_player() {
        let session = session(json!([{"name": "player", "x": 64, "y": 64}]));
        let mut renderer = RecordingRenderer::new();
        session.render(&mut renderer).expect("render");
        assert_eq!(renderer.tile_count(), 9);
        assert_eq!(renderer.entity_ids(), vec![&session.player]);
    }

    #[test]
    fn run_headless_drives_the_scripted_level() {
        let temp = TempDir::new().expect("temp");
        let paths = AppPaths::from_root(temp.path().to_path_buf());
        fs::create_dir_all(&paths.levels_dir).expect("levels");
        fs::create_dir_all(&paths.defs_dir).expect("defs");
        fs::create_dir_all(&paths.scripts_dir).expect("scripts");
        fs::write(
            paths.levels_dir.join("yard.json"),
            serde_json::to_string(&level(json!([{"name": "scarecrow", "x": 96, "y": 96}])))
                .expect("json"),
        )
        .expect("write");
        fs::write(
            paths.defs_dir.join("props.xml"),
            "<Defs><EntityDef><name>scarecrow</name><kind>prop</kind></EntityDef></Defs>",
        )
        .expect("write");
        fs::write(
            paths.scripts_dir.join("walk.json"),
            r#"{"frameMs": 50, "steps": [{"frames": 2, "keyboard": ["left"]}]}"#,
        )
        .expect("write");

        let config = GameConfig {
            frames: 4,
            script: "walk.json".to_string(),
            clock: FrameClockConfig {
                target_tps: 20,
                ..FrameClockConfig::default()
            },
            ..GameConfig::default()
        };
        let summary = run_headless(&config, &paths).expect("run");
        assert_eq!(summary.level, "yard");
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.player_position, Vec2::new(90.0, 96.0));
        assert_eq!(summary.last_frame_entities, 2);
    }

    #[test]
    fn run_headless_reports_unknown_level() {
        let temp = TempDir::new().expect("temp");
        let paths = AppPaths::from_root(temp.path().to_path_buf());
        fs::create_dir_all(&paths.levels_dir).expect("levels");
        fs::write(
            paths.levels_dir.join("yard.json"),
            serde_json::to_string(&level(json!([]))).expect("json"),
        )
        .expect("write");
        let config = GameConfig {
            level: Some("moon".to_string()),
            ..GameConfig::default()
        };
        let err = run_headless(&config, &paths).expect_err("unknown level");
        assert!(err.contains("moon"), "{err}");
    }
}
