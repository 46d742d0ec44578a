use std::fs;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use engine::script::{Item, Room, ScriptState, read_rules};
use engine::world::WorldGrid;
use engine::{
    Dir, Engine, EngineConfig, EntityKind, InputJournal, Pos, TileFlags, replay_to_end,
};
use serde::Deserialize;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario headless for a fixed number of ticks
    Run {
        /// Path to the scenario JSON file
        #[arg(short, long)]
        scenario: String,
        #[arg(short, long, default_value_t = 1000)]
        ticks: u32,
    },
    /// Re-run a recorded journal against a scenario and report the
    /// final snapshot hash
    Replay {
        #[arg(short, long)]
        scenario: String,
        /// Path to the journal JSON file
        #[arg(short, long)]
        journal: String,
        #[arg(short, long, default_value_t = 100_000)]
        ticks: u32,
    },
}

/// Headless test scenario: a character map plus entity spawns and an
/// optional rule script.
/// Map legend: `#` solid, `~` water, `%` slime, anything else open.
#[derive(Deserialize)]
struct Scenario {
    seed: u64,
    #[serde(default)]
    config: Option<EngineConfig>,
    map: Vec<String>,
    spawns: Vec<Spawn>,
    #[serde(default)]
    rules: Option<RuleScript>,
}

/// Raw rule bytes plus the rooms/items the rules act on.
#[derive(Deserialize)]
struct RuleScript {
    bytes: Vec<u8>,
    rooms: Vec<Room>,
    items: Vec<Item>,
    #[serde(default)]
    var_count: usize,
}

#[derive(Deserialize)]
struct Spawn {
    kind: EntityKind,
    dir: Dir,
    y: i32,
    x: i32,
    #[serde(default = "default_level")]
    level: u8,
}

fn default_level() -> u8 {
    1
}

fn load_scenario(path: &str) -> Result<Scenario> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {path}"))?;
    serde_json::from_str(&data).with_context(|| "Failed to deserialize scenario JSON")
}

fn build_engine(scenario: &Scenario) -> Result<Engine> {
    let height = scenario.map.len();
    let width = scenario.map.first().map_or(0, |r| r.chars().count());
    if width == 0 || height == 0 {
        bail!("scenario map is empty");
    }
    let mut world = WorldGrid::new(width, height);
    for (y, row) in scenario.map.iter().enumerate() {
        if row.chars().count() != width {
            bail!("scenario map row {y} has ragged width");
        }
        for (x, ch) in row.chars().enumerate() {
            let flags = match ch {
                '#' => TileFlags::SOLID,
                '~' => TileFlags::WATER,
                '%' => TileFlags::SLIME,
                _ => TileFlags::NONE,
            };
            world.set_tile_flags(Pos { y: y as i32, x: x as i32 }, flags);
        }
    }

    let config = scenario.config.clone().unwrap_or_default();
    let mut engine = Engine::new(scenario.seed, config, world);
    for spawn in &scenario.spawns {
        engine.spawn(spawn.kind, spawn.dir, Pos { y: spawn.y, x: spawn.x }, spawn.level);
    }
    if let Some(script) = &scenario.rules {
        let set = read_rules(&script.bytes)
            .map_err(|e| anyhow::anyhow!("Failed to parse scenario rules: {e}"))?;
        let state = ScriptState::new(script.rooms.clone(), script.items.clone(), script.var_count);
        engine.attach_rules(set, state);
    }
    Ok(engine)
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Run { scenario, ticks } => {
            let scenario = load_scenario(&scenario)?;
            let mut engine = build_engine(&scenario)?;
            let result = engine
                .advance(ticks, &[])
                .map_err(|e| anyhow::anyhow!("Rule fault during run: {e}"))?;

            println!("Run complete.");
            println!("Simulated Ticks: {}", result.simulated_ticks);
            println!("Stop Reason: {:?}", result.stop_reason);
            println!("Snapshot Hash: {}", engine.snapshot_hash());
            println!("Log Events: {}", engine.log().len());
            for event in engine.log().iter().rev().take(10).rev() {
                println!("  {event:?}");
            }
        }
        Command::Replay { scenario, journal, ticks } => {
            let scenario = load_scenario(&scenario)?;
            let journal_data = fs::read_to_string(&journal)
                .with_context(|| format!("Failed to read journal file: {journal}"))?;
            let journal: InputJournal = serde_json::from_str(&journal_data)
                .with_context(|| "Failed to deserialize journal JSON")?;

            let mut engine = build_engine(&scenario)?;
            let result = replay_to_end(&mut engine, &journal, ticks)
                .map_err(|e| anyhow::anyhow!("Replay failed during execution: {e:?}"))?;

            println!("Replay complete.");
            println!("Final Tick: {}", result.final_tick);
            println!("Stop Reason: {:?}", result.final_stop);
            println!("Snapshot Hash: {}", result.final_snapshot_hash);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scenario_json() -> &'static str {
        r#########"{
            "seed": 42,
            "map": [
                "########",
                "#......#",
                "#......#",
                "########"
            ],
            "spawns": [
                { "kind": "Player", "dir": "Down", "y": 1, "x": 1 },
                { "kind": "TurnBot", "dir": "Right", "y": 2, "x": 3 }
            ]
        }"#########
    }

    #[test]
    fn scenario_builds_a_runnable_engine() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(scenario_json().as_bytes()).unwrap();
        let scenario = load_scenario(file.path().to_str().unwrap()).unwrap();

        let mut engine = build_engine(&scenario).unwrap();
        assert_eq!(engine.registry().len(), 2);
        assert!(engine.world().flags_at(Pos { y: 0, x: 0 }).contains(TileFlags::SOLID));
        let result = engine.advance(20, &[]).unwrap();
        assert_eq!(result.simulated_ticks, 20);
    }

    #[test]
    fn ragged_maps_are_rejected() {
        let scenario = Scenario {
            seed: 0,
            config: None,
            map: vec!["###".into(), "####".into()],
            spawns: Vec::new(),
            rules: None,
        };
        assert!(build_engine(&scenario).is_err());
    }

    #[test]
    fn scenario_rules_are_parsed_and_attached() {
        let room = Room { connections: [0; 6], picture: 1, cur_picture: 1 };
        let mut scenario = Scenario {
            seed: 0,
            config: None,
            map: vec!["...".into(), "...".into()],
            spawns: Vec::new(),
            rules: Some(RuleScript {
                bytes: vec![1, 2, 3, 8, 0, 1, 0x09, 5, 0xff],
                rooms: vec![room],
                items: Vec::new(),
                var_count: 4,
            }),
        };
        assert!(build_engine(&scenario).is_ok());

        // A truncated stream is a scenario error, not a panic.
        if let Some(script) = scenario.rules.as_mut() {
            script.bytes.truncate(4);
        }
        assert!(build_engine(&scenario).is_err());
    }
}
